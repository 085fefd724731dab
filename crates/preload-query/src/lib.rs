//! Query building blocks for the batch preloader.
//!
//! - `Expr` predicates, rendered per `Dialect`
//! - `SelectQuery`, the single-table select handed to storage
//! - `Storage`, the collaborator that executes selects
//! - `Scope`, a deferred query with explicit terminal operations

pub mod clause;
pub mod expr;
pub mod scope;
pub mod select;
pub mod storage;

pub use clause::{OrderBy, OrderDirection};
pub use expr::{BinaryOp, Dialect, Expr};
pub use scope::Scope;
pub use select::SelectQuery;
pub use storage::Storage;
