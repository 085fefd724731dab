//! Core types and traits for the batch preloader.
//!
//! - `Value` / `KeyValue` for dynamic column values and normalized grouping keys
//! - `Row` for rows returned by a storage collaborator
//! - `Model` and `Owner` capability traits for entities
//! - `Related` / `RelatedMany` write-once relationship slots
//! - `Error` taxonomy shared by every preload crate

pub mod error;
pub mod model;
pub mod relationship;
pub mod row;
pub mod value;

pub use error::{
    ConfigError, Error, OwnerSetError, OwnerSetErrorKind, RelationshipError, Result,
    StorageError, StorageErrorKind, TypeError,
};
pub use model::{Model, Owner};
pub use relationship::{LinkTableInfo, Related, RelatedMany, RelationshipKind};
pub use row::{ColumnInfo, FromValue, Row};
pub use value::{KeyValue, Value};
