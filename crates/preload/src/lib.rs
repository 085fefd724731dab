//! Batch association preloading.
//!
//! Given a set of owner records and the name of a declared relationship,
//! load the related records for all owners with a number of queries bounded
//! by the relationship's shape, never by the number of owners.
//!
//! - [`RelationshipRegistry`] resolves a relationship name on an entity,
//!   walking the inheritance chain
//! - [`fetch`] runs the batched `IN (...)` query and groups targets by key
//! - [`Preloader`] exposes `preload`, `preload_and_map` and
//!   `preload_and_scope`
//! - [`RecordingStorage`] counts queries and flags N+1 patterns
//! - [`MemoryStorage`] is an in-process store that evaluates the same queries
//!
//! # Quick Start
//!
//! ```ignore
//! use preload::prelude::*;
//!
//! let registry = RelationshipRegistry::new()
//!     .with("ext_management_systems", RelationshipInfo::has_many("vms", "vms", "ems_id"))?;
//! let storage = RecordingStorage::new(memory);
//! let preloader = Preloader::new(&storage, &registry);
//!
//! preloader.preload::<Ems, Vm>(&emses, "vms")?;
//! assert_eq!(storage.query_count(), 1);
//! for ems in &emses {
//!     println!("{}: {} vms", ems.name, ems.vms.len());
//! }
//! ```

pub mod config;
pub mod fetch;
pub mod memory;
pub mod owners;
mod pattern;
pub mod preloader;
pub mod query_log;
pub mod registry;

pub use config::PreloaderConfig;
pub use fetch::{KeyGroups, KeySource};
pub use memory::MemoryStorage;
pub use owners::OwnerSet;
pub use preloader::{Prefetched, Preloader};
pub use query_log::{LoggedQuery, QueryKind, RecordingStorage};
pub use registry::{RelationshipInfo, RelationshipRegistry};

pub use preload_core::{
    ColumnInfo, Error, FromValue, KeyValue, LinkTableInfo, Model, Owner, OwnerSetErrorKind,
    Related, RelatedMany, RelationshipKind, Result, Row, StorageError, StorageErrorKind, Value,
};
pub use preload_query::{
    BinaryOp, Dialect, Expr, OrderBy, OrderDirection, Scope, SelectQuery, Storage,
};

/// Everything needed to declare models and preload them.
pub mod prelude {
    pub use crate::{
        // Errors
        Error,
        // Query building
        Expr,
        LinkTableInfo,
        MemoryStorage,
        // Core traits
        Model,
        OrderBy,
        Owner,
        OwnerSet,
        Prefetched,
        // Preloading
        Preloader,
        PreloaderConfig,
        RecordingStorage,
        Related,
        RelatedMany,
        RelationshipInfo,
        RelationshipKind,
        RelationshipRegistry,
        Result,
        Row,
        Scope,
        SelectQuery,
        Storage,
        Value,
    };
}
