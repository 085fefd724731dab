//! The three public preload operations.
//!
//! All of them resolve the relationship once, validate every owner before any
//! query runs, and share the batch fetch core. They differ only in what they
//! hand back:
//!
//! - [`Preloader::preload`] fills each owner's slot and marks it loaded
//! - [`Preloader::preload_and_map`] also returns the union of all targets
//! - [`Preloader::preload_and_scope`] returns a deferred [`Scope`] instead of
//!   running anything
//!
//! # Example
//!
//! ```ignore
//! let preloader = Preloader::new(&storage, &registry);
//!
//! // 1 query for all owners
//! preloader.preload::<Ems, Vm>(&emses, "vms")?;
//! assert_eq!(emses[0].vms.len(), 2);
//!
//! // 0 queries until the scope is counted
//! let vms = preloader.preload_and_scope::<Ems, Vm>(&emses, "vms")?;
//! let hosts = preloader.preload_and_scope::<Vm, Host>(&vms, "host")?;
//! assert_eq!(hosts.count(&storage)?, 2);
//! ```

use crate::config::PreloaderConfig;
use crate::fetch::{self, KeyGroups, KeySource};
use crate::owners::OwnerSet;
use crate::registry::{RelationshipInfo, RelationshipRegistry};
use preload_core::{
    Error, KeyValue, Model, Owner, OwnerSetErrorKind, Related, RelatedMany, Result, Value,
};
use preload_query::{Scope, Storage};
use std::collections::HashSet;

/// Targets supplied by the caller instead of being fetched.
pub enum Prefetched<'a, T: Model> {
    /// Records already in memory. No target query is issued.
    Records(Vec<T>),
    /// A scope whose records are used, loading it first if needed.
    Scope(&'a Scope<T>),
}

/// A typed view of an owner's slot for one relationship.
enum Slot<'s, T: Model> {
    One(&'s Related<T>),
    Many(&'s RelatedMany<T>),
}

impl<T: Model> Slot<'_, T> {
    fn is_loaded(&self) -> bool {
        match self {
            Slot::One(slot) => slot.is_loaded(),
            Slot::Many(slot) => slot.is_loaded(),
        }
    }

    /// Returns true if the slot was newly marked loaded.
    fn attach(&self, targets: &[T]) -> bool {
        match self {
            Slot::One(slot) => slot.set_loaded(targets.first().cloned()).is_ok(),
            Slot::Many(slot) => slot.set_loaded(targets.to_vec()).is_ok(),
        }
    }

    fn loaded(&self) -> &[T] {
        match self {
            Slot::One(slot) => slot.get().map_or(&[][..], std::slice::from_ref),
            Slot::Many(slot) => slot.get().unwrap_or(&[]),
        }
    }
}

/// Batch association loader over one storage collaborator.
///
/// Stateless across calls: loaded markers live on the owners.
pub struct Preloader<'a, S: Storage + ?Sized> {
    storage: &'a S,
    registry: &'a RelationshipRegistry,
    config: PreloaderConfig,
}

impl<'a, S: Storage + ?Sized> Preloader<'a, S> {
    pub fn new(storage: &'a S, registry: &'a RelationshipRegistry) -> Self {
        Self {
            storage,
            registry,
            config: PreloaderConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PreloaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PreloaderConfig {
        &self.config
    }

    pub fn storage(&self) -> &'a S {
        self.storage
    }

    pub fn registry(&self) -> &'a RelationshipRegistry {
        self.registry
    }

    /// Resolve relationship `name` on owner type `O`.
    pub fn resolve<O: Model>(&self, name: &str) -> Result<&'a RelationshipInfo> {
        self.registry.resolve(O::ENTITY_NAME, name)
    }

    /// Load relationship `name` onto every owner and mark it loaded.
    ///
    /// Owners already loaded for `name` are skipped, so a repeated call issues
    /// no query. Returns the number of owners newly marked loaded.
    #[tracing::instrument(level = "debug", skip(self, owners), fields(owner = O::ENTITY_NAME))]
    pub fn preload<'o, O, T>(&self, owners: impl Into<OwnerSet<'o, O>>, name: &str) -> Result<usize>
    where
        O: Owner,
        T: Model,
    {
        let owners = owners.into();
        let info = self.resolve_for::<O, T>(name)?;
        let records = owners.materialize(self.storage)?;
        self.load_into::<O, T>(records, info, None)
    }

    /// Like [`preload`](Self::preload), but group caller-supplied targets
    /// instead of running the batch query.
    ///
    /// The relationship's own scope is not applied to the supplied targets.
    #[tracing::instrument(level = "debug", skip(self, owners, prefetched), fields(owner = O::ENTITY_NAME))]
    pub fn preload_with<'o, O, T>(
        &self,
        owners: impl Into<OwnerSet<'o, O>>,
        name: &str,
        prefetched: Prefetched<'_, T>,
    ) -> Result<usize>
    where
        O: Owner,
        T: Model,
    {
        let owners = owners.into();
        let info = self.resolve_for::<O, T>(name)?;
        let records = owners.materialize(self.storage)?;
        self.load_into::<O, T>(records, info, Some(prefetched))
    }

    /// Load relationship `name` and return every related target once.
    ///
    /// Owners are marked loaded as with [`preload`](Self::preload) and the
    /// result is the union of their slots, deduplicated by primary key in
    /// first-seen order. A deferred owner set is loaded first, so its records
    /// carry the markers and a later `preload` on the same scope is free.
    #[tracing::instrument(level = "debug", skip(self, owners), fields(owner = O::ENTITY_NAME))]
    pub fn preload_and_map<'o, O, T>(
        &self,
        owners: impl Into<OwnerSet<'o, O>>,
        name: &str,
    ) -> Result<Vec<T>>
    where
        O: Owner,
        T: Model,
    {
        let owners = owners.into();
        let info = self.resolve_for::<O, T>(name)?;

        let records = owners.materialize(self.storage)?;
        self.load_into::<O, T>(records, info, None)?;

        let mut union = Union::default();
        for owner in records {
            union.extend(slot_of::<O, T>(owner, info)?.loaded());
        }
        Ok(union.into_vec())
    }

    /// Build a deferred query over the targets of relationship `name`.
    ///
    /// Never touches storage. The returned scope selects target rows whose key
    /// is among the owners' keys, AND-ed with the relationship's scope; for a
    /// deferred owner set the keys are expressed as a subquery, so chained
    /// calls stay unexecuted until a terminal operation on the last scope.
    #[tracing::instrument(level = "debug", skip(self, owners), fields(owner = O::ENTITY_NAME))]
    pub fn preload_and_scope<'o, O, T>(
        &self,
        owners: impl Into<OwnerSet<'o, O>>,
        name: &str,
    ) -> Result<Scope<T>>
    where
        O: Model,
        T: Model,
    {
        let owners = owners.into();
        let info = self.resolve_for::<O, T>(name)?;

        let source = if let Some(scope) = owners.pending_scope() {
            KeySource::Subquery(scope.keys_select(&info.owner_key))
        } else {
            let records = owners.materialize(self.storage)?;
            let mut values = Vec::with_capacity(records.len());
            for owner in records {
                values.push(owner_key_value(owner, info)?);
            }
            KeySource::Values(fetch::distinct_keys(&values))
        };

        Ok(Scope::from_select(fetch::target_select(info, &source)))
    }

    /// Resolve `name` on `O` and check that it targets `T`.
    fn resolve_for<O: Model, T: Model>(&self, name: &str) -> Result<&'a RelationshipInfo> {
        let info = self.resolve::<O>(name)?;
        if info.related_table != T::TABLE_NAME {
            return Err(Error::invalid_owner_set(
                OwnerSetErrorKind::TargetMismatch,
                O::ENTITY_NAME,
                name,
                format!(
                    "relationship targets '{}' but '{}' was requested",
                    info.related_table,
                    T::TABLE_NAME
                ),
            ));
        }
        Ok(info)
    }

    /// Validate owners, fetch or group targets, then attach.
    ///
    /// Nothing is attached unless every step succeeds.
    fn load_into<O: Owner, T: Model>(
        &self,
        owners: &[O],
        info: &RelationshipInfo,
        prefetched: Option<Prefetched<'_, T>>,
    ) -> Result<usize> {
        let mut pending: Vec<(Slot<'_, T>, Option<KeyValue>)> = Vec::with_capacity(owners.len());
        for owner in owners {
            let slot = slot_of::<O, T>(owner, info)?;
            let key = owner_key_value(owner, info)?.to_key();
            if !slot.is_loaded() {
                pending.push((slot, key));
            }
        }
        if pending.len() < owners.len() {
            tracing::debug!(
                skipped = owners.len() - pending.len(),
                "skipping owners already loaded"
            );
        }

        let keys = fetch::dedup_keys(pending.iter().filter_map(|(_, key)| key.clone()));

        tracing::info!(
            owner = O::ENTITY_NAME,
            relationship = %info.name,
            target = T::TABLE_NAME,
            owner_count = owners.len(),
            pending_count = pending.len(),
            key_count = keys.len(),
            "Batch loading relationship"
        );

        let groups = match prefetched {
            None => fetch::fetch::<S, T>(self.storage, info, &keys, &self.config)?,
            Some(Prefetched::Records(records)) => {
                fetch::group_records(self.storage, info, &keys, &records, &self.config)?
            }
            Some(Prefetched::Scope(scope)) => {
                if keys.is_empty() {
                    KeyGroups::empty(&keys)
                } else {
                    let records = scope.load(self.storage)?;
                    fetch::group_records(self.storage, info, &keys, records, &self.config)?
                }
            }
        };

        let mut loaded = 0;
        for (slot, key) in &pending {
            if slot.attach(groups.for_key(key.as_ref())) {
                loaded += 1;
            }
        }
        Ok(loaded)
    }
}

/// The owner's slot for `info`, checked against the relationship's cardinality.
fn slot_of<'s, O: Owner, T: Model>(owner: &'s O, info: &RelationshipInfo) -> Result<Slot<'s, T>> {
    let any = owner.association(&info.name).ok_or_else(|| {
        Error::invalid_owner_set(
            OwnerSetErrorKind::MissingSlot,
            O::ENTITY_NAME,
            &info.name,
            "owner exposes no slot for this relationship",
        )
    })?;

    let slot = if info.kind.is_to_many() {
        any.downcast_ref::<RelatedMany<T>>().map(Slot::Many)
    } else {
        any.downcast_ref::<Related<T>>().map(Slot::One)
    };
    slot.ok_or_else(|| {
        let expected = if info.kind.is_to_many() {
            "RelatedMany"
        } else {
            "Related"
        };
        Error::invalid_owner_set(
            OwnerSetErrorKind::SlotMismatch,
            O::ENTITY_NAME,
            &info.name,
            format!(
                "{} relationship needs a {}<{}> slot",
                info.kind.as_str(),
                expected,
                std::any::type_name::<T>()
            ),
        )
    })
}

fn owner_key_value<O: Model>(owner: &O, info: &RelationshipInfo) -> Result<Value> {
    owner.column_value(&info.owner_key).ok_or_else(|| {
        Error::invalid_owner_set(
            OwnerSetErrorKind::MissingKey,
            O::ENTITY_NAME,
            &info.name,
            format!("owner has no '{}' field", info.owner_key),
        )
    })
}

/// Targets deduplicated by primary key, in first-seen order.
struct Union<T> {
    seen: HashSet<Vec<KeyValue>>,
    items: Vec<T>,
}

impl<T> Default for Union<T> {
    fn default() -> Self {
        Self {
            seen: HashSet::new(),
            items: Vec::new(),
        }
    }
}

impl<T: Model> Union<T> {
    fn extend(&mut self, targets: &[T]) {
        for target in targets {
            // Records without a primary key have no identity to compare.
            let fresh = target
                .identity()
                .is_none_or(|identity| self.seen.insert(identity));
            if fresh {
                self.items.push(target.clone());
            }
        }
    }

    fn into_vec(self) -> Vec<T> {
        self.items
    }
}
