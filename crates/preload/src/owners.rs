//! Owner sets: the entities whose relationship is being loaded.

use preload_core::{Model, Result};
use preload_query::{Scope, Storage};

/// A normalized owner set.
///
/// Built through `From` so callers can pass a single owner, a slice or
/// vector of owners, or a deferred [`Scope`] without wrapping anything.
#[derive(Debug)]
pub enum OwnerSet<'a, O: Model> {
    /// A single owner, treated as a one-element set.
    One(&'a O),
    /// Materialized owners.
    Many(&'a [O]),
    /// Owners described by a query that may not have run yet.
    Deferred(&'a Scope<O>),
}

impl<'a, O: Model> OwnerSet<'a, O> {
    /// The owners, if they are already in memory.
    pub fn materialized(&self) -> Option<&'a [O]> {
        match *self {
            OwnerSet::One(owner) => Some(std::slice::from_ref(owner)),
            OwnerSet::Many(owners) => Some(owners),
            OwnerSet::Deferred(scope) => scope.records(),
        }
    }

    /// The owners, running the deferred query once if needed.
    ///
    /// Records of a deferred set are cached inside its [`Scope`], so slots
    /// filled on them stay reachable through the caller's handle.
    pub fn materialize<S: Storage + ?Sized>(&self, storage: &S) -> Result<&'a [O]> {
        match *self {
            OwnerSet::Deferred(scope) => {
                if !scope.is_loaded() {
                    tracing::debug!(
                        owner = O::ENTITY_NAME,
                        "materializing deferred owner set"
                    );
                }
                scope.load(storage)
            }
            OwnerSet::One(owner) => Ok(std::slice::from_ref(owner)),
            OwnerSet::Many(owners) => Ok(owners),
        }
    }

    /// The deferred query, if the owners are not yet in memory.
    pub fn pending_scope(&self) -> Option<&'a Scope<O>> {
        match *self {
            OwnerSet::Deferred(scope) if !scope.is_loaded() => Some(scope),
            _ => None,
        }
    }
}

impl<O: Model> Clone for OwnerSet<'_, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<O: Model> Copy for OwnerSet<'_, O> {}

impl<'a, O: Model> From<&'a O> for OwnerSet<'a, O> {
    fn from(owner: &'a O) -> Self {
        OwnerSet::One(owner)
    }
}

impl<'a, O: Model> From<&'a [O]> for OwnerSet<'a, O> {
    fn from(owners: &'a [O]) -> Self {
        OwnerSet::Many(owners)
    }
}

impl<'a, O: Model> From<&'a Vec<O>> for OwnerSet<'a, O> {
    fn from(owners: &'a Vec<O>) -> Self {
        OwnerSet::Many(owners.as_slice())
    }
}

impl<'a, O: Model, const N: usize> From<&'a [O; N]> for OwnerSet<'a, O> {
    fn from(owners: &'a [O; N]) -> Self {
        OwnerSet::Many(owners.as_slice())
    }
}

impl<'a, O: Model> From<&'a Scope<O>> for OwnerSet<'a, O> {
    fn from(scope: &'a Scope<O>) -> Self {
        OwnerSet::Deferred(scope)
    }
}
