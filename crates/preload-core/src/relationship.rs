//! Relationship kinds and the per-owner slots preloaded results land in.
//!
//! Slots are write-once: the first successful preload marks them loaded and
//! every later read is served from memory, even when the loaded set is empty.
//! They use `OnceLock` so the preloader can fill them through a shared
//! reference.

use crate::Model;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

/// The cardinality and join shape of a relationship.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// One-to-one: the target row carries the owner's key.
    #[serde(alias = "has_one")]
    OneToOne,
    /// Many-to-one: the owner carries the target's key.
    #[default]
    #[serde(alias = "belongs_to")]
    ManyToOne,
    /// One-to-many: many target rows carry the owner's key.
    #[serde(alias = "has_many")]
    OneToMany,
    /// Many-to-many through a link table.
    #[serde(alias = "has_and_belongs_to_many")]
    ManyToMany,
}

impl RelationshipKind {
    /// Does this relationship load into a [`RelatedMany`] slot?
    pub const fn is_to_many(self) -> bool {
        matches!(self, RelationshipKind::OneToMany | RelationshipKind::ManyToMany)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            RelationshipKind::OneToOne => "one_to_one",
            RelationshipKind::ManyToOne => "many_to_one",
            RelationshipKind::OneToMany => "one_to_many",
            RelationshipKind::ManyToMany => "many_to_many",
        }
    }
}

/// Information about a link table for relationships that go through one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTableInfo {
    /// The link table name (e.g., `"security_groups_vms"`).
    pub table: String,

    /// Column in the link table matching the owner key (e.g., `"vm_id"`).
    pub local_column: String,

    /// Column in the link table matching the target key (e.g., `"security_group_id"`).
    pub remote_column: String,
}

impl LinkTableInfo {
    pub fn new(
        table: impl Into<String>,
        local_column: impl Into<String>,
        remote_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            local_column: local_column.into(),
            remote_column: remote_column.into(),
        }
    }
}

/// The preloaded target of a to-one relationship (`belongs_to` / `has_one`).
///
/// Three states: not yet preloaded, preloaded with a target, or preloaded
/// with none (the owner's key was NULL or matched no row). The last two both
/// count as loaded, so the preloader never queries for this owner again.
pub struct Related<T: Model> {
    target: OnceLock<Option<T>>,
}

impl<T: Model> Related<T> {
    /// An empty slot the preloader has not visited yet.
    pub const fn new() -> Self {
        Self {
            target: OnceLock::new(),
        }
    }

    /// A slot that is already loaded, e.g. for a record built in memory.
    pub fn loaded(target: Option<T>) -> Self {
        Self {
            target: OnceLock::from(target),
        }
    }

    /// The attached target, if loaded and present.
    pub fn get(&self) -> Option<&T> {
        self.target.get()?.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.target.get().is_some()
    }

    /// Attach `target` and mark the slot loaded.
    ///
    /// A slot is marked at most once; a second attach hands `target` back.
    pub fn set_loaded(&self, target: Option<T>) -> Result<(), Option<T>> {
        self.target.set(target)
    }
}

impl<T: Model> Default for Related<T> {
    fn default() -> Self {
        Self::new()
    }
}

// Cloning an owner keeps what was preloaded onto it.
impl<T: Model> Clone for Related<T> {
    fn clone(&self) -> Self {
        self.target
            .get()
            .map_or_else(Self::new, |target| Self::loaded(target.clone()))
    }
}

impl<T: Model + fmt::Debug> fmt::Debug for Related<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target.get() {
            None => f.write_str("Related(<not loaded>)"),
            Some(target) => f.debug_tuple("Related").field(target).finish(),
        }
    }
}

/// Serializes the target, or `null` when absent or not preloaded.
impl<T> Serialize for Related<T>
where
    T: Model + Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.get().serialize(serializer)
    }
}

/// The preloaded targets of a to-many relationship (`has_many`, or through a
/// link table).
///
/// An owner with no targets is loaded with an empty set, which is different
/// from not being preloaded at all.
pub struct RelatedMany<T: Model> {
    targets: OnceLock<Vec<T>>,
}

impl<T: Model> RelatedMany<T> {
    /// An empty slot the preloader has not visited yet.
    pub const fn new() -> Self {
        Self {
            targets: OnceLock::new(),
        }
    }

    /// A slot that is already loaded with `targets`.
    pub fn loaded(targets: Vec<T>) -> Self {
        Self {
            targets: OnceLock::from(targets),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.targets.get().is_some()
    }

    /// The attached targets, or `None` if the slot was never preloaded.
    pub fn get(&self) -> Option<&[T]> {
        self.targets.get().map(Vec::as_slice)
    }

    /// Number of attached targets; 0 before preloading.
    pub fn len(&self) -> usize {
        self.get().map_or(0, <[T]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.get().unwrap_or(&[]).iter()
    }

    /// Attach `targets` and mark the slot loaded.
    ///
    /// A slot is marked at most once; a second attach hands `targets` back.
    pub fn set_loaded(&self, targets: Vec<T>) -> Result<(), Vec<T>> {
        self.targets.set(targets)
    }
}

impl<T: Model> Default for RelatedMany<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Model> Clone for RelatedMany<T> {
    fn clone(&self) -> Self {
        self.targets
            .get()
            .map_or_else(Self::new, |targets| Self::loaded(targets.clone()))
    }
}

impl<T: Model + fmt::Debug> fmt::Debug for RelatedMany<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.targets.get() {
            None => f.write_str("RelatedMany(<not loaded>)"),
            Some(targets) => f.debug_list().entries(targets).finish(),
        }
    }
}

/// Serializes the targets as a list, or `null` when not preloaded.
impl<T> Serialize for RelatedMany<T>
where
    T: Model + Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.get().serialize(serializer)
    }
}

impl<'a, T: Model> IntoIterator for &'a RelatedMany<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
