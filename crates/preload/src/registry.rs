//! Relationship metadata and the resolver that looks it up.
//!
//! Relationships are declared per entity, either in code through the builder
//! methods on [`RelationshipInfo`] or from a JSON document via
//! [`RelationshipRegistry::from_json`]. An entity may inherit from a parent
//! entity, in which case relationships it does not declare itself resolve to
//! the parent's descriptor (the same value, not a copy).

use crate::pattern::is_identifier;
use preload_core::{Error, LinkTableInfo, RelationshipKind, Result, Value};
use preload_query::{Expr, OrderBy};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Describes how to go from an owner to its related rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipInfo {
    /// Name of the relationship on the owner.
    pub name: String,
    /// Table the related entities live in.
    pub related_table: String,
    pub kind: RelationshipKind,
    /// Column on the owner whose value is looked up.
    pub owner_key: String,
    /// Column on the target matched against the owner key (or, for
    /// relationships through a link table, against the link's remote column).
    pub target_key: String,
    /// Link table for many-to-many relationships.
    pub link_table: Option<LinkTableInfo>,
    /// Extra filter applied to target rows.
    pub scope: Option<Expr>,
    /// Default ordering of target rows.
    pub order_by: Vec<OrderBy>,
}

impl RelationshipInfo {
    fn new(
        name: impl Into<String>,
        related_table: impl Into<String>,
        kind: RelationshipKind,
        owner_key: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            related_table: related_table.into(),
            kind,
            owner_key: owner_key.into(),
            target_key: target_key.into(),
            link_table: None,
            scope: None,
            order_by: Vec::new(),
        }
    }

    /// Target rows carry `foreign_key` pointing at the owner's `id`.
    pub fn has_many(
        name: impl Into<String>,
        related_table: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(name, related_table, RelationshipKind::OneToMany, "id", foreign_key)
    }

    /// Like `has_many`, but at most one target per owner.
    pub fn has_one(
        name: impl Into<String>,
        related_table: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(name, related_table, RelationshipKind::OneToOne, "id", foreign_key)
    }

    /// The owner carries `foreign_key` pointing at the target's `id`.
    pub fn belongs_to(
        name: impl Into<String>,
        related_table: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(name, related_table, RelationshipKind::ManyToOne, foreign_key, "id")
    }

    /// Owners and targets joined through a link table.
    pub fn many_to_many(
        name: impl Into<String>,
        related_table: impl Into<String>,
        link: LinkTableInfo,
    ) -> Self {
        let mut info = Self::new(name, related_table, RelationshipKind::ManyToMany, "id", "id");
        info.link_table = Some(link);
        info
    }

    pub fn owner_key(mut self, column: impl Into<String>) -> Self {
        self.owner_key = column.into();
        self
    }

    pub fn target_key(mut self, column: impl Into<String>) -> Self {
        self.target_key = column.into();
        self
    }

    /// Add a filter on target rows, AND-ed with any existing one.
    pub fn scope(mut self, expr: Expr) -> Self {
        self.scope = Some(Expr::and_opt(self.scope.take(), expr));
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    /// Does loading go through a link table?
    pub fn is_through(&self) -> bool {
        self.link_table.is_some()
    }

    fn validate(&self, entity: &str) -> Result<()> {
        let mut names = vec![
            self.name.as_str(),
            self.related_table.as_str(),
            self.owner_key.as_str(),
            self.target_key.as_str(),
        ];
        if let Some(link) = &self.link_table {
            names.extend([
                link.table.as_str(),
                link.local_column.as_str(),
                link.remote_column.as_str(),
            ]);
        }
        for order in &self.order_by {
            names.push(&order.column);
        }
        if let Some(bad) = names.into_iter().find(|n| !is_identifier(n)) {
            return Err(Error::config(format!(
                "relationship {}.{}: invalid identifier '{}'",
                entity, self.name, bad
            )));
        }
        if self.kind == RelationshipKind::ManyToMany && self.link_table.is_none() {
            return Err(Error::config(format!(
                "relationship {}.{}: many-to-many requires a link table",
                entity, self.name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct EntityEntry {
    parent: Option<String>,
    relationships: HashMap<String, RelationshipInfo>,
}

/// Relationship descriptors for every known entity.
#[derive(Debug, Clone, Default)]
pub struct RelationshipRegistry {
    entities: HashMap<String, EntityEntry>,
}

impl RelationshipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a relationship on `entity`, replacing any same-named one.
    pub fn register(&mut self, entity: impl Into<String>, info: RelationshipInfo) -> Result<&mut Self> {
        let entity = entity.into();
        if !is_identifier(&entity) {
            return Err(Error::config(format!("invalid entity name '{}'", entity)));
        }
        info.validate(&entity)?;
        self.entities
            .entry(entity)
            .or_default()
            .relationships
            .insert(info.name.clone(), info);
        Ok(self)
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, entity: impl Into<String>, info: RelationshipInfo) -> Result<Self> {
        self.register(entity, info)?;
        Ok(self)
    }

    /// Make `child` inherit relationships from `parent`.
    ///
    /// `parent` must already be known. Cycles are rejected.
    pub fn inherit(&mut self, child: impl Into<String>, parent: impl Into<String>) -> Result<&mut Self> {
        let child = child.into();
        let parent = parent.into();
        if !is_identifier(&child) {
            return Err(Error::config(format!("invalid entity name '{}'", child)));
        }
        if !self.entities.contains_key(&parent) {
            return Err(Error::config(format!(
                "'{}' inherits from unknown entity '{}'",
                child, parent
            )));
        }
        if self.ancestry(&parent).any(|(name, _)| name == child) {
            return Err(Error::config(format!(
                "inheritance cycle between '{}' and '{}'",
                child, parent
            )));
        }
        self.entities.entry(child).or_default().parent = Some(parent);
        Ok(self)
    }

    /// Look up relationship `name` on `entity`, searching parents.
    pub fn resolve(&self, entity: &str, name: &str) -> Result<&RelationshipInfo> {
        self.ancestry(entity)
            .find_map(|(_, entry)| entry.relationships.get(name))
            .ok_or_else(|| Error::unknown_relationship(entity, name))
    }

    pub fn contains(&self, entity: &str, name: &str) -> bool {
        self.resolve(entity, name).is_ok()
    }

    /// The parent `entity` inherits from, if any.
    pub fn parent_of(&self, entity: &str) -> Option<&str> {
        self.entities.get(entity)?.parent.as_deref()
    }

    /// Names of every relationship visible on `entity`, own ones first.
    pub fn relationship_names(&self, entity: &str) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for (_, entry) in self.ancestry(entity) {
            let mut own: Vec<&str> = entry.relationships.keys().map(String::as_str).collect();
            own.sort_unstable();
            names.extend(own.into_iter().filter(|n| seen.insert(*n)));
        }
        names
    }

    /// `entity` followed by its ancestors. Stops on a repeated entity.
    fn ancestry<'a>(
        &'a self,
        entity: &str,
    ) -> impl Iterator<Item = (&'a str, &'a EntityEntry)> + use<'a> {
        let mut visited = HashSet::new();
        let mut next = self.entities.get_key_value(entity);
        std::iter::from_fn(move || {
            let (name, entry) = next.take()?;
            if !visited.insert(name.as_str()) {
                return None;
            }
            next = entry
                .parent
                .as_deref()
                .and_then(|parent| self.entities.get_key_value(parent));
            Some((name.as_str(), entry))
        })
    }

    /// Load a registry from JSON.
    ///
    /// ```json
    /// {
    ///   "entities": {
    ///     "ext_management_systems": {
    ///       "relationships": {
    ///         "vms": { "kind": "has_many", "target": "vms", "foreign_key": "ems_id",
    ///                  "where": { "template": false } }
    ///       }
    ///     },
    ///     "cloud_managers": { "inherits": "ext_management_systems" }
    ///   }
    /// }
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: RegistryDoc = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("invalid relationship registry: {e}")))?;

        let mut registry = Self::new();
        for (entity, entity_doc) in &doc.entities {
            if !is_identifier(entity) {
                return Err(Error::config(format!("invalid entity name '{}'", entity)));
            }
            registry.entities.entry(entity.clone()).or_default();
            for (name, rel) in &entity_doc.relationships {
                registry.register(entity.clone(), rel.to_info(entity, name)?)?;
            }
        }
        // Parents are wired after every entity exists so declaration order is irrelevant.
        for (entity, entity_doc) in &doc.entities {
            if let Some(parent) = &entity_doc.inherits {
                registry.inherit(entity.clone(), parent.clone())?;
            }
        }
        Ok(registry)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryDoc {
    entities: BTreeMap<String, EntityDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntityDoc {
    #[serde(default)]
    inherits: Option<String>,
    #[serde(default)]
    relationships: BTreeMap<String, RelationshipDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RelationshipDoc {
    kind: RelationshipKind,
    target: String,
    #[serde(default)]
    foreign_key: Option<String>,
    #[serde(default)]
    owner_key: Option<String>,
    #[serde(default)]
    target_key: Option<String>,
    #[serde(default)]
    through: Option<LinkTableInfo>,
    #[serde(default, rename = "where")]
    conditions: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    order_by: Vec<OrderBy>,
}

impl RelationshipDoc {
    fn to_info(&self, entity: &str, name: &str) -> Result<RelationshipInfo> {
        let missing_fk = || {
            Error::config(format!(
                "relationship {}.{}: '{}' requires foreign_key",
                entity,
                name,
                self.kind.as_str()
            ))
        };
        let fk = self.foreign_key.clone();
        let mut info = match self.kind {
            RelationshipKind::OneToMany => {
                RelationshipInfo::has_many(name, &self.target, fk.ok_or_else(missing_fk)?)
            }
            RelationshipKind::OneToOne => {
                RelationshipInfo::has_one(name, &self.target, fk.ok_or_else(missing_fk)?)
            }
            RelationshipKind::ManyToOne => {
                RelationshipInfo::belongs_to(name, &self.target, fk.ok_or_else(missing_fk)?)
            }
            RelationshipKind::ManyToMany => {
                let link = self.through.clone().ok_or_else(|| {
                    Error::config(format!(
                        "relationship {}.{}: many_to_many requires through",
                        entity, name
                    ))
                })?;
                RelationshipInfo::many_to_many(name, &self.target, link)
            }
        };
        if let Some(col) = &self.owner_key {
            info = info.owner_key(col);
        }
        if let Some(col) = &self.target_key {
            info = info.target_key(col);
        }
        for (column, value) in &self.conditions {
            if !is_identifier(column) {
                return Err(Error::config(format!(
                    "relationship {}.{}: invalid identifier '{}'",
                    entity, name, column
                )));
            }
            info = info.scope(condition(column, value).map_err(|msg| {
                Error::config(format!("relationship {}.{}: {}", entity, name, msg))
            })?);
        }
        for order in &self.order_by {
            info = info.order_by(order.clone());
        }
        Ok(info)
    }
}

/// `column = value`, `column IS NULL` or `column IN (...)`.
fn condition(column: &str, value: &serde_json::Value) -> std::result::Result<Expr, String> {
    match value {
        serde_json::Value::Null => Ok(Expr::col(column).is_null()),
        serde_json::Value::Array(items) => {
            let values = items
                .iter()
                .map(scalar)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(Expr::col(column).in_list(values))
        }
        other => Ok(Expr::col(column).eq(scalar(other)?)),
    }
}

fn scalar(value: &serde_json::Value) -> std::result::Result<Value, String> {
    match value {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::BigInt)
            .or_else(|| n.as_f64().map(Value::Double))
            .ok_or_else(|| format!("unsupported number {}", n)),
        serde_json::Value::String(s) => Ok(Value::Text(s.clone())),
        other => Err(format!("unsupported condition value {}", other)),
    }
}
