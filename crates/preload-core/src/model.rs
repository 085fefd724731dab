//! Capability traits for entities the preloader reads and writes through.
//!
//! A [`Model`] can be decoded from a storage row and report its column
//! values. An [`Owner`] additionally exposes per-relationship slots
//! ([`Related`](crate::Related) / [`RelatedMany`](crate::RelatedMany)) that
//! the preloader fills in. The preloader never mutates an entity in any other
//! way.

use crate::Result;
use crate::row::Row;
use crate::value::{KeyValue, Value};
use std::any::Any;

/// An entity that maps to a storage table.
pub trait Model: Sized + Clone + Send + Sync + 'static {
    /// The table rows of this entity live in.
    const TABLE_NAME: &'static str;

    /// The entity name relationships are declared under.
    ///
    /// Defaults to the table name. Override when several Rust types share one
    /// table but declare different relationships.
    const ENTITY_NAME: &'static str = Self::TABLE_NAME;

    /// Primary key column names.
    const PRIMARY_KEY: &'static [&'static str] = &["id"];

    /// Decode an instance from a storage row.
    fn from_row(row: &Row) -> Result<Self>;

    /// The value of a column on this instance.
    ///
    /// `None` means the entity has no such field, which is distinct from a
    /// field holding `Value::Null`.
    fn column_value(&self, column: &str) -> Option<Value>;

    /// Get the primary key value(s).
    fn primary_key_value(&self) -> Vec<Value> {
        Self::PRIMARY_KEY
            .iter()
            .map(|col| self.column_value(col).unwrap_or(Value::Null))
            .collect()
    }

    /// Identity used to deduplicate instances.
    ///
    /// `None` when any primary key column is NULL (e.g. an unsaved record).
    fn identity(&self) -> Option<Vec<KeyValue>> {
        self.primary_key_value().iter().map(Value::to_key).collect()
    }
}

/// An entity whose relationships can be preloaded.
pub trait Owner: Model {
    /// The slot backing relationship `name`, or `None` if there is none.
    ///
    /// To-many relationships are expected to return a
    /// [`RelatedMany<T>`](crate::RelatedMany) and to-one relationships a
    /// [`Related<T>`](crate::Related).
    ///
    /// ```ignore
    /// fn association(&self, name: &str) -> Option<&dyn Any> {
    ///     match name {
    ///         "vms" => Some(&self.vms),
    ///         _ => None,
    ///     }
    /// }
    /// ```
    fn association(&self, name: &str) -> Option<&dyn Any>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Tagged {
        id: Option<i64>,
        name: String,
    }

    impl Model for Tagged {
        const TABLE_NAME: &'static str = "tags";

        fn from_row(row: &Row) -> Result<Self> {
            Ok(Self {
                id: row.get_named("id")?,
                name: row.get_named("name")?,
            })
        }

        fn column_value(&self, column: &str) -> Option<Value> {
            match column {
                "id" => Some(self.id.into()),
                "name" => Some(self.name.clone().into()),
                _ => None,
            }
        }
    }

    #[test]
    fn entity_name_defaults_to_table() {
        assert_eq!(Tagged::ENTITY_NAME, "tags");
        assert_eq!(Tagged::PRIMARY_KEY, &["id"]);
    }

    #[test]
    fn identity_requires_non_null_key() {
        let saved = Tagged {
            id: Some(4),
            name: "prod".into(),
        };
        let unsaved = Tagged {
            id: None,
            name: "new".into(),
        };

        assert_eq!(saved.primary_key_value(), vec![Value::BigInt(4)]);
        assert_eq!(saved.identity(), Some(vec![KeyValue::Int(4)]));
        assert_eq!(unsaved.identity(), None);
        assert_eq!(saved.column_value("missing"), None);
    }

    #[test]
    fn decodes_from_row() {
        let row = Row::from_pairs([("id", Value::Int(9)), ("name", Value::from("x"))]);
        let tag = Tagged::from_row(&row).unwrap();
        assert_eq!(tag.id, Some(9));
        assert_eq!(tag.name, "x");
    }
}
