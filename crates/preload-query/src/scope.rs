//! Deferred, further-filterable queries over one entity type.
//!
//! A [`Scope`] holds an accumulated predicate and nothing else until one of
//! its terminal operations runs. Builders never touch storage; each terminal
//! operation issues exactly one storage call, except that [`Scope::load`]
//! caches its rows so repeated reads of a loaded scope are free.

use crate::clause::OrderBy;
use crate::expr::Expr;
use crate::select::SelectQuery;
use crate::storage::Storage;
use preload_core::{Model, Result, Value};
use std::fmt;
use std::sync::OnceLock;

/// A deferred query over `M`.
pub struct Scope<M: Model> {
    select: SelectQuery,
    records: OnceLock<Vec<M>>,
}

impl<M: Model> Scope<M> {
    /// Every row of `M`'s table.
    pub fn all() -> Self {
        Self::from_select(SelectQuery::new(M::TABLE_NAME))
    }

    /// Wrap an already-built select over `M`'s table.
    pub fn from_select(select: SelectQuery) -> Self {
        Self {
            select,
            records: OnceLock::new(),
        }
    }

    /// Narrow the scope. The result is a new, unloaded scope.
    pub fn filter(self, expr: Expr) -> Self {
        Self::from_select(self.select.filter(expr))
    }

    pub fn order_by(self, order: OrderBy) -> Self {
        Self::from_select(self.select.order_by(order))
    }

    /// The query this scope will run.
    pub fn select(&self) -> &SelectQuery {
        &self.select
    }

    /// `SELECT DISTINCT column FROM ... WHERE <this scope>`, for nesting in
    /// another query's `IN (...)`.
    pub fn keys_select(&self, column: &str) -> SelectQuery {
        self.select.clone().keys(column)
    }

    pub fn is_loaded(&self) -> bool {
        self.records.get().is_some()
    }

    /// The cached records, if the scope has been loaded.
    pub fn records(&self) -> Option<&[M]> {
        self.records.get().map(Vec::as_slice)
    }

    // ==================== Terminal operations ====================

    /// Materialize the scope, caching the records inside the handle.
    ///
    /// Issues one query the first time and none afterwards.
    pub fn load<S: Storage + ?Sized>(&self, storage: &S) -> Result<&[M]> {
        if let Some(records) = self.records.get() {
            return Ok(records);
        }

        tracing::debug!(table = %self.select.table, "materializing scope");
        let rows = storage.query(&self.select)?;
        let records = rows.iter().map(M::from_row).collect::<Result<Vec<_>>>()?;
        Ok(self.records.get_or_init(|| records))
    }

    /// The records as an owned vector, loading the scope if needed.
    pub fn all_records<S: Storage + ?Sized>(&self, storage: &S) -> Result<Vec<M>> {
        self.load(storage).map(<[M]>::to_vec)
    }

    /// Run a COUNT query. Always issues one query, even when loaded.
    pub fn count<S: Storage + ?Sized>(&self, storage: &S) -> Result<u64> {
        storage.count(&self.select)
    }

    /// Number of records: the cache length when loaded, otherwise one COUNT.
    pub fn size<S: Storage + ?Sized>(&self, storage: &S) -> Result<u64> {
        match self.records.get() {
            Some(records) => Ok(records.len() as u64),
            None => self.count(storage),
        }
    }

    /// Fetch the distinct values of one column with a keys-only query.
    pub fn pluck<S: Storage + ?Sized>(&self, storage: &S, column: &str) -> Result<Vec<Value>> {
        storage.query_keys_only(&self.keys_select(column))
    }
}

impl<M: Model> Clone for Scope<M> {
    fn clone(&self) -> Self {
        let cloned = Self::from_select(self.select.clone());
        if let Some(records) = self.records.get() {
            let _ = cloned.records.set(records.clone());
        }
        cloned
    }
}

impl<M: Model> fmt::Debug for Scope<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("select", &self.select)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
