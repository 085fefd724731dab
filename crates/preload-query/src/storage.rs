//! The storage collaborator interface.

use crate::select::SelectQuery;
use preload_core::{Result, Row, Value};

/// Executes queries on behalf of the preloader.
///
/// Every method call counts as one round trip to the store, whatever the
/// nesting of `IN (SELECT ...)` subqueries inside the query. Failures are
/// reported as [`Error::Storage`](preload_core::Error::Storage) and are
/// surfaced to callers without modification.
pub trait Storage {
    /// Fetch full rows matching `select`, in the store's order.
    fn query(&self, select: &SelectQuery) -> Result<Vec<Row>>;

    /// Fetch the values of the single projected column of `select`.
    fn query_keys_only(&self, select: &SelectQuery) -> Result<Vec<Value>>;

    /// Count the rows `select` would return.
    fn count(&self, select: &SelectQuery) -> Result<u64> {
        Ok(self.query(select)?.len() as u64)
    }
}

impl<S: Storage + ?Sized> Storage for &S {
    fn query(&self, select: &SelectQuery) -> Result<Vec<Row>> {
        (**self).query(select)
    }

    fn query_keys_only(&self, select: &SelectQuery) -> Result<Vec<Value>> {
        (**self).query_keys_only(select)
    }

    fn count(&self, select: &SelectQuery) -> Result<u64> {
        (**self).count(select)
    }
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn query(&self, select: &SelectQuery) -> Result<Vec<Row>> {
        (**self).query(select)
    }

    fn query_keys_only(&self, select: &SelectQuery) -> Result<Vec<Value>> {
        (**self).query_keys_only(select)
    }

    fn count(&self, select: &SelectQuery) -> Result<u64> {
        (**self).count(select)
    }
}
