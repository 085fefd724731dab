//! Query recording and N+1 detection.
//!
//! [`RecordingStorage`] wraps any [`Storage`] and keeps a log of every call
//! that passes through it. It is how query counts are asserted, and it warns
//! when one table is hit repeatedly within a window, the usual sign of a
//! per-owner loading loop.
//!
//! ```ignore
//! let storage = RecordingStorage::new(memory).with_threshold(3);
//! preloader.preload::<Ems, Vm>(&emses, "vms")?;
//! assert_eq!(storage.query_count(), 1);
//! ```

use preload_core::{Result, Row, Value};
use preload_query::{Dialect, SelectQuery, Storage};
use std::collections::HashMap;
use std::sync::Mutex;

/// What kind of storage call was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Full rows
    Rows,
    /// Keys-only projection
    Keys,
    /// Row count
    Count,
}

/// One recorded storage call.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedQuery {
    pub kind: QueryKind,
    pub table: String,
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Default)]
struct LogState {
    queries: Vec<LoggedQuery>,
    per_table: HashMap<String, usize>,
}

/// Counts and records every query sent to the wrapped storage.
#[derive(Debug)]
pub struct RecordingStorage<S> {
    inner: S,
    dialect: Dialect,
    threshold: Option<usize>,
    state: Mutex<LogState>,
}

impl<S: Storage> RecordingStorage<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            dialect: Dialect::default(),
            threshold: None,
            state: Mutex::new(LogState::default()),
        }
    }

    /// Warn once a single table has been queried `threshold` times.
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Dialect used for the recorded SQL.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total queries since creation or the last [`reset`](Self::reset).
    pub fn query_count(&self) -> usize {
        self.lock().queries.len()
    }

    /// Queries against `table` in the current window.
    pub fn count_for(&self, table: &str) -> usize {
        self.lock().per_table.get(table).copied().unwrap_or(0)
    }

    /// A snapshot of the recorded queries, oldest first.
    pub fn queries(&self) -> Vec<LoggedQuery> {
        self.lock().queries.clone()
    }

    /// Start a new recording window.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.queries.clear();
        state.per_table.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LogState> {
        // A poisoned log is still a valid log.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, kind: QueryKind, select: &SelectQuery) {
        let (sql, params) = match kind {
            QueryKind::Count => select.build_count_with_dialect(self.dialect),
            QueryKind::Rows | QueryKind::Keys => select.build_with_dialect(self.dialect),
        };
        tracing::debug!(target: "preload::query", kind = ?kind, sql = %sql, "storage query");

        let count = {
            let mut state = self.lock();
            state.queries.push(LoggedQuery {
                kind,
                table: select.table.clone(),
                sql,
                params,
            });
            let count = state.per_table.entry(select.table.clone()).or_insert(0);
            *count += 1;
            *count
        };

        if self.threshold == Some(count) {
            tracing::warn!(
                target: "preload::n1",
                table = %select.table,
                queries = count,
                "N+1 QUERY PATTERN DETECTED! Load the relationship for all owners with one preload call."
            );
        }
    }
}

impl<S: Storage> Storage for RecordingStorage<S> {
    fn query(&self, select: &SelectQuery) -> Result<Vec<Row>> {
        self.record(QueryKind::Rows, select);
        self.inner.query(select)
    }

    fn query_keys_only(&self, select: &SelectQuery) -> Result<Vec<Value>> {
        self.record(QueryKind::Keys, select);
        self.inner.query_keys_only(select)
    }

    fn count(&self, select: &SelectQuery) -> Result<u64> {
        self.record(QueryKind::Count, select);
        self.inner.count(select)
    }
}
