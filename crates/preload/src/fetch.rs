//! The batch fetch core.
//!
//! Owners are reduced to their distinct non-null key values, and targets for
//! all of them are fetched with one query per relationship (two when the
//! relationship goes through a link table). The rows are then grouped back by
//! key. Nothing here touches owner slots; attaching is the caller's job.

use crate::config::PreloaderConfig;
use crate::registry::RelationshipInfo;
use preload_core::{Error, KeyValue, Model, OwnerSetErrorKind, Result, Row, Value};
use preload_query::{Expr, SelectQuery, Storage};
use std::collections::{HashMap, HashSet};

/// Target entities grouped by the owner key they belong to.
#[derive(Debug, Clone)]
pub struct KeyGroups<T> {
    groups: HashMap<KeyValue, Vec<T>>,
    keys: Vec<KeyValue>,
}

impl<T> KeyGroups<T> {
    /// One explicit empty group per key.
    pub fn empty(keys: &[KeyValue]) -> Self {
        Self {
            groups: keys.iter().map(|k| (k.clone(), Vec::new())).collect(),
            keys: keys.to_vec(),
        }
    }

    /// Targets for `key`. NULL keys and unknown keys get an empty slice.
    pub fn for_key(&self, key: Option<&KeyValue>) -> &[T] {
        key.and_then(|k| self.groups.get(k))
            .map_or(&[][..], Vec::as_slice)
    }

    /// The distinct keys, in first-seen owner order.
    pub fn keys(&self) -> &[KeyValue] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Total number of targets across all groups.
    pub fn target_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Iterate groups in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&KeyValue, &[T])> {
        self.keys
            .iter()
            .map(|k| (k, self.groups.get(k).map_or(&[][..], Vec::as_slice)))
    }

    fn push(&mut self, key: &KeyValue, target: T) {
        // Only requested keys get a group.
        if let Some(group) = self.groups.get_mut(key) {
            group.push(target);
        }
    }
}

/// Where the owner keys of a target query come from.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Distinct key values already known.
    Values(Vec<KeyValue>),
    /// A single-column select yielding the keys.
    Subquery(SelectQuery),
}

impl KeySource {
    fn membership(&self, column: &str) -> Expr {
        match self {
            KeySource::Values(keys) => {
                Expr::col(column).in_list(keys.iter().cloned().map(Value::from))
            }
            KeySource::Subquery(select) => Expr::col(column).in_select(select.clone()),
        }
    }
}

/// Distinct non-null keys, in first-seen order.
pub fn distinct_keys<'v, I>(values: I) -> Vec<KeyValue>
where
    I: IntoIterator<Item = &'v Value>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter_map(Value::to_key)
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

/// The select for target rows related to `keys`, with the relationship's
/// scope and ordering applied.
///
/// For a link-table relationship the keys are first mapped through the link
/// table inside a subquery, so the result is still a single query.
pub fn target_select(info: &RelationshipInfo, keys: &KeySource) -> SelectQuery {
    let membership = match &info.link_table {
        Some(link) => {
            let link_select = SelectQuery::new(&link.table)
                .filter(keys.membership(&link.local_column))
                .keys(&link.remote_column);
            Expr::col(&info.target_key).in_select(link_select)
        }
        None => keys.membership(&info.target_key),
    };
    with_scope(info, SelectQuery::new(&info.related_table).filter(membership))
}

fn with_scope(info: &RelationshipInfo, mut select: SelectQuery) -> SelectQuery {
    if let Some(scope) = &info.scope {
        select = select.filter(scope.clone());
    }
    for order in &info.order_by {
        select = select.order_by(order.clone());
    }
    select
}

fn trace_sql(config: &PreloaderConfig, label: &'static str, select: &SelectQuery) {
    if config.log_sql {
        let (sql, params) = select.build_with_dialect(config.dialect);
        tracing::trace!(sql = %sql, params = params.len(), "{}", label);
    }
}

/// Fetch targets for `keys` from storage.
///
/// Issues no query when `keys` is empty, one query for a direct relationship
/// and two for a link-table relationship.
pub fn fetch<S, T>(
    storage: &S,
    info: &RelationshipInfo,
    keys: &[KeyValue],
    config: &PreloaderConfig,
) -> Result<KeyGroups<T>>
where
    S: Storage + ?Sized,
    T: Model,
{
    if keys.is_empty() {
        tracing::debug!(relationship = %info.name, "no owner keys, skipping query");
        return Ok(KeyGroups::empty(keys));
    }

    if info.is_through() {
        let links = fetch_links(storage, info, keys, config)?;
        let remote_keys = dedup_keys(links.iter().map(|(_, remote)| remote.clone()));
        if remote_keys.is_empty() {
            return Ok(KeyGroups::empty(keys));
        }
        let select = with_scope(
            info,
            SelectQuery::new(&info.related_table).filter(
                KeySource::Values(remote_keys).membership(&info.target_key),
            ),
        );
        trace_sql(config, "link-table target batch query", &select);
        let rows = storage.query(&select)?;
        let targets = decode_keyed::<T>(&rows, &info.target_key)?;
        return Ok(join_links(keys, &links, targets));
    }

    let select = target_select(info, &KeySource::Values(keys.to_vec()));
    trace_sql(config, "batch query", &select);
    let rows = storage.query(&select)?;

    let mut groups = KeyGroups::empty(keys);
    for (key, target) in decode_keyed::<T>(&rows, &info.target_key)? {
        if let Some(key) = key {
            groups.push(&key, target);
        }
    }
    Ok(groups)
}

/// Group already-fetched targets by key.
///
/// Direct relationships issue no query. Link-table relationships still need
/// the link rows to know which target belongs to which owner, so they issue
/// the link query (and only that).
pub fn group_records<S, T>(
    storage: &S,
    info: &RelationshipInfo,
    keys: &[KeyValue],
    records: &[T],
    config: &PreloaderConfig,
) -> Result<KeyGroups<T>>
where
    S: Storage + ?Sized,
    T: Model,
{
    if keys.is_empty() {
        return Ok(KeyGroups::empty(keys));
    }

    let keyed = records
        .iter()
        .map(|record| {
            let value = record.column_value(&info.target_key).ok_or_else(|| {
                Error::invalid_owner_set(
                    OwnerSetErrorKind::MissingKey,
                    T::ENTITY_NAME,
                    &info.name,
                    format!("prefetched target has no '{}' field", info.target_key),
                )
            })?;
            Ok((value.to_key(), record.clone()))
        })
        .collect::<Result<Vec<_>>>()?;

    if info.is_through() {
        let links = fetch_links(storage, info, keys, config)?;
        return Ok(join_links(keys, &links, keyed));
    }

    let mut groups = KeyGroups::empty(keys);
    for (key, target) in keyed {
        if let Some(key) = key {
            groups.push(&key, target);
        }
    }
    Ok(groups)
}

/// `(local, remote)` key pairs from the link table, in storage order.
fn fetch_links<S: Storage + ?Sized>(
    storage: &S,
    info: &RelationshipInfo,
    keys: &[KeyValue],
    config: &PreloaderConfig,
) -> Result<Vec<(KeyValue, KeyValue)>> {
    let Some(link) = &info.link_table else {
        return Ok(Vec::new());
    };
    let select = SelectQuery::new(&link.table)
        .columns([link.local_column.as_str(), link.remote_column.as_str()])
        .filter(KeySource::Values(keys.to_vec()).membership(&link.local_column));
    trace_sql(config, "link-table query", &select);

    let rows = storage.query(&select)?;
    let mut pairs = Vec::with_capacity(rows.len());
    for row in &rows {
        let local = key_of(row, &link.local_column, &link.table)?;
        let remote = key_of(row, &link.remote_column, &link.table)?;
        if let (Some(local), Some(remote)) = (local, remote) {
            pairs.push((local, remote));
        }
    }
    Ok(pairs)
}

/// Attach targets to owner keys via link pairs, keeping target order.
///
/// A link whose target row is missing contributes nothing.
fn join_links<T: Clone>(
    keys: &[KeyValue],
    links: &[(KeyValue, KeyValue)],
    targets: Vec<(Option<KeyValue>, T)>,
) -> KeyGroups<T> {
    let mut owners_by_remote: HashMap<&KeyValue, Vec<&KeyValue>> = HashMap::new();
    for (local, remote) in links {
        owners_by_remote.entry(remote).or_default().push(local);
    }

    let mut groups = KeyGroups::empty(keys);
    for (remote, target) in targets {
        let Some(locals) = remote.as_ref().and_then(|r| owners_by_remote.get(r)) else {
            continue;
        };
        for local in locals {
            groups.push(local, target.clone());
        }
    }
    groups
}

fn decode_keyed<T: Model>(rows: &[Row], key_column: &str) -> Result<Vec<(Option<KeyValue>, T)>> {
    rows.iter()
        .map(|row| {
            let key = key_of(row, key_column, T::TABLE_NAME)?;
            Ok((key, T::from_row(row)?))
        })
        .collect()
}

fn key_of(row: &Row, column: &str, table: &str) -> Result<Option<KeyValue>> {
    row.get_by_name(column)
        .map(Value::to_key)
        .ok_or_else(|| {
            Error::Custom(format!(
                "row from '{}' is missing key column '{}'",
                table, column
            ))
        })
}

/// Drop repeated keys, keeping first-seen order.
pub fn dedup_keys<I: IntoIterator<Item = KeyValue>>(keys: I) -> Vec<KeyValue> {
    let mut seen = HashSet::new();
    keys.into_iter().filter(|k| seen.insert(k.clone())).collect()
}
