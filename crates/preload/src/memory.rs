//! An in-process [`Storage`] over named tables.
//!
//! Evaluates the full predicate language, including nested `IN (SELECT ...)`
//! subqueries, with SQL three-valued logic. Each trait call is one round
//! trip regardless of subquery nesting, which makes it a faithful stand-in for
//! a database when counting queries.

use crate::pattern::like_matches;
use preload_core::{
    ColumnInfo, Error, KeyValue, Result, Row, StorageError, StorageErrorKind, Value,
};
use preload_query::{BinaryOp, Expr, OrderDirection, SelectQuery, Storage};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Table {
    columns: Arc<ColumnInfo>,
    rows: Vec<Row>,
}

/// Named in-memory tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tables: HashMap<String, Table>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) an empty table.
    pub fn create_table(&mut self, table: impl Into<String>, columns: &[&str]) -> &mut Self {
        let columns = Arc::new(ColumnInfo::new(
            columns.iter().map(|c| (*c).to_string()).collect(),
        ));
        self.tables.insert(
            table.into(),
            Table {
                columns,
                rows: Vec::new(),
            },
        );
        self
    }

    /// Insert a row. Columns not mentioned are NULL.
    pub fn insert<I, K, V>(&mut self, table: &str, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let t = self
            .tables
            .get_mut(table)
            .ok_or_else(|| not_found(table, format!("no such table: {table}")))?;

        let mut row = vec![Value::Null; t.columns.len()];
        for (column, value) in values {
            let column = column.as_ref();
            let index = t
                .columns
                .index_of(column)
                .ok_or_else(|| not_found(table, format!("no such column: {column}")))?;
            row[index] = value.into();
        }
        t.rows.push(Row::with_columns(Arc::clone(&t.columns), row));
        Ok(())
    }

    /// All rows of `table`, in insertion order.
    pub fn rows(&self, table: &str) -> Option<&[Row]> {
        self.tables.get(table).map(|t| t.rows.as_slice())
    }

    fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| not_found(name, format!("no such table: {name}")))
    }

    /// Run a select to completion: filter, order, project, distinct.
    fn execute(&self, select: &SelectQuery) -> Result<Vec<Row>> {
        let table = self.table(&select.table)?;
        let filter = match &select.filter {
            Some(expr) => {
                for column in expr.referenced_columns() {
                    check_column(table, &select.table, column)?;
                }
                Some(self.resolve_subqueries(expr)?)
            }
            None => None,
        };

        let mut rows = Vec::new();
        for row in &table.rows {
            let keep = match &filter {
                Some(expr) => eval(expr, row)? == Some(true),
                None => true,
            };
            if keep {
                rows.push(row.clone());
            }
        }

        for order in &select.order_by {
            check_column(table, &select.table, &order.column)?;
        }
        if !select.order_by.is_empty() {
            rows.sort_by(|a, b| {
                select
                    .order_by
                    .iter()
                    .map(|order| {
                        let ord = compare_for_order(
                            a.get_by_name(&order.column),
                            b.get_by_name(&order.column),
                        );
                        match order.direction {
                            OrderDirection::Asc => ord,
                            OrderDirection::Desc => ord.reverse(),
                        }
                    })
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        if !select.columns.is_empty() {
            for column in &select.columns {
                check_column(table, &select.table, column)?;
            }
            let projected = Arc::new(ColumnInfo::new(select.columns.clone()));
            rows = rows
                .iter()
                .map(|row| {
                    let values = select
                        .columns
                        .iter()
                        .map(|c| row.get_by_name(c).cloned().unwrap_or(Value::Null))
                        .collect();
                    Row::with_columns(Arc::clone(&projected), values)
                })
                .collect();
        }

        if select.distinct {
            let mut seen: HashSet<Vec<Option<KeyValue>>> = HashSet::new();
            rows.retain(|row| {
                let key = row.iter().map(|(_, v)| v.to_key()).collect();
                seen.insert(key)
            });
        }

        Ok(rows)
    }

    /// Replace every `IN (SELECT ...)` with the literal list it yields.
    fn resolve_subqueries(&self, expr: &Expr) -> Result<Expr> {
        Ok(match expr {
            Expr::InSelect {
                expr,
                select,
                negated,
            } => {
                if select.columns.len() != 1 {
                    return Err(StorageError::new(
                        StorageErrorKind::Unsupported,
                        "IN subquery must select exactly one column",
                    )
                    .with_table(select.table.clone())
                    .into());
                }
                let values = self
                    .execute(select)?
                    .into_iter()
                    .filter_map(|row| row.into_values().into_iter().next())
                    .collect();
                Expr::In {
                    expr: Box::new(self.resolve_subqueries(expr)?),
                    values,
                    negated: *negated,
                }
            }
            Expr::Binary { left, op, right } => Expr::Binary {
                left: Box::new(self.resolve_subqueries(left)?),
                op: *op,
                right: Box::new(self.resolve_subqueries(right)?),
            },
            Expr::Not(inner) => Expr::Not(Box::new(self.resolve_subqueries(inner)?)),
            Expr::Paren(inner) => Expr::Paren(Box::new(self.resolve_subqueries(inner)?)),
            other => other.clone(),
        })
    }
}

fn not_found(table: &str, message: String) -> Error {
    StorageError::new(StorageErrorKind::NotFound, message)
        .with_table(table)
        .into()
}

fn check_column(table: &Table, name: &str, column: &str) -> Result<()> {
    if table.columns.contains(column) {
        Ok(())
    } else {
        Err(not_found(name, format!("no such column: {column}")))
    }
}

/// NULLs sort first; incomparable values keep their relative order.
fn compare_for_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.sql_cmp(b).unwrap_or(Ordering::Equal),
    }
}

/// The value of an operand expression.
fn operand(expr: &Expr, row: &Row) -> Result<Value> {
    match expr {
        Expr::Column { name, .. } => Ok(row.get_by_name(name).cloned().unwrap_or(Value::Null)),
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Paren(inner) => operand(inner, row),
        predicate => Ok(match eval(predicate, row)? {
            Some(b) => Value::Bool(b),
            None => Value::Null,
        }),
    }
}

/// Evaluate a predicate. `None` is SQL UNKNOWN.
fn eval(expr: &Expr, row: &Row) -> Result<Option<bool>> {
    match expr {
        Expr::Column { .. } | Expr::Literal(_) => Ok(operand(expr, row)?.as_bool()),
        Expr::Paren(inner) => eval(inner, row),
        Expr::Not(inner) => Ok(eval(inner, row)?.map(|b| !b)),
        Expr::Binary { left, op, right } => match op {
            BinaryOp::And => {
                let l = eval(left, row)?;
                if l == Some(false) {
                    return Ok(Some(false));
                }
                Ok(match (l, eval(right, row)?) {
                    (_, Some(false)) => Some(false),
                    (Some(true), Some(true)) => Some(true),
                    _ => None,
                })
            }
            BinaryOp::Or => {
                let l = eval(left, row)?;
                if l == Some(true) {
                    return Ok(Some(true));
                }
                Ok(match (l, eval(right, row)?) {
                    (_, Some(true)) => Some(true),
                    (Some(false), Some(false)) => Some(false),
                    _ => None,
                })
            }
            cmp => {
                let l = operand(left, row)?;
                let r = operand(right, row)?;
                Ok(l.sql_cmp(&r).map(|ord| match cmp {
                    BinaryOp::Eq => ord == Ordering::Equal,
                    BinaryOp::Ne => ord != Ordering::Equal,
                    BinaryOp::Lt => ord == Ordering::Less,
                    BinaryOp::Le => ord != Ordering::Greater,
                    BinaryOp::Gt => ord == Ordering::Greater,
                    BinaryOp::Ge => ord != Ordering::Less,
                    BinaryOp::And | BinaryOp::Or => false,
                }))
            }
        },
        Expr::IsNull { expr, negated } => Ok(Some(operand(expr, row)?.is_null() != *negated)),
        Expr::In {
            expr,
            values,
            negated,
        } => {
            let v = operand(expr, row)?;
            if values.is_empty() {
                return Ok(Some(*negated));
            }
            if v.is_null() {
                return Ok(None);
            }
            if values.iter().any(|c| v.sql_cmp(c) == Some(Ordering::Equal)) {
                Ok(Some(!*negated))
            } else if values.iter().any(Value::is_null) {
                Ok(None)
            } else {
                Ok(Some(*negated))
            }
        }
        Expr::InSelect { .. } => Err(StorageError::new(
            StorageErrorKind::Unsupported,
            "unresolved IN subquery",
        )
        .into()),
        Expr::Like {
            expr,
            pattern,
            negated,
        } => match operand(expr, row)? {
            Value::Text(s) => {
                let matched = like_matches(&s, pattern).map_err(|e| {
                    Error::from(
                        StorageError::new(StorageErrorKind::Query, format!("bad LIKE pattern: {e}"))
                            .with_source(e),
                    )
                })?;
                Ok(Some(matched != *negated))
            }
            _ => Ok(None),
        },
    }
}

impl Storage for MemoryStorage {
    fn query(&self, select: &SelectQuery) -> Result<Vec<Row>> {
        self.execute(select)
    }

    fn query_keys_only(&self, select: &SelectQuery) -> Result<Vec<Value>> {
        if select.columns.len() != 1 {
            return Err(StorageError::new(
                StorageErrorKind::Unsupported,
                "keys-only query must select exactly one column",
            )
            .with_table(select.table.clone())
            .into());
        }
        Ok(self
            .execute(select)?
            .into_iter()
            .filter_map(|row| row.into_values().into_iter().next())
            .collect())
    }

    fn count(&self, select: &SelectQuery) -> Result<u64> {
        Ok(self.execute(select)?.len() as u64)
    }
}
