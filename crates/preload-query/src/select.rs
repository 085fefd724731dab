//! Non-generic SELECT representation handed to the storage collaborator.

use crate::clause::OrderBy;
use crate::expr::{Dialect, Expr};
use preload_core::Value;

/// A single-table SELECT.
///
/// SQL generation is deferred until a dialect is known, so the same value can
/// be executed directly or nested inside another query as an `IN (...)`
/// subquery.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    /// Table name for FROM clause
    pub table: String,
    /// Columns to select (empty = all)
    pub columns: Vec<String>,
    /// WHERE predicate
    pub filter: Option<Expr>,
    /// ORDER BY terms
    pub order_by: Vec<OrderBy>,
    /// DISTINCT flag
    pub distinct: bool,
}

impl SelectQuery {
    /// `SELECT * FROM table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            filter: None,
            order_by: Vec::new(),
            distinct: false,
        }
    }

    /// Replace the projected columns.
    pub fn columns<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Add a predicate, AND-ed with any existing one.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(Expr::and_opt(self.filter.take(), expr));
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Project a single column with DISTINCT and no ordering.
    ///
    /// This is the shape used for keys-only queries and `IN (SELECT ...)`
    /// subqueries.
    pub fn keys(mut self, column: impl Into<String>) -> Self {
        self.columns = vec![column.into()];
        self.order_by.clear();
        self.distinct = true;
        self
    }

    /// Build SQL with PostgreSQL placeholders.
    pub fn build(&self) -> (String, Vec<Value>) {
        self.build_with_dialect(Dialect::default())
    }

    /// Build the SQL query and parameters with a specific dialect.
    pub fn build_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = self.write_sql(dialect, &mut params, 0);
        (sql, params)
    }

    /// Build `SELECT COUNT(*)` over this query's rows.
    pub fn build_count_with_dialect(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = if self.distinct && !self.columns.is_empty() {
            let inner = self.write_sql(dialect, &mut params, 0);
            format!("SELECT COUNT(*) FROM ({inner}) AS counted")
        } else {
            let mut sql = format!("SELECT COUNT(*) FROM {}", dialect.quote_identifier(&self.table));
            self.write_where(&mut sql, dialect, &mut params, 0);
            sql
        };
        (sql, params)
    }

    /// Append this query's SQL, sharing parameter numbering with an outer query.
    pub(crate) fn write_sql(
        &self,
        dialect: Dialect,
        params: &mut Vec<Value>,
        offset: usize,
    ) -> String {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }

        if self.columns.is_empty() {
            sql.push('*');
        } else {
            let cols: Vec<_> = self
                .columns
                .iter()
                .map(|c| dialect.quote_identifier(c))
                .collect();
            sql.push_str(&cols.join(", "));
        }

        sql.push_str(" FROM ");
        sql.push_str(&dialect.quote_identifier(&self.table));

        self.write_where(&mut sql, dialect, params, offset);

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let order_strs: Vec<_> = self.order_by.iter().map(|o| o.build(dialect)).collect();
            sql.push_str(&order_strs.join(", "));
        }

        sql
    }

    fn write_where(
        &self,
        sql: &mut String,
        dialect: Dialect,
        params: &mut Vec<Value>,
        offset: usize,
    ) {
        if let Some(filter) = &self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.build_with_dialect(dialect, params, offset));
        }
    }
}
