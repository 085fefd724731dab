//! Predicate expressions for batch and scoped queries.

use crate::select::SelectQuery;
use preload_core::Value;
use serde::{Deserialize, Serialize};

/// SQL dialect for generating dialect-specific SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// PostgreSQL dialect (uses $1, $2 placeholders)
    #[default]
    Postgres,
    /// SQLite dialect (uses ?1, ?2 placeholders)
    Sqlite,
    /// MySQL dialect (uses ? placeholders)
    Mysql,
}

impl Dialect {
    /// Generate a placeholder for the given parameter index (1-based).
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Mysql => "?".to_string(),
        }
    }

    /// Quote an identifier for this dialect, doubling embedded quotes.
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => {
                let escaped = name.replace('"', "\"\"");
                format!("\"{}\"", escaped)
            }
            Dialect::Mysql => {
                let escaped = name.replace('`', "``");
                format!("`{}`", escaped)
            }
        }
    }
}

/// A predicate or operand in a WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference with optional table qualifier
    Column {
        table: Option<String>,
        name: String,
    },

    /// Bound literal value
    Literal(Value),

    /// Binary operation (comparison or logical connective)
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    /// Logical NOT
    Not(Box<Expr>),

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// IN over a literal list
    In {
        expr: Box<Expr>,
        values: Vec<Value>,
        negated: bool,
    },

    /// IN over a single-column subquery
    InSelect {
        expr: Box<Expr>,
        select: Box<SelectQuery>,
        negated: bool,
    },

    /// LIKE with `%` / `_` wildcards
    Like {
        expr: Box<Expr>,
        pattern: String,
        negated: bool,
    },

    /// Parenthesized expression
    Paren(Box<Expr>),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Equal (=)
    Eq,
    /// Not equal (<>)
    Ne,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Le,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Ge,
    /// Logical AND
    And,
    /// Logical OR
    Or,
}

impl BinaryOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }

    pub const fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

impl Expr {
    // ==================== Constructors ====================

    /// Create a column reference.
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Column {
            table: None,
            name: name.into(),
        }
    }

    /// Create a qualified column reference (table.column).
    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Expr::Column {
            table: Some(table.into()),
            name: column.into(),
        }
    }

    /// Create a literal value.
    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    // ==================== Comparison ====================

    fn binary(self, op: BinaryOp, other: impl Into<Expr>) -> Self {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(other.into()),
        }
    }

    pub fn eq(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Eq, other)
    }

    pub fn ne(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ne, other)
    }

    pub fn lt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Lt, other)
    }

    pub fn le(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Le, other)
    }

    pub fn gt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Gt, other)
    }

    pub fn ge(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ge, other)
    }

    // ==================== Logical ====================

    pub fn and(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::And, other)
    }

    pub fn or(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Or, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    pub fn paren(self) -> Self {
        Expr::Paren(Box::new(self))
    }

    // ==================== Null Checks ====================

    pub fn is_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    // ==================== Membership ====================

    /// `self IN (values...)`. An empty list matches nothing.
    pub fn in_list<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Expr::In {
            expr: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    /// `self NOT IN (values...)`. An empty list matches everything.
    pub fn not_in_list<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Expr::In {
            expr: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    /// `self IN (SELECT ...)`. The subquery must project one column.
    pub fn in_select(self, select: SelectQuery) -> Self {
        Expr::InSelect {
            expr: Box::new(self),
            select: Box::new(select),
            negated: false,
        }
    }

    pub fn like(self, pattern: impl Into<String>) -> Self {
        Expr::Like {
            expr: Box::new(self),
            pattern: pattern.into(),
            negated: false,
        }
    }

    pub fn not_like(self, pattern: impl Into<String>) -> Self {
        Expr::Like {
            expr: Box::new(self),
            pattern: pattern.into(),
            negated: true,
        }
    }

    /// AND-combine an optional existing predicate with a new one.
    pub fn and_opt(existing: Option<Expr>, expr: Expr) -> Expr {
        match existing {
            Some(existing) => existing.and(expr),
            None => expr,
        }
    }

    // ==================== SQL Generation ====================

    /// Build SQL string and collect parameters (PostgreSQL placeholders).
    pub fn build(&self, params: &mut Vec<Value>, offset: usize) -> String {
        self.build_with_dialect(Dialect::Postgres, params, offset)
    }

    /// Build SQL string with specific dialect.
    ///
    /// Parameters are appended to `params`; placeholders are numbered from
    /// `offset + 1`, continuing across nested subqueries.
    pub fn build_with_dialect(
        &self,
        dialect: Dialect,
        params: &mut Vec<Value>,
        offset: usize,
    ) -> String {
        match self {
            Expr::Column { table, name } => {
                if let Some(t) = table {
                    format!(
                        "{}.{}",
                        dialect.quote_identifier(t),
                        dialect.quote_identifier(name)
                    )
                } else {
                    dialect.quote_identifier(name)
                }
            }

            Expr::Literal(value) => {
                params.push(value.clone());
                dialect.placeholder(offset + params.len())
            }

            Expr::Binary { left, op, right } => {
                let left_sql = left.build_operand(*op, dialect, params, offset);
                let right_sql = right.build_operand(*op, dialect, params, offset);
                format!("{left_sql} {} {right_sql}", op.as_str())
            }

            Expr::Not(expr) => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset);
                if matches!(**expr, Expr::Binary { .. }) {
                    format!("NOT ({expr_sql})")
                } else {
                    format!("NOT {expr_sql}")
                }
            }

            Expr::IsNull { expr, negated } => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset);
                let not_str = if *negated { " NOT" } else { "" };
                format!("{expr_sql} IS{not_str} NULL")
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                if values.is_empty() {
                    return if *negated { "1 = 1" } else { "1 = 0" }.to_string();
                }
                let expr_sql = expr.build_with_dialect(dialect, params, offset);
                let value_sqls: Vec<_> = values
                    .iter()
                    .map(|v| {
                        params.push(v.clone());
                        dialect.placeholder(offset + params.len())
                    })
                    .collect();
                let not_str = if *negated { "NOT " } else { "" };
                format!("{expr_sql} {not_str}IN ({})", value_sqls.join(", "))
            }

            Expr::InSelect {
                expr,
                select,
                negated,
            } => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset);
                let sub_sql = select.write_sql(dialect, params, offset);
                let not_str = if *negated { "NOT " } else { "" };
                format!("{expr_sql} {not_str}IN ({sub_sql})")
            }

            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset);
                params.push(Value::Text(pattern.clone()));
                let not_str = if *negated { "NOT " } else { "" };
                format!(
                    "{expr_sql} {not_str}LIKE {}",
                    dialect.placeholder(offset + params.len())
                )
            }

            Expr::Paren(expr) => {
                let expr_sql = expr.build_with_dialect(dialect, params, offset);
                format!("({expr_sql})")
            }
        }
    }

    /// Operands of a logical connective are parenthesized when they are a
    /// different connective, so `a AND (b OR c)` keeps its grouping.
    fn build_operand(
        &self,
        parent: BinaryOp,
        dialect: Dialect,
        params: &mut Vec<Value>,
        offset: usize,
    ) -> String {
        let sql = self.build_with_dialect(dialect, params, offset);
        match self {
            Expr::Binary { op, .. } if parent.is_logical() && op.is_logical() && *op != parent => {
                format!("({sql})")
            }
            _ => sql,
        }
    }

    /// Column names referenced by this expression, outside of subqueries.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Column { name, .. } => out.push(name),
            Expr::Literal(_) => {}
            Expr::Binary { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expr::Not(expr) | Expr::Paren(expr) => expr.collect_columns(out),
            Expr::IsNull { expr, .. }
            | Expr::In { expr, .. }
            | Expr::InSelect { expr, .. }
            | Expr::Like { expr, .. } => expr.collect_columns(out),
        }
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Literal(v)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::Literal(Value::Text(s.to_string()))
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Literal(Value::Text(s))
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        Expr::Literal(Value::Int(n))
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::Literal(Value::BigInt(n))
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Literal(Value::Bool(b))
    }
}

impl From<f64> for Expr {
    fn from(n: f64) -> Self {
        Expr::Literal(Value::Double(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_and_literal() {
        let mut params = Vec::new();
        assert_eq!(Expr::col("name").build(&mut params, 0), "\"name\"");
        assert_eq!(
            Expr::qualified("vms", "ems_id").build(&mut params, 0),
            "\"vms\".\"ems_id\""
        );
        assert_eq!(Expr::lit(42).build(&mut params, 0), "$1");
        assert_eq!(params, vec![Value::Int(42)]);
    }

    #[test]
    fn test_comparison_and_logic() {
        let expr = Expr::col("template")
            .eq(false)
            .and(Expr::col("ems_id").ge(2_i64));
        let mut params = Vec::new();
        let sql = expr.build(&mut params, 0);
        assert_eq!(sql, "\"template\" = $1 AND \"ems_id\" >= $2");
        assert_eq!(params, vec![Value::Bool(false), Value::BigInt(2)]);
    }

    #[test]
    fn test_mixed_connectives_are_grouped() {
        let expr = Expr::col("a")
            .eq(1)
            .and(Expr::col("b").eq(2).or(Expr::col("c").eq(3)));
        let mut params = Vec::new();
        assert_eq!(
            expr.build(&mut params, 0),
            "\"a\" = $1 AND (\"b\" = $2 OR \"c\" = $3)"
        );

        let negated = Expr::col("a").eq(1).not();
        assert_eq!(negated.build(&mut Vec::new(), 0), "NOT (\"a\" = $1)");
    }

    #[test]
    fn test_in_list() {
        let expr = Expr::col("ems_id").in_list([1_i64, 2, 3]);
        let mut params = Vec::new();
        assert_eq!(expr.build(&mut params, 0), "\"ems_id\" IN ($1, $2, $3)");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_empty_in_list() {
        let mut params = Vec::new();
        let none: Vec<i64> = Vec::new();
        assert_eq!(
            Expr::col("id").in_list(none.clone()).build(&mut params, 0),
            "1 = 0"
        );
        assert_eq!(Expr::col("id").not_in_list(none).build(&mut params, 0), "1 = 1");
        assert!(params.is_empty());
    }

    #[test]
    fn test_in_select_numbers_params_in_sequence() {
        let sub = SelectQuery::new("ext_management_systems")
            .columns(["id"])
            .filter(Expr::col("zone").eq("east"));
        let expr = Expr::col("template")
            .eq(false)
            .and(Expr::col("ems_id").in_select(sub));
        let mut params = Vec::new();
        let sql = expr.build_with_dialect(Dialect::Sqlite, &mut params, 0);
        assert_eq!(
            sql,
            "\"template\" = ?1 AND \"ems_id\" IN (SELECT \"id\" FROM \"ext_management_systems\" WHERE \"zone\" = ?2)"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_like_and_null_checks() {
        let mut params = Vec::new();
        assert_eq!(
            Expr::col("name").like("vm%").build(&mut params, 0),
            "\"name\" LIKE $1"
        );
        assert_eq!(
            Expr::col("host_id").is_not_null().build(&mut params, 0),
            "\"host_id\" IS NOT NULL"
        );
        assert_eq!(params, vec![Value::Text("vm%".into())]);
    }

    #[test]
    fn test_mysql_quoting() {
        let mut params = Vec::new();
        let sql = Expr::col("ems_id")
            .eq(1)
            .build_with_dialect(Dialect::Mysql, &mut params, 0);
        assert_eq!(sql, "`ems_id` = ?");
    }

    #[test]
    fn test_referenced_columns() {
        let expr = Expr::col("a")
            .eq(1)
            .and(Expr::col("b").in_select(SelectQuery::new("t").columns(["c"])));
        assert_eq!(expr.referenced_columns(), vec!["a", "b"]);
    }
}
