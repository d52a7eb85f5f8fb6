use std::ops;

use sea_query::{Expr, ExprTrait, SimpleExpr, Value};

use crate::select::table_column;

/// A column reference, optionally qualified with a table.
///
/// Unqualified columns resolve against the table of the entity the filter is
/// applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Owning table, `None` for the entity's own table.
    pub table: Option<&'static str>,
    /// Column name.
    pub name: &'static str,
}

impl Column {
    /// Column of the entity's own table.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { table: None, name }
    }

    /// Column of an explicit table.
    #[must_use]
    pub const fn of(table: &'static str, name: &'static str) -> Self {
        Self {
            table: Some(table),
            name,
        }
    }

    fn resolve(self, default_table: &'static str) -> SimpleExpr {
        Expr::col(table_column(self.table.unwrap_or(default_table), self.name)).into()
    }
}

impl From<&'static str> for Column {
    fn from(name: &'static str) -> Self {
        Self::new(name)
    }
}

impl From<(&'static str, &'static str)> for Column {
    fn from((table, name): (&'static str, &'static str)) -> Self {
        Self::of(table, name)
    }
}

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Cmp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Cmp {
    fn apply(self, left: SimpleExpr, right: impl Into<SimpleExpr>) -> SimpleExpr {
        match self {
            Self::Eq => left.eq(right),
            Self::Ne => left.ne(right),
            Self::Gt => left.gt(right),
            Self::Gte => left.gte(right),
            Self::Lt => left.lt(right),
            Self::Lte => left.lte(right),
        }
    }
}

/// A predicate tree used for `WHERE` clauses and join conditions.
///
/// Values are held as `sea_query::Value` but built from plain Rust types
/// (`i64`, `String`, `DateTime<Utc>`, ...) through `From` conversions, so callers
/// never touch the statement builder directly.
#[derive(Debug, Clone)]
pub enum Filter {
    /// column <op> value
    Cmp(Column, Cmp, Value),
    /// column <op> column
    ColCmp(Column, Cmp, Column),
    /// column IN (values)
    In(Column, Vec<Value>),
    /// column NOT IN (values)
    NotIn(Column, Vec<Value>),
    /// column IS NULL
    IsNull(Column),
    /// column IS NOT NULL
    IsNotNull(Column),
    /// column LIKE pattern
    Like(Column, String),
    /// column NOT LIKE pattern
    NotLike(Column, String),
    /// column BETWEEN low AND high
    Between(Column, Value, Value),
    /// column NOT BETWEEN low AND high
    NotBetween(Column, Value, Value),
    /// column = ANY(values), rendered as an IN list
    Any(Column, Vec<Value>),
    /// Every filter holds; an empty list is `TRUE`.
    And(Vec<Self>),
    /// At least one filter holds; an empty list is `FALSE`.
    Or(Vec<Self>),
    /// Negation.
    Not(Box<Self>),
}

impl Filter {
    /// Convert into a `sea-query` expression, resolving unqualified columns
    /// against `default_table`.
    #[must_use]
    pub fn into_expr(self, default_table: &'static str) -> SimpleExpr {
        match self {
            Self::Cmp(col, op, val) => op.apply(col.resolve(default_table), val),
            Self::ColCmp(left, op, right) => {
                op.apply(left.resolve(default_table), right.resolve(default_table))
            }
            Self::In(col, vals) | Self::Any(col, vals) => col.resolve(default_table).is_in(vals),
            Self::NotIn(col, vals) => col.resolve(default_table).is_not_in(vals),
            Self::IsNull(col) => col.resolve(default_table).is_null(),
            Self::IsNotNull(col) => col.resolve(default_table).is_not_null(),
            Self::Like(col, pattern) => col.resolve(default_table).like(pattern),
            Self::NotLike(col, pattern) => col.resolve(default_table).not_like(pattern),
            Self::Between(col, low, high) => col.resolve(default_table).between(low, high),
            Self::NotBetween(col, low, high) => {
                col.resolve(default_table).not_between(low, high)
            }
            Self::And(filters) => {
                let mut exprs = filters.into_iter().map(|f| f.into_expr(default_table));
                exprs
                    .next()
                    .map_or_else(|| Expr::value(true), |first| exprs.fold(first, SimpleExpr::and))
            }
            Self::Or(filters) => {
                let mut exprs = filters.into_iter().map(|f| f.into_expr(default_table));
                exprs
                    .next()
                    .map_or_else(|| Expr::value(false), |first| exprs.fold(first, SimpleExpr::or))
            }
            Self::Not(filter) => Expr::expr(filter.into_expr(default_table)).not(),
        }
    }

    /// `self AND other`, flattening nested conjunctions.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), right) => {
                left.push(right);
                Self::And(left)
            }
            (left, right) => Self::And(vec![left, right]),
        }
    }

    /// `self OR other`, flattening nested disjunctions.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::Or(mut left), Self::Or(right)) => {
                left.extend(right);
                Self::Or(left)
            }
            (Self::Or(mut left), right) => {
                left.push(right);
                Self::Or(left)
            }
            (left, right) => Self::Or(vec![left, right]),
        }
    }

    /// Conjunction of two optional filters.
    #[must_use]
    pub fn all(left: Option<Self>, right: Option<Self>) -> Option<Self> {
        match (left, right) {
            (Some(left), Some(right)) => Some(left.and(right)),
            (left, right) => left.or(right),
        }
    }

    /// column = value
    #[must_use]
    pub fn eq(col: impl Into<Column>, val: impl Into<Value>) -> Self {
        Self::Cmp(col.into(), Cmp::Eq, val.into())
    }

    /// column != value
    #[must_use]
    pub fn ne(col: impl Into<Column>, val: impl Into<Value>) -> Self {
        Self::Cmp(col.into(), Cmp::Ne, val.into())
    }

    /// column > value
    #[must_use]
    pub fn gt(col: impl Into<Column>, val: impl Into<Value>) -> Self {
        Self::Cmp(col.into(), Cmp::Gt, val.into())
    }

    /// column >= value
    #[must_use]
    pub fn gte(col: impl Into<Column>, val: impl Into<Value>) -> Self {
        Self::Cmp(col.into(), Cmp::Gte, val.into())
    }

    /// column < value
    #[must_use]
    pub fn lt(col: impl Into<Column>, val: impl Into<Value>) -> Self {
        Self::Cmp(col.into(), Cmp::Lt, val.into())
    }

    /// column <= value
    #[must_use]
    pub fn lte(col: impl Into<Column>, val: impl Into<Value>) -> Self {
        Self::Cmp(col.into(), Cmp::Lte, val.into())
    }

    /// column IN (values)
    #[must_use]
    pub fn r#in(col: impl Into<Column>, vals: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Self::In(col.into(), vals.into_iter().map(Into::into).collect())
    }

    /// column NOT IN (values)
    #[must_use]
    pub fn not_in(
        col: impl Into<Column>, vals: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Self {
        Self::NotIn(col.into(), vals.into_iter().map(Into::into).collect())
    }

    /// column = ANY(values)
    #[must_use]
    pub fn any(col: impl Into<Column>, vals: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Self::Any(col.into(), vals.into_iter().map(Into::into).collect())
    }

    /// column IS NULL
    #[must_use]
    pub fn is_null(col: impl Into<Column>) -> Self {
        Self::IsNull(col.into())
    }

    /// column IS NOT NULL
    #[must_use]
    pub fn is_not_null(col: impl Into<Column>) -> Self {
        Self::IsNotNull(col.into())
    }

    /// column LIKE pattern
    #[must_use]
    pub fn like(col: impl Into<Column>, pattern: impl Into<String>) -> Self {
        Self::Like(col.into(), pattern.into())
    }

    /// column NOT LIKE pattern
    #[must_use]
    pub fn not_like(col: impl Into<Column>, pattern: impl Into<String>) -> Self {
        Self::NotLike(col.into(), pattern.into())
    }

    /// column BETWEEN low AND high
    #[must_use]
    pub fn between(col: impl Into<Column>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::Between(col.into(), low.into(), high.into())
    }

    /// column NOT BETWEEN low AND high
    #[must_use]
    pub fn not_between(
        col: impl Into<Column>, low: impl Into<Value>, high: impl Into<Value>,
    ) -> Self {
        Self::NotBetween(col.into(), low.into(), high.into())
    }

    /// Column-to-column equality, typically a join condition.
    #[must_use]
    pub fn col_eq(left: impl Into<Column>, right: impl Into<Column>) -> Self {
        Self::ColCmp(left.into(), Cmp::Eq, right.into())
    }

    /// Column-to-column inequality.
    #[must_use]
    pub fn col_ne(left: impl Into<Column>, right: impl Into<Column>) -> Self {
        Self::ColCmp(left.into(), Cmp::Ne, right.into())
    }

    /// left > right
    #[must_use]
    pub fn col_gt(left: impl Into<Column>, right: impl Into<Column>) -> Self {
        Self::ColCmp(left.into(), Cmp::Gt, right.into())
    }

    /// left >= right
    #[must_use]
    pub fn col_gte(left: impl Into<Column>, right: impl Into<Column>) -> Self {
        Self::ColCmp(left.into(), Cmp::Gte, right.into())
    }

    /// left < right
    #[must_use]
    pub fn col_lt(left: impl Into<Column>, right: impl Into<Column>) -> Self {
        Self::ColCmp(left.into(), Cmp::Lt, right.into())
    }

    /// left <= right
    #[must_use]
    pub fn col_lte(left: impl Into<Column>, right: impl Into<Column>) -> Self {
        Self::ColCmp(left.into(), Cmp::Lte, right.into())
    }
}

impl ops::Not for Filter {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }
}
