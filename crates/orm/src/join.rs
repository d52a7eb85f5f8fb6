use sea_query::{JoinType, SimpleExpr};

use crate::filter::Filter;

/// A join against another table, with its `ON` condition.
#[derive(Debug, Clone)]
pub struct Join {
    table: &'static str,
    alias: Option<&'static str>,
    on: Filter,
    kind: JoinKind,
}

/// Join flavours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl Join {
    /// A join of the given kind.
    #[must_use]
    pub const fn new(kind: JoinKind, table: &'static str, on: Filter) -> Self {
        Self {
            table,
            alias: None,
            on,
            kind,
        }
    }

    /// INNER JOIN.
    #[must_use]
    pub const fn inner(table: &'static str, on: Filter) -> Self {
        Self::new(JoinKind::Inner, table, on)
    }

    /// LEFT JOIN.
    #[must_use]
    pub const fn left(table: &'static str, on: Filter) -> Self {
        Self::new(JoinKind::Left, table, on)
    }

    /// RIGHT JOIN.
    #[must_use]
    pub const fn right(table: &'static str, on: Filter) -> Self {
        Self::new(JoinKind::Right, table, on)
    }

    /// FULL OUTER JOIN.
    #[must_use]
    pub const fn full(table: &'static str, on: Filter) -> Self {
        Self::new(JoinKind::Full, table, on)
    }

    /// Sets an alias for the joined table.
    #[must_use]
    pub const fn alias(mut self, alias: &'static str) -> Self {
        self.alias = Some(alias);
        self
    }

    /// Resolve the `ON` condition against the table being selected from.
    pub(crate) fn into_join_spec(self, default_table: &'static str) -> JoinSpec {
        let kind = match self.kind {
            JoinKind::Inner => JoinType::InnerJoin,
            JoinKind::Left => JoinType::LeftJoin,
            JoinKind::Right => JoinType::RightJoin,
            JoinKind::Full => JoinType::FullOuterJoin,
        };
        JoinSpec {
            table: self.table,
            alias: self.alias,
            on: self.on.into_expr(default_table),
            kind,
        }
    }
}

#[derive(Clone)]
pub(crate) struct JoinSpec {
    pub table: &'static str,
    pub alias: Option<&'static str>,
    pub on: SimpleExpr,
    pub kind: JoinType,
}
