use std::marker::PhantomData;

use anyhow::{Result, bail};
use sea_query::{Alias, Expr, SimpleExpr, Value};

use crate::entity::Entity;
use crate::filter::Filter;
use crate::query::{self, Dialect, Query};

/// Builder for constructing UPDATE queries.
pub struct UpdateBuilder<M: Entity> {
    set_clauses: Vec<(&'static str, SimpleExpr)>,
    filters: Vec<SimpleExpr>,
    returning: Vec<&'static str>,
    _marker: PhantomData<M>,
}

impl<M: Entity> Default for UpdateBuilder<M> {
    fn default() -> Self {
        Self {
            set_clauses: Vec::new(),
            filters: Vec::new(),
            returning: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl<M: Entity> UpdateBuilder<M> {
    /// Creates a new UPDATE query builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column to a new value.
    #[must_use]
    pub fn set<V>(mut self, column: &'static str, value: V) -> Self
    where
        V: Into<Value>,
    {
        self.set_clauses.push((column, SimpleExpr::Value(value.into())));
        self
    }

    /// Adds `value` to the column's current value (`column = column + value`).
    #[must_use]
    pub fn incr<V>(mut self, column: &'static str, value: V) -> Self
    where
        V: Into<Value>,
    {
        let expr = Expr::col(Alias::new(column)).add(value.into());
        self.set_clauses.push((column, expr));
        self
    }

    /// Adds a WHERE clause filter.
    #[must_use]
    pub fn r#where(mut self, filter: Filter) -> Self {
        self.filters.push(filter.into_expr(M::TABLE));
        self
    }

    /// Adds a WHERE clause filter when one is given.
    #[must_use]
    pub fn where_opt(self, filter: Option<Filter>) -> Self {
        match filter {
            Some(filter) => self.r#where(filter),
            None => self,
        }
    }

    /// Specifies columns to return from updated rows.
    #[must_use]
    pub fn returning(mut self, column: &'static str) -> Self {
        self.returning.push(column);
        self
    }

    /// Whether no assignment has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set_clauses.is_empty()
    }

    /// Build the UPDATE query for the default dialect.
    ///
    /// # Errors
    ///
    /// Returns an error when there is nothing to assign.
    pub fn build(self) -> Result<Query> {
        self.build_for(Dialect::default())
    }

    /// Build the UPDATE query for `dialect`.
    ///
    /// # Errors
    ///
    /// Returns an error when there is nothing to assign.
    pub fn build_for(self, dialect: Dialect) -> Result<Query> {
        if self.set_clauses.is_empty() {
            bail!("nothing to update in '{}'", M::TABLE);
        }

        let mut statement = sea_query::Query::update();
        statement.table(Alias::new(M::TABLE));

        for (column, value) in self.set_clauses {
            statement.value(Alias::new(column), value);
        }

        for expr in self.filters {
            statement.and_where(expr);
        }

        for column in self.returning {
            statement.returning_col(Alias::new(column));
        }

        Ok(query::render(&statement, dialect, M::TABLE, "UpdateBuilder"))
    }
}
