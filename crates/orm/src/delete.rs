use std::marker::PhantomData;

use sea_query::{Alias, SimpleExpr};

use crate::entity::Entity;
use crate::filter::Filter;
use crate::query::{self, Dialect, Query};

/// Builder for constructing DELETE queries.
pub struct DeleteBuilder<M: Entity> {
    filters: Vec<SimpleExpr>,
    returning: Vec<&'static str>,
    _marker: PhantomData<M>,
}

impl<M: Entity> Default for DeleteBuilder<M> {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            returning: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl<M: Entity> DeleteBuilder<M> {
    /// Creates a new DELETE query builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
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

    /// Whether any WHERE clause has been added.
    #[must_use]
    pub fn is_filtered(&self) -> bool {
        !self.filters.is_empty()
    }

    /// Specifies columns to return from deleted rows.
    #[must_use]
    pub fn returning(mut self, column: &'static str) -> Self {
        self.returning.push(column);
        self
    }

    /// Build the DELETE query for the default dialect.
    #[must_use]
    pub fn build(self) -> Query {
        self.build_for(Dialect::default())
    }

    /// Build the DELETE query for `dialect`.
    #[must_use]
    pub fn build_for(self, dialect: Dialect) -> Query {
        let mut statement = sea_query::Query::delete();
        statement.from_table(Alias::new(M::TABLE));

        for filter in self.filters {
            statement.and_where(filter);
        }

        for column in self.returning {
            statement.returning_col(Alias::new(column));
        }

        query::render(&statement, dialect, M::TABLE, "DeleteBuilder")
    }
}
