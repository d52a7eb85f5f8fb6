use std::collections::HashMap;
use std::marker::PhantomData;

use anyhow::{Result, bail};
use sea_query::{Alias, Asterisk, ColumnRef, Expr, Func, IntoIden, SelectStatement, SimpleExpr};

use crate::entity::Entity;
use crate::filter::{Column, Filter};
use crate::join::{Join, JoinSpec};
use crate::query::{self, Dialect, Query};

/// Sort direction of an [`OrderSpec`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSpec {
    /// Sort column; unqualified columns belong to the selected entity's table.
    pub column: Column,
    /// Sort direction.
    pub order: Order,
}

impl OrderSpec {
    /// Ascending order on `column`.
    #[must_use]
    pub fn asc(column: impl Into<Column>) -> Self {
        Self {
            column: column.into(),
            order: Order::Asc,
        }
    }

    /// Descending order on `column`.
    #[must_use]
    pub fn desc(column: impl Into<Column>) -> Self {
        Self {
            column: column.into(),
            order: Order::Desc,
        }
    }
}

/// Builder for constructing SELECT queries.
pub struct SelectBuilder<M: Entity> {
    filters: Vec<SimpleExpr>,
    columns: Vec<&'static str>,
    limit: Option<u64>,
    offset: Option<u64>,
    order: Vec<(ColumnRef, sea_query::Order)>,
    joins: Vec<JoinSpec>,
    _marker: PhantomData<M>,
}

impl<M: Entity> Default for SelectBuilder<M> {
    fn default() -> Self {
        let joins = M::joins().into_iter().map(|join| join.into_join_spec(M::TABLE)).collect();

        Self {
            filters: Vec::new(),
            columns: Vec::new(),
            limit: None,
            offset: None,
            order: Vec::new(),
            joins,
            _marker: PhantomData,
        }
        .order(M::ordering())
    }
}

impl<M: Entity> SelectBuilder<M> {
    /// Creates a new SELECT query builder.
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

    /// Restricts the selected fields to those named; an empty slice selects
    /// the full projection.
    #[must_use]
    pub fn columns(mut self, columns: &[&'static str]) -> Self {
        self.columns = columns.to_vec();
        self
    }

    /// Sets the maximum number of rows to return.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the number of rows to skip.
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Adds ascending ORDER BY clause.
    #[must_use]
    pub fn order_by(self, column: impl Into<Column>) -> Self {
        self.order([OrderSpec::asc(column)])
    }

    /// Adds descending ORDER BY clause.
    #[must_use]
    pub fn order_by_desc(self, column: impl Into<Column>) -> Self {
        self.order([OrderSpec::desc(column)])
    }

    /// Appends ORDER BY terms.
    #[must_use]
    pub fn order(mut self, specs: impl IntoIterator<Item = OrderSpec>) -> Self {
        self.order.extend(specs.into_iter().map(order_term::<M>));
        self
    }

    /// Puts ORDER BY terms ahead of those already present, including the
    /// entity's default ordering.
    #[must_use]
    pub fn order_first(mut self, specs: impl IntoIterator<Item = OrderSpec>) -> Self {
        self.order.splice(0..0, specs.into_iter().map(order_term::<M>));
        self
    }

    /// Adds a JOIN clause to the query.
    #[must_use]
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join.into_join_spec(M::TABLE));
        self
    }

    /// Build the SELECT query for the default dialect.
    ///
    /// # Errors
    ///
    /// Returns an error if the column restriction leaves nothing to select.
    pub fn build(self) -> Result<Query> {
        self.build_for(Dialect::default())
    }

    /// Build the SELECT query for `dialect`.
    ///
    /// # Errors
    ///
    /// Returns an error if the column restriction leaves nothing to select.
    pub fn build_for(self, dialect: Dialect) -> Result<Query> {
        let mut statement = sea_query::Query::select();
        self.select_fields(&mut statement)?;
        self.scope(&mut statement);

        if let Some(limit) = self.limit {
            statement.limit(limit);
        }
        if let Some(offset) = self.offset {
            statement.offset(offset);
        }
        for (column, order) in self.order {
            statement.order_by(column, order);
        }

        Ok(query::render(&statement, dialect, M::TABLE, "SelectBuilder"))
    }

    /// Build a `SELECT COUNT(*)` over the same tables and filters, ignoring
    /// ordering, limit and offset. The count is returned in column `count`.
    #[must_use]
    pub fn count(&self, dialect: Dialect) -> Query {
        let mut statement = sea_query::Query::select();
        statement.expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"));
        self.scope(&mut statement);
        query::render(&statement, dialect, M::TABLE, "SelectBuilder count")
    }

    /// Build a query returning at most one row when any row matches.
    #[must_use]
    pub fn exists(&self, dialect: Dialect) -> Query {
        let mut statement = sea_query::Query::select();
        statement.expr_as(Expr::cust("1"), Alias::new("found"));
        self.scope(&mut statement);
        statement.limit(1);
        query::render(&statement, dialect, M::TABLE, "SelectBuilder exists")
    }

    // FROM, JOIN and WHERE clauses shared by every projection
    fn scope(&self, statement: &mut SelectStatement) {
        statement.from(Alias::new(M::TABLE));

        for JoinSpec {
            table,
            alias,
            on,
            kind,
        } in self.joins.iter().cloned()
        {
            let table_alias = Alias::new(table);
            if let Some(alias) = alias {
                statement.join_as(kind, table_alias, Alias::new(alias), on);
            } else {
                statement.join(kind, table_alias, on);
            }
        }

        for filter in &self.filters {
            statement.and_where(filter.clone());
        }
    }

    fn select_fields(&self, statement: &mut SelectStatement) -> Result<()> {
        let spec_map: HashMap<&str, (&str, &str)> = M::column_specs()
            .into_iter()
            .map(|(field, table, column)| (field, (table, column)))
            .collect();

        let fields: Vec<&str> = M::projection()
            .iter()
            .copied()
            .filter(|field| self.columns.is_empty() || self.columns.contains(field))
            .collect();
        if fields.is_empty() {
            bail!("no columns of '{}' match {:?}", M::TABLE, self.columns);
        }

        for field in fields {
            if let Some(&(table, column)) = spec_map.get(field) {
                statement
                    .expr_as(SimpleExpr::Column(table_column(table, column)), Alias::new(field));
            } else {
                statement.column(table_column(M::TABLE, field));
            }
        }
        Ok(())
    }
}

fn order_term<M: Entity>(spec: OrderSpec) -> (ColumnRef, sea_query::Order) {
    let column = table_column(spec.column.table.unwrap_or(M::TABLE), spec.column.name);
    let order = match spec.order {
        Order::Asc => sea_query::Order::Asc,
        Order::Desc => sea_query::Order::Desc,
    };
    (column, order)
}

pub(crate) fn table_column(table: &str, column: &str) -> ColumnRef {
    ColumnRef::TableColumn(Alias::new(table).into_iden(), Alias::new(column).into_iden())
}
