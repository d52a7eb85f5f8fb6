use std::marker::PhantomData;

use anyhow::{Result, bail};
use sea_query::{Alias, OnConflict, SimpleExpr, Value};

use crate::entity::Entity;
use crate::query::{self, Dialect, Query};

/// Builder for constructing INSERT queries.
pub struct InsertBuilder<M: Entity> {
    values: Vec<(&'static str, Value)>,
    conflict: Option<Conflict>,
    _marker: PhantomData<M>,
}

struct Conflict {
    target: Vec<&'static str>,
    update: Vec<&'static str>,
}

impl<M: Entity> Default for InsertBuilder<M> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            conflict: None,
            _marker: PhantomData,
        }
    }
}

impl<M: Entity> InsertBuilder<M> {
    /// Creates a new INSERT query builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate every field of the entity's own table from an entity instance.
    /// Fields read from joined tables are skipped.
    #[must_use]
    pub fn from_entity(entity: &M) -> Self {
        let specs = M::column_specs();
        let values = entity
            .values()
            .into_iter()
            .filter_map(|(field, value)| {
                match specs.iter().find(|(name, _, _)| *name == field) {
                    Some(&(_, table, column)) if table == M::TABLE => Some((column, value)),
                    Some(_) => None,
                    None => Some((field, value)),
                }
            })
            .collect();

        Self {
            values,
            ..Self::default()
        }
    }

    /// Sets a column value for the insert.
    #[must_use]
    pub fn set<V>(mut self, column: &'static str, value: V) -> Self
    where
        V: Into<Value>,
    {
        self.values.push((column, value.into()));
        self
    }

    /// Handle conflicts on the given columns. Follow with [`Self::do_nothing`]
    /// or one of the `do_update` variants; on its own the conflict is ignored.
    #[must_use]
    pub fn on_conflict_columns(mut self, columns: &[&'static str]) -> Self {
        self.conflict = Some(Conflict {
            target: columns.to_vec(),
            update: Vec::new(),
        });
        self
    }

    /// Shorthand for a single conflict column.
    #[must_use]
    pub fn on_conflict(self, column: &'static str) -> Self {
        self.on_conflict_columns(&[column])
    }

    /// On conflict, keep the existing row.
    #[must_use]
    pub fn do_nothing(mut self) -> Self {
        if let Some(conflict) = &mut self.conflict {
            conflict.update.clear();
        }
        self
    }

    /// On conflict, overwrite the listed columns with the new values.
    #[must_use]
    pub fn do_update(mut self, columns: &[&'static str]) -> Self {
        if let Some(conflict) = &mut self.conflict {
            conflict.update = columns.to_vec();
        }
        self
    }

    /// On conflict, overwrite every inserted column outside the conflict target.
    #[must_use]
    pub fn do_update_all(mut self) -> Self {
        if let Some(conflict) = &mut self.conflict {
            conflict.update = self
                .values
                .iter()
                .map(|(column, _)| *column)
                .filter(|column| !conflict.target.contains(column))
                .collect();
        }
        self
    }

    /// Build the INSERT query for the default dialect.
    ///
    /// # Errors
    ///
    /// Returns an error when no column has been set.
    pub fn build(self) -> Result<Query> {
        self.build_for(Dialect::default())
    }

    /// Build the INSERT query for `dialect`.
    ///
    /// # Errors
    ///
    /// Returns an error when no column has been set.
    pub fn build_for(self, dialect: Dialect) -> Result<Query> {
        if self.values.is_empty() {
            bail!("nothing to insert into '{}'", M::TABLE);
        }

        let mut statement = sea_query::Query::insert();
        statement.into_table(Alias::new(M::TABLE));

        let (columns, row): (Vec<_>, Vec<_>) = self
            .values
            .into_iter()
            .map(|(column, value)| (Alias::new(column), SimpleExpr::Value(value)))
            .unzip();
        statement.columns(columns);
        statement.values_panic(row);

        if let Some(Conflict { target, update }) = self.conflict {
            let mut on_conflict = OnConflict::columns(target.into_iter().map(Alias::new));
            if update.is_empty() {
                on_conflict.do_nothing();
            } else {
                on_conflict.update_columns(update.into_iter().map(Alias::new));
            }
            statement.on_conflict(on_conflict);
        }

        Ok(query::render(&statement, dialect, M::TABLE, "InsertBuilder"))
    }
}
