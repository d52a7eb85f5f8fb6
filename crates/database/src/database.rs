use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use dbkit_orm::{
    DeleteBuilder, Dialect, Entity, FetchValue, Filter, InsertBuilder, Probe, Record,
    SelectBuilder, UpdateBuilder, Value,
};
use futures::future::BoxFuture;
use sqlx::any::{Any, AnyPoolOptions};
use sqlx::pool::PoolConnection;
use sqlx::{AnyConnection, AnyPool, Connection, Transaction};
use tracing::instrument;

use crate::config::{Config, ConnectionConfig, DatabaseKind};
use crate::execute;
use crate::pager::{MAX_WINDOW, Pager};
use crate::snowflake::IdGenerator;

/// Shared access to one database: a connection pool plus the id generator
/// used for new records.
///
/// Cloning is cheap; clones share the pool and the generator.
#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
    kind: DatabaseKind,
    show_sql: bool,
    ids: Arc<dyn IdGenerator>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("kind", &self.kind)
            .field("show_sql", &self.show_sql)
            .field("pool_size", &self.pool.size())
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Validate `config` and open a connection pool for it.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid or the database
    /// cannot be reached.
    #[instrument(skip_all, fields(kind = %config.kind, address = %config.address))]
    pub async fn connect(config: &Config, ids: Arc<dyn IdGenerator>) -> Result<Self> {
        config.validate().context("invalid database config")?;
        sqlx::any::install_default_drivers();

        let limits = &config.connection;
        tracing::debug!(
            max_open = limits.max_open,
            max_idle = limits.max_idle,
            max_lifetime = ?limits.max_lifetime,
            "initializing connection pool"
        );

        let pool = pool_options(limits)
            .connect(&config.url())
            .await
            .with_context(|| {
                format!("failed to connect to {} database at {}", config.kind, config.address)
            })?;

        Ok(Self::with_pool(pool, config.kind, config.show_sql, ids))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn with_pool(
        pool: AnyPool, kind: DatabaseKind, show_sql: bool, ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            pool,
            kind,
            show_sql,
            ids,
        }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// The configured engine.
    #[must_use]
    pub const fn kind(&self) -> DatabaseKind {
        self.kind
    }

    const fn dialect(&self) -> Dialect {
        self.kind.dialect()
    }

    /// Check out a pooled connection, usable as a session.
    ///
    /// # Errors
    ///
    /// Returns an error when no connection can be obtained.
    pub async fn acquire(&self) -> Result<PoolConnection<Any>> {
        Ok(self.pool.acquire().await?)
    }

    /// Start a transaction; it rolls back when dropped without a commit.
    ///
    /// # Errors
    ///
    /// Returns an error when the transaction cannot be started.
    pub async fn begin(&self) -> Result<Transaction<'static, Any>> {
        Ok(self.pool.begin().await?)
    }

    /// Run `f` inside a transaction, committing when it succeeds and rolling
    /// back when it fails.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or of starting or committing the transaction.
    pub async fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut AnyConnection) -> BoxFuture<'c, Result<T>>,
    {
        let mut tx = self.pool.begin().await?;
        match f(&mut *tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "transaction rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Round-trip to the database.
    ///
    /// # Errors
    ///
    /// Returns an error when the database does not answer.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        conn.ping().await?;
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Insert `records` one statement at a time, returning the number of rows
    /// inserted. Records asking for a generated id get one when their key is
    /// still `0`.
    ///
    /// # Errors
    ///
    /// Returns the first database error; earlier records stay inserted unless
    /// `session` is a transaction.
    pub async fn insert<R: Record>(
        &self, session: &mut AnyConnection, records: &mut [R],
    ) -> Result<u64> {
        let mut inserted = 0;
        for record in records.iter_mut() {
            if record.use_auto_id() && record.pk() == 0 {
                let id = self.ids.next_id();
                tracing::debug!(table = R::TABLE, id, "assigning generated id");
                record.set_pk(id);
            }

            let query = InsertBuilder::<R>::from_entity(record).build_for(self.dialect())?;
            inserted += execute::execute(&mut *session, &query, self.show_sql).await?;
        }
        Ok(inserted)
    }

    /// Delete the rows matching each probe, returning the number deleted.
    ///
    /// # Errors
    ///
    /// Returns an error, before deleting anything, when a probe has no field
    /// set or sets a field read from a joined table.
    pub async fn delete<P: Probe>(&self, session: &mut AnyConnection, probes: &[P]) -> Result<u64> {
        let mut filters = Vec::with_capacity(probes.len());
        for probe in probes {
            let Some(filter) = write_filter(probe)? else {
                bail!("refusing to delete from '{}' without conditions", P::Entity::TABLE);
            };
            filters.push(filter);
        }

        let mut deleted = 0;
        for filter in filters {
            let query = DeleteBuilder::<P::Entity>::new().r#where(filter).build_for(self.dialect());
            deleted += execute::execute(&mut *session, &query, self.show_sql).await?;
        }
        Ok(deleted)
    }

    /// Delete the rows matching `cond` and the probe's set fields.
    ///
    /// # Errors
    ///
    /// Returns an error when the probe sets a field read from a joined table,
    /// or any database error.
    pub async fn delete_by_cond<P: Probe>(
        &self, session: &mut AnyConnection, probe: &P, cond: Filter,
    ) -> Result<u64> {
        let query = DeleteBuilder::<P::Entity>::new()
            .where_opt(Filter::all(Some(cond), write_filter(probe)?))
            .build_for(self.dialect());
        execute::execute(session, &query, self.show_sql).await
    }

    /// Assign the probe's set fields to the row with the probe's primary key.
    /// A non-empty `cols` limits the assigned fields.
    ///
    /// # Errors
    ///
    /// Returns an error when the key is unset or nothing is left to assign.
    pub async fn update_by_id<P: Probe>(
        &self, session: &mut AnyConnection, probe: &P, cols: &[&str],
    ) -> Result<u64> {
        let key = key_filter(probe)?;
        let query = assignments(probe, cols, true).r#where(key).build_for(self.dialect())?;
        execute::execute(session, &query, self.show_sql).await
    }

    /// Assign the probe's set fields to every row matching `cond`. A non-empty
    /// `cols` limits the assigned fields.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is left to assign.
    pub async fn update_by_cond<P: Probe>(
        &self, session: &mut AnyConnection, probe: &P, cond: Filter, cols: &[&str],
    ) -> Result<u64> {
        let query = assignments(probe, cols, false).r#where(cond).build_for(self.dialect())?;
        execute::execute(session, &query, self.show_sql).await
    }

    /// Add `value` (`1` when `None`) to `column` of the row with the probe's
    /// primary key.
    ///
    /// # Errors
    ///
    /// Returns an error when the key is unset.
    pub async fn incr_by_id<P: Probe>(
        &self, session: &mut AnyConnection, probe: &P, column: &'static str, value: Option<i64>,
    ) -> Result<u64> {
        let query = UpdateBuilder::<P::Entity>::new()
            .incr(column, value.unwrap_or(1))
            .r#where(key_filter(probe)?)
            .build_for(self.dialect())?;
        execute::execute(session, &query, self.show_sql).await
    }

    /// Add `value` (`1` when `None`) to `column` of every row matching `cond`
    /// and the probe's set fields.
    ///
    /// # Errors
    ///
    /// Returns any database error.
    pub async fn incr_by_cond<P: Probe>(
        &self, session: &mut AnyConnection, probe: &P, cond: Filter, column: &'static str,
        value: Option<i64>,
    ) -> Result<u64> {
        let query = UpdateBuilder::<P::Entity>::new()
            .incr(column, value.unwrap_or(1))
            .where_opt(Filter::all(Some(cond), write_filter(probe)?))
            .build_for(self.dialect())?;
        execute::execute(session, &query, self.show_sql).await
    }

    /// Load the first row matching the probe into the probe itself. A
    /// non-empty `cols` limits the columns read.
    ///
    /// # Errors
    ///
    /// Returns an error when the query fails or a column cannot be decoded.
    pub async fn get<P: Probe>(&self, probe: &mut P, cols: &[&'static str]) -> Result<bool> {
        let filter = probe.filter();
        self.get_where(probe, filter, cols).await
    }

    /// As [`Self::get`], additionally requiring `cond`.
    ///
    /// # Errors
    ///
    /// Returns an error when the query fails or a column cannot be decoded.
    pub async fn get_by_cond<P: Probe>(
        &self, probe: &mut P, cond: Filter, cols: &[&'static str],
    ) -> Result<bool> {
        let filter = Filter::all(Some(cond), probe.filter());
        self.get_where(probe, filter, cols).await
    }

    async fn get_where<P: Probe>(
        &self, probe: &mut P, filter: Option<Filter>, cols: &[&'static str],
    ) -> Result<bool> {
        let query = SelectBuilder::<P::Entity>::new()
            .where_opt(filter)
            .columns(cols)
            .limit(1)
            .build_for(self.dialect())?;

        let Some(row) = execute::fetch_optional(&self.pool, &query, self.show_sql).await? else {
            return Ok(false);
        };
        probe.hydrate(&row)?;
        Ok(true)
    }

    /// The first entity matching the probe.
    ///
    /// # Errors
    ///
    /// Returns an error when the query fails or the row cannot be decoded.
    pub async fn first<P: Probe>(&self, probe: &P) -> Result<Option<P::Entity>> {
        let query = SelectBuilder::<P::Entity>::new()
            .where_opt(probe.filter())
            .limit(1)
            .build_for(self.dialect())?;

        let row = execute::fetch_optional(&self.pool, &query, self.show_sql).await?;
        row.as_ref().map(P::Entity::from_row).transpose()
    }

    /// Whether any row matches the probe.
    ///
    /// # Errors
    ///
    /// Returns any database error.
    pub async fn exist<P: Probe>(&self, probe: &P) -> Result<bool> {
        self.exist_where::<P::Entity>(probe.filter()).await
    }

    /// Whether any row matches `cond` and the probe.
    ///
    /// # Errors
    ///
    /// Returns any database error.
    pub async fn exist_by_cond<P: Probe>(&self, probe: &P, cond: Filter) -> Result<bool> {
        self.exist_where::<P::Entity>(Filter::all(Some(cond), probe.filter())).await
    }

    async fn exist_where<E: Entity>(&self, filter: Option<Filter>) -> Result<bool> {
        let query = SelectBuilder::<E>::new().where_opt(filter).exists(self.dialect());
        let row = execute::fetch_optional(&self.pool, &query, self.show_sql).await?;
        Ok(row.is_some())
    }

    /// Number of rows matching the probe.
    ///
    /// # Errors
    ///
    /// Returns any database error.
    pub async fn count<P: Probe>(&self, probe: &P) -> Result<u64> {
        self.count_rows(&SelectBuilder::<P::Entity>::new().where_opt(probe.filter())).await
    }

    /// Number of rows matching `cond` and the probe.
    ///
    /// # Errors
    ///
    /// Returns any database error.
    pub async fn count_by_cond<P: Probe>(&self, probe: &P, cond: Filter) -> Result<u64> {
        let builder =
            SelectBuilder::<P::Entity>::new().where_opt(Filter::all(Some(cond), probe.filter()));
        self.count_rows(&builder).await
    }

    async fn count_rows<E: Entity>(&self, builder: &SelectBuilder<E>) -> Result<u64> {
        let query = builder.count(self.dialect());
        let Some(row) = execute::fetch_optional(&self.pool, &query, self.show_sql).await? else {
            return Ok(0);
        };
        let count = i64::fetch(&row, "count")?;
        u64::try_from(count).context("negative row count")
    }

    /// Every entity matching the probe.
    ///
    /// # Errors
    ///
    /// Returns an error when the query fails or a row cannot be decoded.
    pub async fn find<P: Probe>(&self, probe: &P) -> Result<Vec<P::Entity>> {
        self.find_with(probe, |select| select).await
    }

    /// As [`Self::find`], letting `join` extend the select with joins,
    /// ordering, extra filters or limits.
    ///
    /// # Errors
    ///
    /// Returns an error when the query fails or a row cannot be decoded.
    pub async fn find_with<P, J>(&self, probe: &P, join: J) -> Result<Vec<P::Entity>>
    where
        P: Probe,
        J: FnOnce(SelectBuilder<P::Entity>) -> SelectBuilder<P::Entity>,
    {
        self.fetch(join(SelectBuilder::new().where_opt(probe.filter()))).await
    }

    /// Every entity matching `cond` and the probe.
    ///
    /// # Errors
    ///
    /// Returns an error when the query fails or a row cannot be decoded.
    pub async fn find_by_cond<P: Probe>(&self, probe: &P, cond: Filter) -> Result<Vec<P::Entity>> {
        self.find_by_cond_with(probe, cond, |select| select).await
    }

    /// As [`Self::find_by_cond`], with a `join` hook as in [`Self::find_with`].
    ///
    /// # Errors
    ///
    /// Returns an error when the query fails or a row cannot be decoded.
    pub async fn find_by_cond_with<P, J>(
        &self, probe: &P, cond: Filter, join: J,
    ) -> Result<Vec<P::Entity>>
    where
        P: Probe,
        J: FnOnce(SelectBuilder<P::Entity>) -> SelectBuilder<P::Entity>,
    {
        let filter = Filter::all(Some(cond), probe.filter());
        self.fetch(join(SelectBuilder::new().where_opt(filter))).await
    }

    /// One page of entities together with the number of rows matching the
    /// pager's condition, regardless of the page window.
    ///
    /// # Errors
    ///
    /// Returns an error when a query fails or a row cannot be decoded.
    pub async fn find_by_paging<E: Entity>(&self, pager: &impl Pager) -> Result<(u64, Vec<E>)> {
        self.find_by_paging_with(pager, |select| select).await
    }

    /// As [`Self::find_by_paging`], with a `join` hook applied to both the
    /// count and the page.
    ///
    /// # Errors
    ///
    /// Returns an error when a query fails or a row cannot be decoded.
    pub async fn find_by_paging_with<E, J>(
        &self, pager: &impl Pager, join: J,
    ) -> Result<(u64, Vec<E>)>
    where
        E: Entity,
        J: FnOnce(SelectBuilder<E>) -> SelectBuilder<E>,
    {
        let select = join(SelectBuilder::new().where_opt(pager.cond()));
        let total = self.count_rows(&select).await?;

        let (limit, offset) = pager.limit();
        let (limit, offset) = (limit.min(MAX_WINDOW), offset.min(MAX_WINDOW));
        let mut select = select.order_first(pager.order_by());
        // engines only accept OFFSET after a LIMIT
        if offset > 0 {
            select = select.limit(if limit == 0 { MAX_WINDOW } else { limit }).offset(offset);
        } else if limit > 0 {
            select = select.limit(limit);
        }

        let page = self.fetch(select).await?;
        Ok((total, page))
    }

    async fn fetch<E: Entity>(&self, select: SelectBuilder<E>) -> Result<Vec<E>> {
        let query = select.build_for(self.dialect())?;
        let rows = execute::fetch_all(&self.pool, &query, self.show_sql).await?;
        rows.iter().map(E::from_row).collect()
    }
}

// `max_idle` only bounds idle connections; none are reserved
fn pool_options(limits: &ConnectionConfig) -> AnyPoolOptions {
    let max_lifetime = (!limits.max_lifetime.is_zero()).then_some(limits.max_lifetime);
    AnyPoolOptions::new().max_connections(limits.max_open).max_lifetime(max_lifetime)
}

// equality on the probe's primary key field
fn key_filter<P: Probe>(probe: &P) -> Result<Filter> {
    let key = P::Entity::PRIMARY_KEY;
    let Some(id) = probe.value(key) else {
        bail!("'{key}' of '{}' must be set to address a single row", P::Entity::TABLE);
    };
    Ok(Filter::eq(key, id))
}

// the probe's filter, provided every set field lives in the entity's table
fn write_filter<P: Probe>(probe: &P) -> Result<Option<Filter>> {
    let table = P::Entity::TABLE;
    let joined = P::Entity::column_specs()
        .into_iter()
        .find(|&(field, source, _)| source != table && probe.value(field).is_some());
    if let Some((field, ..)) = joined {
        bail!("'{field}' of '{table}' is read from a joined table and cannot filter a write");
    }
    Ok(probe.filter())
}

// SET clauses for the probe's own-table fields, limited to `cols` when given
fn assignments<P: Probe>(probe: &P, cols: &[&str], skip_key: bool) -> UpdateBuilder<P::Entity> {
    own_columns::<P::Entity>(probe.values())
        .into_iter()
        .filter(|(column, _)| !(skip_key && *column == P::Entity::PRIMARY_KEY))
        .filter(|(column, _)| cols.is_empty() || cols.contains(column))
        .fold(UpdateBuilder::new(), |builder, (column, value)| builder.set(column, value))
}

// map field names to columns of the entity's table, dropping joined fields
fn own_columns<E: Entity>(values: Vec<(&'static str, Value)>) -> Vec<(&'static str, Value)> {
    let specs = E::column_specs();
    values
        .into_iter()
        .filter_map(|(field, value)| match specs.iter().find(|(name, _, _)| *name == field) {
            Some(&(_, table, column)) if table == E::TABLE => Some((column, value)),
            Some(_) => None,
            None => Some((field, value)),
        })
        .collect()
}
