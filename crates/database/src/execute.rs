//! Runs rendered statements through the `sqlx` `Any` driver.

use anyhow::{Context, Result};
use dbkit_orm::{DataType, Query, Row};
use sqlx::Executor;
use sqlx::any::{Any, AnyArguments};

type Statement<'q> = sqlx::query::Query<'q, Any, AnyArguments<'q>>;

/// Execute a statement, returning the number of affected rows.
pub async fn execute<'c, E>(executor: E, query: &Query, show_sql: bool) -> Result<u64>
where
    E: Executor<'c, Database = Any>,
{
    log(query, show_sql);
    let result = bind(query)?.execute(executor).await?;
    Ok(result.rows_affected())
}

/// Fetch the first row, if any.
pub async fn fetch_optional<'c, E>(executor: E, query: &Query, show_sql: bool) -> Result<Option<Row>>
where
    E: Executor<'c, Database = Any>,
{
    log(query, show_sql);
    Ok(bind(query)?.fetch_optional(executor).await?)
}

/// Fetch every row.
pub async fn fetch_all<'c, E>(executor: E, query: &Query, show_sql: bool) -> Result<Vec<Row>>
where
    E: Executor<'c, Database = Any>,
{
    log(query, show_sql);
    Ok(bind(query)?.fetch_all(executor).await?)
}

fn log(query: &Query, show_sql: bool) {
    if show_sql {
        tracing::info!(sql = %query.sql, params = ?query.params, "executing statement");
    } else {
        tracing::debug!(sql = %query.sql, param_count = query.params.len(), "executing statement");
    }
}

// The `Any` driver has no unsigned types; temporal values are already text.
fn bind(query: &Query) -> Result<Statement<'_>> {
    let mut statement = sqlx::query(&query.sql);
    for param in &query.params {
        statement = match param.clone() {
            DataType::Boolean(v) => statement.bind(v),
            DataType::Int32(v) => statement.bind(v),
            DataType::Int64(v) => statement.bind(v),
            DataType::Uint32(v) => statement.bind(v.map(i64::from)),
            DataType::Uint64(v) => {
                let v = v.map(i64::try_from).transpose().context("parameter out of range for i64")?;
                statement.bind(v)
            }
            DataType::Float(v) => statement.bind(v),
            DataType::Double(v) => statement.bind(v),
            DataType::Str(v)
            | DataType::Date(v)
            | DataType::Time(v)
            | DataType::Timestamp(v) => statement.bind(v),
            DataType::Binary(v) => statement.bind(v),
        };
    }
    Ok(statement)
}
