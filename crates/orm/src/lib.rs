//! SQL statement building for `dbkit`.
//!
//! Provides a fluent API for building parameterized SQL with ``SeaQuery``,
//! entity metadata declared through the [`entity!`] macro, and row decoding
//! for the `sqlx` `Any` driver.
//!
//! # Quick Start
//!
//! ## Define an Entity
//!
//! ```ignore
//! use chrono::{DateTime, Utc};
//!
//! entity! {
//!     table = "posts",
//!     probe = PostProbe,
//!     key = id,
//!     auto_id = true,
//!     #[derive(Debug, Clone)]
//!     pub struct Post {
//!         pub id: i64,
//!         pub title: String,
//!         pub published: bool,
//!         pub created_at: DateTime<Utc>,
//!     }
//! }
//! ```
//!
//! ## Build Statements
//!
//! ```ignore
//! let query = SelectBuilder::<Post>::new()
//!     .r#where(Filter::eq("published", true))
//!     .order_by_desc("created_at")
//!     .limit(10)
//!     .build_for(Dialect::MySql)?;
//!
//! let query = UpdateBuilder::<Post>::new()
//!     .set("published", false)
//!     .r#where(Filter::eq("id", 42))
//!     .build()?;
//! ```
//!
//! ## Probes
//!
//! A probe carries only the fields that were set, so it doubles as an
//! equality filter:
//!
//! ```ignore
//! let probe = PostProbe { published: Some(false), ..PostProbe::default() };
//! let query = SelectBuilder::<Post>::new().where_opt(probe.filter()).build()?;
//! ```
//!
//! ## Joins
//!
//! ```ignore
//! entity! {
//!     table = "posts",
//!     probe = PostWithAuthorProbe,
//!     columns = [("users", "name", "author_name")],
//!     joins = [Join::left("users", Filter::col_eq("author_id", ("users", "id")))],
//!     #[derive(Debug, Clone)]
//!     pub struct PostWithAuthor {
//!         pub id: i64,
//!         pub title: String,
//!         pub author_name: String,
//!     }
//! }
//! ```

mod delete;
mod entity;
mod fetch;
mod filter;
mod insert;
mod join;
mod query;
mod select;
mod update;

pub use delete::DeleteBuilder;
pub use entity::{Entity, Probe, Record};
pub use fetch::{FetchValue, has_column};
pub use filter::{Cmp, Column, Filter};
pub use insert::InsertBuilder;
pub use join::{Join, JoinKind};
pub use query::{DataType, Dialect, Query};
pub use sea_query::Value;
pub use select::{Order, OrderSpec, SelectBuilder};
/// Rows as returned by the `sqlx` `Any` driver.
pub use sqlx::any::AnyRow as Row;
pub use update::UpdateBuilder;

// Re-exports for ``entity`` macro use only.
#[doc(hidden)]
pub mod __private {
    pub use anyhow;
}
