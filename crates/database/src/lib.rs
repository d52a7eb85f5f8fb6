//! # dbkit database
//!
//! Connection setup and a record-level access facade on top of
//! [`dbkit_orm`] and the `sqlx` `Any` driver.
//!
//! A [`Database`] owns a connection pool and an [`IdGenerator`]. Records
//! declared with `auto_id = true` receive a generated key on insert, and a
//! probe (the all-optional mirror of an entity) doubles as the filter for
//! reads, updates and deletes: every field that is `Some` becomes an equality
//! condition, zero values included.
//!
//! ```ignore
//! let config = Config::from_env()?;
//! let db = Database::connect(&config, Arc::new(Snowflake::new(1)?)).await?;
//!
//! let mut conn = db.acquire().await?;
//! let mut users = [User { id: 0, name: "ada".into(), active: true }];
//! db.insert(&mut conn, &mut users).await?;
//!
//! let mut probe = UserProbe { id: Some(users[0].id), ..UserProbe::default() };
//! let found = db.get(&mut probe, &[]).await?;
//!
//! let (total, page) = db
//!     .find_by_paging::<User>(&Paging::new(2, 20).order(OrderSpec::desc("id")))
//!     .await?;
//! ```

mod config;
mod database;
mod execute;
mod pager;
mod snowflake;

pub use dbkit_orm as orm;
pub use sqlx::AnyConnection as Session;

pub use self::config::{Config, ConnectionConfig, DatabaseKind, EnvOptions};
pub use self::database::Database;
pub use self::pager::{MAX_WINDOW, Pager, Paging};
pub use self::snowflake::{EPOCH_MS, IdGenerator, Snowflake};
