//! Common test helpers shared across integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use dbkit_database::{Config, ConnectionConfig, Database, DatabaseKind, Snowflake};
use dbkit_orm::{Filter, Join, entity};

entity! {
    table = "users",
    probe = UserProbe,
    key = id,
    auto_id = true,
    #[derive(Debug, Clone, PartialEq)]
    pub struct User {
        pub id: i64,
        pub name: String,
        pub age: i32,
        pub active: bool,
    }
}

entity! {
    table = "tags",
    probe = TagProbe,
    key = code,
    #[derive(Debug, Clone, PartialEq)]
    pub struct Tag {
        pub code: i64,
        pub label: String,
    }
}

entity! {
    table = "posts",
    probe = PostProbe,
    key = id,
    auto_id = true,
    #[derive(Debug, Clone, PartialEq)]
    pub struct Post {
        pub id: i64,
        pub author_id: i64,
        pub title: String,
        pub views: i64,
    }
}

entity! {
    table = "posts",
    probe = PostWithAuthorProbe,
    columns = [("users", "name", "author_name")],
    joins = [Join::left("users", Filter::col_eq("author_id", ("users", "id")))],
    #[derive(Debug, Clone, PartialEq)]
    pub struct PostWithAuthor {
        pub id: i64,
        pub title: String,
        pub author_name: Option<String>,
    }
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER NOT NULL, \
     active INTEGER NOT NULL)",
    "CREATE TABLE tags (code INTEGER PRIMARY KEY, label TEXT NOT NULL UNIQUE)",
    "CREATE TABLE posts (id INTEGER PRIMARY KEY, author_id INTEGER NOT NULL, \
     title TEXT NOT NULL, views INTEGER NOT NULL)",
];

/// Configuration of a private in-memory `SQLite` database. The pool holds a
/// single connection so that every statement sees the same database.
pub fn sqlite_config() -> Config {
    Config {
        kind: DatabaseKind::Sqlite,
        address: ":memory:".to_string(),
        connection: ConnectionConfig {
            max_open: 1,
            max_idle: 1,
            max_lifetime: Duration::ZERO,
        },
        ..Config::default()
    }
}

/// Connect to a fresh database with the test schema.
#[allow(clippy::missing_panics_doc)]
pub async fn database() -> Database {
    let ids = Arc::new(Snowflake::new(1).unwrap());
    let db = Database::connect(&sqlite_config(), ids).await.unwrap();

    for ddl in SCHEMA {
        sqlx::query(ddl).execute(db.pool()).await.unwrap();
    }
    db
}

/// A user without a key, active by default.
pub fn user(name: &str, age: i32) -> User {
    User {
        id: 0,
        name: name.to_string(),
        age,
        active: true,
    }
}

/// Insert `users` through a pooled connection and return them with their keys.
#[allow(clippy::missing_panics_doc)]
pub async fn seed(db: &Database, mut users: Vec<User>) -> Vec<User> {
    let mut conn = db.acquire().await.unwrap();
    db.insert(&mut conn, &mut users).await.unwrap();
    users
}

/// Number of users currently stored.
#[allow(clippy::missing_panics_doc)]
pub async fn user_count(db: &Database) -> u64 {
    db.count(&UserProbe::default()).await.unwrap()
}
