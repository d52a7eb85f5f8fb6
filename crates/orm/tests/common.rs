//! Common test helpers shared across integration tests.
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use dbkit_orm::{Filter, Join, Row, entity};
use sqlx::{AnyConnection, Connection};

// Common test entities used across multiple test files

entity! {
    table = "users",
    probe = UserProbe,
    key = id,
    auto_id = true,
    #[derive(Debug, Clone)]
    pub struct User {
        pub id: i64,
        pub name: String,
        pub active: bool,
    }
}

entity! {
    table = "posts",
    probe = PostWithJoinProbe,
    joins = [Join::left("users", Filter::col_eq("author_id", ("users", "id")))],
    #[derive(Debug, Clone)]
    pub struct PostWithJoin {
        pub id: i64,
        pub title: String,
    }
}

entity! {
    table = "comments",
    probe = CommentWithAliasProbe,
    columns = [("users", "name", "author_name")],
    joins = [Join::left("users", Filter::col_eq("user_id", ("users", "id")))],
    #[derive(Debug, Clone)]
    pub struct CommentWithAlias {
        pub id: i64,
        pub content: String,
        pub author_name: String,
    }
}

entity! {
    table = "items",
    probe = ItemProbe,
    key = id,
    #[derive(Debug, Clone)]
    pub struct Item {
        pub id: i64,
        pub name: String,
        pub count: i32,
    }
}

entity! {
    table = "events",
    probe = EventProbe,
    key = event_id,
    auto_id = false,
    #[derive(Debug, Clone)]
    pub struct Event {
        pub event_id: i64,
        pub occurred_at: DateTime<Utc>,
        pub note: Option<String>,
    }
}

/// Run `sql` on a fresh in-memory `SQLite` database and return its first row.
#[allow(clippy::missing_panics_doc)]
pub async fn sqlite_row(sql: &str) -> Row {
    sqlx::any::install_default_drivers();
    let mut conn = AnyConnection::connect("sqlite::memory:").await.unwrap();
    sqlx::query(sql).fetch_one(&mut conn).await.unwrap()
}

// Identifier quotes outside string literals are dropped and whitespace collapsed.
fn canonical(sql: &str) -> String {
    let mut literal = false;
    let stripped: String = sql
        .chars()
        .filter(|&ch| {
            if ch == '\'' {
                literal = !literal;
            }
            literal || !matches!(ch, '"' | '`')
        })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Assert that `actual` contains every fragment, in order. Fragments are
/// written without identifier quotes.
#[allow(clippy::missing_panics_doc)]
pub fn assert_sql_contains(actual: &str, fragments: &[&str]) {
    let actual = canonical(actual);
    let mut rest = actual.as_str();

    for fragment in fragments.iter().map(|f| canonical(f)).filter(|f| !f.is_empty()) {
        let Some(pos) = rest.find(&fragment) else {
            panic!("expected `{fragment}` (in order) in `{actual}`");
        };
        rest = &rest[pos + fragment.len()..];
    }
}
