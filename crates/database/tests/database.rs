//! Integration tests for the `Database` facade against in-memory `SQLite`.

#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use anyhow::bail;
use common::{
    Post, PostWithAuthor, PostWithAuthorProbe, Tag, TagProbe, User, UserProbe, database, seed,
    sqlite_config, user, user_count,
};
use dbkit_database::{Database, DatabaseKind, Pager, Paging, Snowflake};
use dbkit_orm::{Filter, OrderSpec};
use futures::FutureExt;

fn by_id(id: i64) -> UserProbe {
    UserProbe {
        id: Some(id),
        ..UserProbe::default()
    }
}

fn by_name(name: &str) -> UserProbe {
    UserProbe {
        name: Some(name.to_string()),
        ..UserProbe::default()
    }
}

// Lifecycle

#[tokio::test]
async fn connect_and_ping() {
    let db = database().await;
    assert_eq!(db.kind(), DatabaseKind::Sqlite);
    db.ping().await.unwrap();
    assert!(format!("{db:?}").contains("Sqlite"));

    db.close().await;
    assert!(db.ping().await.is_err());
}

#[tokio::test]
async fn connect_rejects_invalid_pool_limits() {
    let mut config = sqlite_config();
    config.connection.max_idle = 2;

    let err = Database::connect(&config, Arc::new(Snowflake::default())).await.unwrap_err();
    assert!(format!("{err:#}").contains("maxIdle (2) exceeds connection.maxOpen (1)"));
}

#[test]
fn handle_is_shareable() {
    fn assert_shareable<T: Send + Sync + Clone>() {}
    assert_shareable::<Database>();
}

// Insert

#[tokio::test]
async fn insert_assigns_generated_ids() {
    let db = database().await;
    let mut preset = user("grace", 45);
    preset.id = 42;

    let mut users = vec![user("ada", 36), preset, user("alan", 41)];
    let mut conn = db.acquire().await.unwrap();
    let inserted = db.insert(&mut conn, &mut users).await.unwrap();
    drop(conn);

    assert_eq!(inserted, 3);
    assert!(users[0].id > 0);
    assert_eq!(users[1].id, 42);
    assert!(users[2].id > users[0].id);

    let (_, node, _) = Snowflake::decompose(users[0].id);
    assert_eq!(node, 1);
    assert_eq!(user_count(&db).await, 3);
}

#[tokio::test]
async fn insert_keeps_caller_keys() {
    let db = database().await;
    let mut tags = [
        Tag {
            code: 0,
            label: "zero".to_string(),
        },
        Tag {
            code: 7,
            label: "seven".to_string(),
        },
    ];

    let mut conn = db.acquire().await.unwrap();
    db.insert(&mut conn, &mut tags).await.unwrap();
    drop(conn);

    assert_eq!(tags[0].code, 0);
    assert_eq!(tags[1].code, 7);

    let zero = TagProbe {
        code: Some(0),
        ..TagProbe::default()
    };
    assert!(db.exist(&zero).await.unwrap());
}

#[tokio::test]
async fn insert_surfaces_engine_errors() {
    let db = database().await;
    let mut tag = [Tag {
        code: 1,
        label: "dup".to_string(),
    }];

    let mut conn = db.acquire().await.unwrap();
    db.insert(&mut conn, &mut tag).await.unwrap();
    let err = db.insert(&mut conn, &mut tag).await.unwrap_err();

    assert!(err.downcast_ref::<sqlx::Error>().is_some());
}

// Get, first, exist

#[tokio::test]
async fn get_hydrates_the_probe() {
    let db = database().await;
    let users = seed(&db, vec![user("ada", 36), user("alan", 41)]).await;

    let mut probe = by_name("alan");
    assert!(db.get(&mut probe, &[]).await.unwrap());
    assert_eq!(probe.id, Some(users[1].id));
    assert_eq!(probe.age, Some(41));
    assert_eq!(probe.active, Some(true));

    let mut missing = by_name("grace");
    assert!(!db.get(&mut missing, &[]).await.unwrap());
    assert_eq!(missing.id, None);
    assert_eq!(missing.name.as_deref(), Some("grace"));
}

#[tokio::test]
async fn get_reads_only_requested_columns() {
    let db = database().await;
    let users = seed(&db, vec![user("ada", 36)]).await;

    let mut probe = by_id(users[0].id);
    assert!(db.get(&mut probe, &["name"]).await.unwrap());
    assert_eq!(probe.name.as_deref(), Some("ada"));
    assert_eq!(probe.age, None);
    assert_eq!(probe.id, Some(users[0].id));
}

#[tokio::test]
async fn get_by_cond_combines_with_probe() {
    let db = database().await;
    seed(&db, vec![user("ada", 36), user("alan", 41), user("grace", 45)]).await;

    let mut probe = UserProbe {
        active: Some(true),
        ..UserProbe::default()
    };
    let found = db.get_by_cond(&mut probe, Filter::gt("age", 42), &[]).await.unwrap();
    assert!(found);
    assert_eq!(probe.name.as_deref(), Some("grace"));
}

#[tokio::test]
async fn first_decodes_the_entity() {
    let db = database().await;
    let users = seed(&db, vec![user("ada", 36)]).await;

    let found = db.first(&by_name("ada")).await.unwrap();
    assert_eq!(found, Some(users[0].clone()));
    assert_eq!(db.first(&by_name("nobody")).await.unwrap(), None);
}

#[tokio::test]
async fn exist_leaves_the_probe_untouched() {
    let db = database().await;
    seed(&db, vec![user("ada", 36)]).await;

    let probe = by_name("ada");
    assert!(db.exist(&probe).await.unwrap());
    assert_eq!(probe.id, None);
    assert_eq!(probe.age, None);

    assert!(!db.exist(&by_name("grace")).await.unwrap());
    assert!(!db.exist_by_cond(&probe, Filter::lt("age", 30)).await.unwrap());
    assert!(db.exist_by_cond(&probe, Filter::gte("age", 36)).await.unwrap());
}

// Count and find

#[tokio::test]
async fn zero_values_are_filters() {
    let db = database().await;
    seed(&db, vec![user("newborn", 0), user("ada", 36)]).await;

    let zero = UserProbe {
        age: Some(0),
        ..UserProbe::default()
    };
    assert_eq!(db.count(&zero).await.unwrap(), 1);
    assert_eq!(db.count(&UserProbe::default()).await.unwrap(), 2);
}

#[tokio::test]
async fn count_by_cond() {
    let db = database().await;
    seed(&db, vec![user("ada", 36), user("alan", 41), user("grace", 45)]).await;

    let count =
        db.count_by_cond(&UserProbe::default(), Filter::between("age", 40, 50)).await.unwrap();
    assert_eq!(count, 2);

    let count = db.count_by_cond(&by_name("ada"), Filter::gt("age", 40)).await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn find_matches_probe() {
    let db = database().await;
    let mut users = vec![user("ada", 36), user("alan", 41), user("grace", 45)];
    users[1].active = false;
    seed(&db, users).await;

    let active = UserProbe {
        active: Some(true),
        ..UserProbe::default()
    };
    let mut found = db.find(&active).await.unwrap();
    found.sort_by(|a, b| a.name.cmp(&b.name));

    let names: Vec<&str> = found.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, ["ada", "grace"]);
}

#[tokio::test]
async fn find_with_shapes_the_select() {
    let db = database().await;
    seed(&db, vec![user("ada", 36), user("alan", 41), user("grace", 45)]).await;

    let found = db
        .find_with(&UserProbe::default(), |select| select.order_by_desc("age").limit(2))
        .await
        .unwrap();

    let ages: Vec<i32> = found.iter().map(|u| u.age).collect();
    assert_eq!(ages, [45, 41]);
}

#[tokio::test]
async fn find_by_cond_variants() {
    let db = database().await;
    seed(&db, vec![user("ada", 36), user("alan", 41), user("grace", 45)]).await;

    let found = db
        .find_by_cond(&UserProbe::default(), Filter::r#in("name", vec!["ada", "grace"]))
        .await
        .unwrap();
    assert_eq!(found.len(), 2);

    let found = db
        .find_by_cond_with(&UserProbe::default(), Filter::like("name", "a%"), |select| {
            select.order_by("age")
        })
        .await
        .unwrap();
    let names: Vec<&str> = found.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, ["ada", "alan"]);
}

#[tokio::test]
async fn find_through_joins() {
    let db = database().await;
    let users = seed(&db, vec![user("ada", 36)]).await;

    let mut posts = [
        Post {
            id: 0,
            author_id: users[0].id,
            title: "notes".to_string(),
            views: 0,
        },
        Post {
            id: 0,
            author_id: 999,
            title: "orphan".to_string(),
            views: 0,
        },
    ];
    let mut conn = db.acquire().await.unwrap();
    db.insert(&mut conn, &mut posts).await.unwrap();
    drop(conn);

    let by_author = PostWithAuthorProbe {
        author_name: Some(Some("ada".to_string())),
        ..PostWithAuthorProbe::default()
    };
    let found = db.find(&by_author).await.unwrap();
    assert_eq!(
        found,
        [PostWithAuthor {
            id: posts[0].id,
            title: "notes".to_string(),
            author_name: Some("ada".to_string()),
        }]
    );

    let orphans = PostWithAuthorProbe {
        author_name: Some(None),
        ..PostWithAuthorProbe::default()
    };
    let found = db.find(&orphans).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "orphan");
}

// Paging

#[tokio::test]
async fn paging_counts_every_match() {
    let db = database().await;
    let users: Vec<_> = (0..25).map(|i| user(&format!("user{i:02}"), i)).collect();
    let users = seed(&db, users).await;

    let paging = Paging::new(2, 10).order(OrderSpec::asc("age"));
    let (total, page) = db.find_by_paging::<User>(&paging).await.unwrap();
    assert_eq!(total, 25);
    assert_eq!(page.len(), 10);
    assert_eq!(page[0].id, users[10].id);
    assert_eq!(paging.pages(total), 3);

    let (total, page) = db.find_by_paging::<User>(&Paging::new(3, 10)).await.unwrap();
    assert_eq!(total, 25);
    assert_eq!(page.len(), 5);

    let filtered = Paging::new(1, 4).r#where(Filter::lt("age", 6)).order(OrderSpec::desc("age"));
    let (total, page) = db.find_by_paging::<User>(&filtered).await.unwrap();
    assert_eq!(total, 6);
    let ages: Vec<i32> = page.iter().map(|u| u.age).collect();
    assert_eq!(ages, [5, 4, 3, 2]);
}

#[tokio::test]
async fn paging_with_custom_pager() {
    struct Newest;

    impl Pager for Newest {
        fn order_by(&self) -> Vec<OrderSpec> {
            vec![OrderSpec::desc("id")]
        }

        fn cond(&self) -> Option<Filter> {
            Some(Filter::eq("active", true))
        }

        fn limit(&self) -> (u64, u64) {
            (2, 0)
        }
    }

    let db = database().await;
    let mut users = vec![user("ada", 36), user("alan", 41), user("grace", 45)];
    users[2].active = false;
    let users = seed(&db, users).await;

    let (total, page) = db
        .find_by_paging_with::<User, _>(&Newest, |select| select.r#where(Filter::gt("age", 0)))
        .await
        .unwrap();
    assert_eq!(total, 2);
    let ids: Vec<i64> = page.iter().map(|u| u.id).collect();
    assert_eq!(ids, [users[1].id, users[0].id]);
}

#[tokio::test]
async fn paging_offset_without_limit() {
    struct Skip(u64);

    impl Pager for Skip {
        fn order_by(&self) -> Vec<OrderSpec> {
            vec![OrderSpec::asc("age")]
        }

        fn cond(&self) -> Option<Filter> {
            None
        }

        fn limit(&self) -> (u64, u64) {
            (0, self.0)
        }
    }

    let db = database().await;
    seed(&db, vec![user("ada", 36), user("alan", 41), user("grace", 45)]).await;

    let (total, page) = db.find_by_paging::<User>(&Skip(1)).await.unwrap();
    assert_eq!(total, 3);
    let ages: Vec<i32> = page.iter().map(|u| u.age).collect();
    assert_eq!(ages, [41, 45]);

    let (total, page) = db.find_by_paging::<User>(&Skip(u64::MAX)).await.unwrap();
    assert_eq!(total, 3);
    assert!(page.is_empty());
}

#[tokio::test]
async fn paging_beyond_the_last_page() {
    let db = database().await;
    seed(&db, vec![user("ada", 36)]).await;

    let (total, page) = db.find_by_paging::<User>(&Paging::new(u64::MAX / 2, 10)).await.unwrap();
    assert_eq!(total, 1);
    assert!(page.is_empty());
}

#[tokio::test]
async fn pager_ordering_leads() {
    let db = database().await;
    let users = seed(&db, vec![user("ada", 36), user("alan", 41), user("grace", 45)]).await;

    let paging = Paging::new(1, 10).order(OrderSpec::desc("id"));
    let (_, page) =
        db.find_by_paging_with::<User, _>(&paging, |select| select.order_by("name")).await.unwrap();

    let ids: Vec<i64> = page.iter().map(|u| u.id).collect();
    assert_eq!(ids, [users[2].id, users[1].id, users[0].id]);
}

// Update and increment

#[tokio::test]
async fn update_by_id_assigns_set_fields() {
    let db = database().await;
    let users = seed(&db, vec![user("ada", 36), user("alan", 41)]).await;

    let change = UserProbe {
        id: Some(users[0].id),
        name: Some("lovelace".to_string()),
        age: Some(0),
        ..UserProbe::default()
    };
    let mut conn = db.acquire().await.unwrap();
    let updated = db.update_by_id(&mut conn, &change, &[]).await.unwrap();
    drop(conn);
    assert_eq!(updated, 1);

    let stored = db.first(&by_id(users[0].id)).await.unwrap().unwrap();
    assert_eq!(stored.name, "lovelace");
    assert_eq!(stored.age, 0);
    assert!(stored.active);

    let untouched = db.first(&by_id(users[1].id)).await.unwrap().unwrap();
    assert_eq!(untouched, users[1]);
}

#[tokio::test]
async fn update_by_id_restricted_columns() {
    let db = database().await;
    let users = seed(&db, vec![user("ada", 36)]).await;

    let change = UserProbe {
        id: Some(users[0].id),
        name: Some("ignored".to_string()),
        age: Some(37),
        ..UserProbe::default()
    };
    let mut conn = db.acquire().await.unwrap();
    db.update_by_id(&mut conn, &change, &["age"]).await.unwrap();
    drop(conn);

    let stored = db.first(&by_id(users[0].id)).await.unwrap().unwrap();
    assert_eq!(stored.name, "ada");
    assert_eq!(stored.age, 37);
}

#[tokio::test]
async fn update_by_id_needs_key_and_assignments() {
    let db = database().await;
    let users = seed(&db, vec![user("ada", 36)]).await;
    let mut conn = db.acquire().await.unwrap();

    let err = db.update_by_id(&mut conn, &by_name("x"), &[]).await.unwrap_err();
    assert!(err.to_string().contains("'id' of 'users' must be set"));

    let err = db.update_by_id(&mut conn, &by_id(users[0].id), &[]).await.unwrap_err();
    assert!(err.to_string().contains("nothing to update"));
}

#[tokio::test]
async fn update_by_cond_touches_matching_rows() {
    let db = database().await;
    seed(&db, vec![user("ada", 36), user("alan", 41), user("grace", 45)]).await;

    let change = UserProbe {
        active: Some(false),
        ..UserProbe::default()
    };
    let mut conn = db.acquire().await.unwrap();
    let updated =
        db.update_by_cond(&mut conn, &change, Filter::gt("age", 40), &[]).await.unwrap();
    drop(conn);
    assert_eq!(updated, 2);

    let inactive = UserProbe {
        active: Some(false),
        ..UserProbe::default()
    };
    assert_eq!(db.count(&inactive).await.unwrap(), 2);
}

#[tokio::test]
async fn increments() {
    let db = database().await;
    let users = seed(&db, vec![user("ada", 36), user("alan", 41)]).await;
    let mut conn = db.acquire().await.unwrap();

    db.incr_by_id(&mut conn, &by_id(users[0].id), "age", None).await.unwrap();
    db.incr_by_id(&mut conn, &by_id(users[1].id), "age", Some(-11)).await.unwrap();
    let bumped = db
        .incr_by_cond(&mut conn, &by_name("ada"), Filter::gt("age", 30), "age", Some(10))
        .await
        .unwrap();
    assert_eq!(bumped, 1);

    let err = db.incr_by_id(&mut conn, &UserProbe::default(), "age", None).await.unwrap_err();
    assert!(err.to_string().contains("must be set"));
    drop(conn);

    let ada = db.first(&by_id(users[0].id)).await.unwrap().unwrap();
    let alan = db.first(&by_id(users[1].id)).await.unwrap().unwrap();
    assert_eq!(ada.age, 47);
    assert_eq!(alan.age, 30);
}

// Delete

#[tokio::test]
async fn delete_requires_conditions() {
    let db = database().await;
    seed(&db, vec![user("ada", 36), user("alan", 41)]).await;

    let mut conn = db.acquire().await.unwrap();
    let err = db.delete(&mut conn, &[by_name("ada"), UserProbe::default()]).await.unwrap_err();
    drop(conn);

    assert!(err.to_string().contains("without conditions"));
    assert_eq!(user_count(&db).await, 2);
}

#[tokio::test]
async fn delete_each_probe() {
    let db = database().await;
    seed(&db, vec![user("ada", 36), user("alan", 41), user("grace", 45)]).await;

    let mut conn = db.acquire().await.unwrap();
    let deleted = db.delete(&mut conn, &[by_name("ada"), by_name("grace")]).await.unwrap();
    let none = db.delete(&mut conn, &[by_name("nobody")]).await.unwrap();
    drop(conn);

    assert_eq!(deleted, 2);
    assert_eq!(none, 0);
    assert_eq!(user_count(&db).await, 1);
}

#[tokio::test]
async fn delete_by_cond() {
    let db = database().await;
    seed(&db, vec![user("ada", 36), user("alan", 41), user("grace", 45)]).await;

    let mut conn = db.acquire().await.unwrap();
    let deleted = db
        .delete_by_cond(&mut conn, &UserProbe::default(), Filter::gte("age", 41))
        .await
        .unwrap();
    drop(conn);

    assert_eq!(deleted, 2);
    assert_eq!(user_count(&db).await, 1);
}

#[tokio::test]
async fn delete_by_cond_with_value_list() {
    let db = database().await;
    seed(&db, vec![user("ada", 36), user("alan", 41), user("grace", 45)]).await;

    let mut conn = db.acquire().await.unwrap();
    let deleted = db
        .delete_by_cond(&mut conn, &UserProbe::default(), Filter::not_in("name", ["alan"]))
        .await
        .unwrap();
    drop(conn);

    assert_eq!(deleted, 2);
    assert!(db.exist(&by_name("alan")).await.unwrap());
}

#[tokio::test]
async fn writes_reject_joined_fields() {
    let db = database().await;
    let users = seed(&db, vec![user("ada", 36)]).await;

    let mut posts = [Post {
        id: 0,
        author_id: users[0].id,
        title: "notes".to_string(),
        views: 0,
    }];
    let mut conn = db.acquire().await.unwrap();
    db.insert(&mut conn, &mut posts).await.unwrap();

    let joined = PostWithAuthorProbe {
        title: Some("notes".to_string()),
        author_name: Some(Some("ada".to_string())),
        ..PostWithAuthorProbe::default()
    };
    let err = db.delete(&mut conn, &[joined.clone()]).await.unwrap_err();
    assert!(err.to_string().contains("joined table"), "{err}");
    db.incr_by_cond(&mut conn, &joined, Filter::gt("views", -1), "views", None)
        .await
        .unwrap_err();

    let own = PostWithAuthorProbe {
        title: Some("notes".to_string()),
        ..PostWithAuthorProbe::default()
    };
    let deleted = db.delete(&mut conn, &[own]).await.unwrap();
    assert_eq!(deleted, 1);
}

// Transactions

#[tokio::test]
async fn transaction_commits_on_success() {
    let db = database().await;
    let inner = db.clone();

    let inserted = db
        .transaction(move |session| {
            async move {
                let mut users = [user("ada", 36), user("alan", 41)];
                inner.insert(session, &mut users).await
            }
            .boxed()
        })
        .await
        .unwrap();

    assert_eq!(inserted, 2);
    assert_eq!(user_count(&db).await, 2);
}

#[tokio::test]
async fn transaction_rolls_back_on_error() {
    let db = database().await;
    let inner = db.clone();

    let err = db
        .transaction::<(), _>(move |session| {
            async move {
                inner.insert(session, &mut [user("ada", 36)]).await?;
                bail!("abort after insert")
            }
            .boxed()
        })
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "abort after insert");
    assert_eq!(user_count(&db).await, 0);
}

#[tokio::test]
async fn explicit_transaction_rollback() {
    let db = database().await;

    let mut tx = db.begin().await.unwrap();
    db.insert(&mut tx, &mut [user("ada", 36)]).await.unwrap();
    tx.rollback().await.unwrap();
    assert_eq!(user_count(&db).await, 0);

    let mut tx = db.begin().await.unwrap();
    db.insert(&mut tx, &mut [user("alan", 41)]).await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(user_count(&db).await, 1);
}
