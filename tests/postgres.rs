//! Postgres repository tests. They need `DATABASE_URL` pointing at a server
//! where the test user may create databases:
//!
//! ```text
//! DATABASE_URL=postgres://localhost/microblog cargo test --test postgres -- --ignored
//! ```

use std::sync::Arc;

use sqlx::PgPool;

use microblog::application::error::ErrorKind;
use microblog::application::microblog::Microblog;
use microblog::application::pagination::{PageLimits, PageRequest};
use microblog::application::repos::{FeedRepo, PostsRepo, RepoError};
use microblog::domain::entities::{FeedEntry, NewPost};
use microblog::domain::types::{UserId, now_utc_seconds};
use microblog::infra::db::PostgresRepositories;

fn microblog(pool: PgPool) -> Microblog {
    Microblog::assemble(
        Arc::new(PostgresRepositories::new(pool)),
        None,
        PageLimits::default(),
    )
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_post_id_is_reported_as_duplicate(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let post = NewPost {
        id: uuid::Uuid::new_v4(),
        author_id: UserId::from("aa"),
        text: "once".to_string(),
        created_at: now_utc_seconds(),
    };

    let stored = repos.insert_post(post.clone()).await.expect("insert");
    assert_eq!(stored.last_modified_at, stored.created_at);

    let err = repos.insert_post(post).await.expect_err("duplicate id");
    assert!(matches!(err, RepoError::Duplicate { .. }), "{err:?}");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn post_line_pages_resume_after_the_last_item(pool: PgPool) {
    let blog = microblog(pool);
    let a1 = UserId::from("a1");
    for text in ["p1", "p2", "p3"] {
        blog.create_post(a1.clone(), text.to_string())
            .await
            .expect("create");
    }

    let first = blog.get_post_line(&a1, None, Some(2)).await.expect("page");
    let texts: Vec<_> = first.items.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(texts, ["p3", "p2"]);

    let second = blog
        .get_post_line(&a1, first.next_cursor.as_deref(), Some(2))
        .await
        .expect("page");
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].text, "p1");
    assert!(second.next_cursor.is_none());

    let err = blog
        .get_post_line(&UserId::from("b1"), first.next_cursor.as_deref(), Some(2))
        .await
        .expect_err("foreign token");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn fanout_backfill_and_edits_round_trip(pool: PgPool) {
    let blog = microblog(pool);
    let (u1, u2, u3) = (UserId::from("01"), UserId::from("02"), UserId::from("03"));

    let x1 = blog.create_post(u1.clone(), "x1".into()).await.expect("x1");
    blog.create_post(u1.clone(), "x2".into()).await.expect("x2");
    blog.subscribe(&u3, &u1).await.expect("before");
    blog.subscribe(&u2, &u1).await.expect("backfill");
    blog.subscribe(&u2, &u1).await.expect("idempotent");
    blog.create_post(u1.clone(), "x3".into()).await.expect("x3");

    let feed = blog.get_feed(&u2, None, Some(10)).await.expect("feed");
    let texts: Vec<_> = feed.items.iter().map(|p| p.text.as_str()).collect();
    assert_eq!(texts, ["x3", "x2", "x1"]);

    blog.change_post_text(x1.id, &u1, "x1 edited")
        .await
        .expect("edit");
    for reader in [&u2, &u3] {
        let feed = blog.get_feed(reader, None, Some(10)).await.expect("feed");
        assert_eq!(feed.items.last().expect("oldest").text, "x1 edited");
    }

    let subscribers: Vec<_> = blog
        .get_subscribers(&u1)
        .await
        .expect("subscribers")
        .into_iter()
        .collect();
    assert_eq!(subscribers, vec![u2.clone(), u3]);
    assert_eq!(blog.get_subscriptions(&u2).await.expect("subs").len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn stale_feed_snapshots_never_overwrite_newer_ones(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let viewer = UserId::from("b1");
    let original = repos
        .insert_post(NewPost {
            id: uuid::Uuid::new_v4(),
            author_id: UserId::from("a1"),
            text: "v0".to_string(),
            created_at: now_utc_seconds(),
        })
        .await
        .expect("insert");
    repos
        .upsert_feed_entry(FeedEntry::for_viewer(viewer.clone(), original.clone()))
        .await
        .expect("seed entry");

    let edit_a = repos
        .update_post_text(original.id, "A", now_utc_seconds())
        .await
        .expect("edit A");
    let edit_b = repos
        .update_post_text(original.id, "B", now_utc_seconds())
        .await
        .expect("edit B");
    assert_eq!(edit_b.version, edit_a.version + 1);

    assert_eq!(repos.refresh_feed_entries(&edit_b).await.expect("B"), 1);
    assert_eq!(repos.refresh_feed_entries(&edit_a).await.expect("A"), 0);
    repos
        .upsert_feed_entry(FeedEntry::for_viewer(viewer.clone(), original))
        .await
        .expect("late backfill write");

    let feed = repos
        .list_feed(&viewer, PageRequest::new(10, None))
        .await
        .expect("feed");
    assert_eq!(feed.items, vec![edit_b]);
}
