use chrono::{TimeZone, Utc};
use claim::{assert_err, assert_none, assert_ok, assert_some};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::helpers::spawn_store;
use mailing_list::{
    domain::{email_batch::EmailBatch, email_entry::EmailEntryUpdate},
    store::EmailStore,
};

fn update_for(email: &str, confirmed_at: Option<i64>, opt_out: bool) -> EmailEntryUpdate {
    EmailEntryUpdate {
        id: None,
        email: String::from(email),
        confirmed_at: confirmed_at.map(|seconds| Utc.timestamp_opt(seconds, 0).unwrap()),
        opt_out: Some(opt_out),
    }
}

#[tokio::test]
async fn ensure_schema_is_idempotent() {
    let (store, _db_dir) = spawn_store().await;

    assert_ok!(store.ensure_schema().await);
    assert_ok!(store.ensure_schema().await);
}

#[tokio::test]
async fn ensure_schema_fails_when_the_table_cannot_be_created() {
    let db_dir = tempfile::tempdir().unwrap();
    let db_options = SqliteConnectOptions::new()
        .filename(db_dir.path().join("read_only.db"))
        .create_if_missing(true);
    // A single connection, so the read only switch applies to every statement below
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(db_options)
        .await
        .expect("Failed to open the database.");

    sqlx::query("PRAGMA query_only = ON")
        .execute(&db_pool)
        .await
        .expect("Failed to make the database read only.");

    let store = EmailStore::new(db_pool);

    let err = assert_err!(store.ensure_schema().await);

    assert!(!err.to_string().contains("already exists"));
}

#[tokio::test]
async fn created_email_is_unconfirmed_and_active() {
    let (store, _db_dir) = spawn_store().await;

    assert_ok!(store.create("a@x.com").await);

    let entry = assert_some!(store.get("a@x.com").await.unwrap());

    assert_eq!(entry.id, 1);
    assert_eq!(entry.confirmed_at, Utc.timestamp_opt(0, 0).unwrap());
    assert!(!entry.opt_out);
}

#[tokio::test]
async fn duplicate_email_is_rejected_and_row_is_kept() {
    let (store, _db_dir) = spawn_store().await;

    store
        .update(&update_for("a@x.com", Some(1_677_664_800), false))
        .await
        .unwrap();

    assert_err!(store.create("a@x.com").await);

    let entry = store.get("a@x.com").await.unwrap().unwrap();

    assert_eq!(entry.confirmed_at.timestamp(), 1_677_664_800);
}

#[tokio::test]
async fn get_of_unknown_email_is_none() {
    let (store, _db_dir) = spawn_store().await;

    assert_none!(store.get("nobody@x.com").await.unwrap());
}

#[tokio::test]
async fn update_upserts_by_email() {
    let (store, _db_dir) = spawn_store().await;

    store
        .update(&update_for("a@x.com", Some(100), false))
        .await
        .unwrap();
    let inserted = store.get("a@x.com").await.unwrap().unwrap();

    store
        .update(&update_for("a@x.com", Some(200), true))
        .await
        .unwrap();
    let updated = store.get("a@x.com").await.unwrap().unwrap();

    assert_eq!(inserted.confirmed_at.timestamp(), 100);
    assert_eq!(updated.id, inserted.id);
    assert_eq!(updated.confirmed_at.timestamp(), 200);
    assert!(updated.opt_out);
}

#[tokio::test]
async fn delete_keeps_the_row_but_hides_it_from_batches() {
    let (store, _db_dir) = spawn_store().await;

    store.create("a@x.com").await.unwrap();
    store.create("b@x.com").await.unwrap();

    assert_ok!(store.delete("a@x.com").await);

    let deleted = store.get("a@x.com").await.unwrap().unwrap();
    let batch = store
        .get_batch(&EmailBatch::parse(1, 10).unwrap())
        .await
        .unwrap();

    assert!(deleted.opt_out);
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].email, "b@x.com");
}

#[tokio::test]
async fn delete_of_unknown_email_is_a_no_op() {
    let (store, _db_dir) = spawn_store().await;

    assert_ok!(store.delete("nobody@x.com").await);
    assert_none!(store.get("nobody@x.com").await.unwrap());
}

#[tokio::test]
async fn batches_are_ordered_by_id_and_skip_opted_out_entries() {
    let (store, _db_dir) = spawn_store().await;

    for i in 1..=8 {
        store.create(&format!("user{}@x.com", i)).await.unwrap();
    }
    for i in [2, 5, 6] {
        store.delete(&format!("user{}@x.com", i)).await.unwrap();
    }

    let mut seen = Vec::new();
    for page in 1..=3 {
        let batch = store
            .get_batch(&EmailBatch::parse(page, 2).unwrap())
            .await
            .unwrap();

        assert!(batch.len() <= 2);
        assert!(batch.iter().all(|entry| !entry.opt_out));
        seen.extend(batch.into_iter().map(|entry| entry.email));
    }

    assert_eq!(
        seen,
        vec![
            "user1@x.com",
            "user3@x.com",
            "user4@x.com",
            "user7@x.com",
            "user8@x.com"
        ]
    );
}

#[tokio::test]
async fn batch_past_the_end_is_empty() {
    let (store, _db_dir) = spawn_store().await;

    store.create("a@x.com").await.unwrap();

    let batch = store
        .get_batch(&EmailBatch::parse(5, 10).unwrap())
        .await
        .unwrap();

    assert!(batch.is_empty());
}
