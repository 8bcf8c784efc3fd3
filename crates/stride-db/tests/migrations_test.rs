//! Migrations, pool helpers and table constraints.

use sqlx::{Executor, Row};
use uuid::Uuid;

use stride_db::config::DbConfig;
use stride_db::pool;
use stride_test_utils::{TestDb, pg_url};

/// Tables created by the initial migration.
const EXPECTED_TABLES: &[&str] = &["comments", "follow_requests", "plans", "profiles"];

#[tokio::test]
async fn migrations_create_all_tables() {
    let db = TestDb::create().await;

    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT tablename::text FROM pg_tables \
         WHERE schemaname = 'public' AND tablename NOT LIKE '\\_sqlx%' \
         ORDER BY tablename",
    )
    .fetch_all(&db.pool)
    .await
    .expect("should list tables");

    let names: Vec<&str> = rows.iter().map(|(name,)| name.as_str()).collect();
    assert_eq!(names, EXPECTED_TABLES);

    db.drop().await;
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let db = TestDb::create().await;

    // TestDb already ran them once.
    pool::run_migrations(&db.pool)
        .await
        .expect("second migration run should be a no-op");

    for table in EXPECTED_TABLES {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS cnt FROM {table}"))
            .fetch_one(&db.pool)
            .await
            .unwrap_or_else(|e| panic!("failed to count {table}: {e}"));
        let count: i64 = row.get("cnt");
        assert_eq!(count, 0, "table {table} should be empty");
    }

    db.drop().await;
}

#[tokio::test]
async fn table_counts_lists_every_table() {
    let db = TestDb::create().await;

    let counts = pool::table_counts(&db.pool).await.unwrap();
    let names: Vec<&str> = counts.iter().map(|(n, _)| n.as_str()).collect();

    assert_eq!(names, vec!["profiles", "plans", "comments", "follow_requests"]);
    assert!(counts.iter().all(|(_, c)| *c == 0));

    db.drop().await;
}

#[tokio::test]
async fn ensure_database_exists_is_idempotent() {
    let base = pg_url().await;
    let name = format!("stride_test_{}", Uuid::new_v4().simple());
    let config = DbConfig::new(format!("{base}/{name}"));

    pool::ensure_database_exists(&config).await.unwrap();
    pool::ensure_database_exists(&config).await.unwrap();

    let pool = pool::create_pool(&config.clone().with_max_connections(1))
        .await
        .expect("created database should accept connections");
    pool.close().await;

    let maint = pool::create_pool(&DbConfig::new(config.maintenance_url()).with_max_connections(1))
        .await
        .unwrap();
    let _ = maint
        .execute(format!("DROP DATABASE IF EXISTS {name}").as_str())
        .await;
    maint.close().await;
}

#[tokio::test]
async fn schema_rejects_invalid_rows() {
    let db = TestDb::create().await;

    let bad_days = sqlx::query(
        "INSERT INTO profiles (username, exercise_days_per_week) VALUES ('x', 9)",
    )
    .execute(&db.pool)
    .await;
    assert!(bad_days.is_err(), "weekly frequency is limited to 1..=7");

    let bad_band = sqlx::query(
        "INSERT INTO profiles (username, exercise_duration) VALUES ('y', '45')",
    )
    .execute(&db.pool)
    .await;
    assert!(bad_band.is_err(), "duration must be one of the bands");

    let (id,): (Uuid,) = sqlx::query_as("INSERT INTO profiles (username) VALUES ('z') RETURNING id")
        .fetch_one(&db.pool)
        .await
        .unwrap();

    let self_follow = sqlx::query(
        "INSERT INTO follow_requests (from_profile_id, to_profile_id) VALUES ($1, $1)",
    )
    .bind(id)
    .execute(&db.pool)
    .await;
    assert!(self_follow.is_err(), "self-follow is rejected by the schema");

    let no_target = sqlx::query("INSERT INTO comments (author_id, content) VALUES ($1, 'hi')")
        .bind(id)
        .execute(&db.pool)
        .await;
    assert!(no_target.is_err(), "a comment needs exactly one target");

    db.drop().await;
}
