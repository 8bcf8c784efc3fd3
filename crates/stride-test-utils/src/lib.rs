//! Shared test utilities for stride integration tests.
//!
//! Provides one PostgreSQL server per test binary; each test gets its own
//! freshly migrated database inside it.
//!
//! - **`STRIDE_TEST_PG_URL`** set: use that server directly (CI starts one
//!   container up front).
//! - Otherwise a container is started through testcontainers on first use and
//!   shared through a `OnceCell`.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use testcontainers::ContainerAsync;
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

use stride_db::models::{Profile, ProfileFields};
use stride_db::pool;
use stride_db::queries::profiles;

struct SharedPg {
    base_url: String,
    /// Keeps the container alive. `None` when using an external URL.
    _container: Option<ContainerAsync<Postgres>>,
}

static SHARED_PG: OnceCell<SharedPg> = OnceCell::const_new();

async fn init_shared_pg() -> SharedPg {
    if let Ok(url) = std::env::var("STRIDE_TEST_PG_URL") {
        return SharedPg {
            base_url: url.trim_end_matches('/').to_string(),
            _container: None,
        };
    }

    let container = Postgres::default()
        .with_tag("17")
        .start()
        .await
        .expect("failed to start PostgreSQL container");

    let host = container.get_host().await.expect("failed to get host");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("failed to get mapped port");

    SharedPg {
        base_url: format!("postgresql://postgres:postgres@{host}:{port}"),
        _container: Some(container),
    }
}

/// Base URL (no database name) of the shared server.
pub async fn pg_url() -> &'static str {
    let shared = SHARED_PG.get_or_init(init_shared_pg).await;
    &shared.base_url
}

async fn connect(url: &str, max_connections: u32) -> PgPool {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(url)
        .await
        .unwrap_or_else(|e| panic!("failed to connect to {url}: {e}"))
}

/// A migrated, uniquely named database. Call [`TestDb::drop`] at the end of
/// the test.
pub struct TestDb {
    pub pool: PgPool,
    pub name: String,
}

impl TestDb {
    /// Create a new database with all migrations applied.
    pub async fn create() -> Self {
        let base_url = pg_url().await;

        let maint = connect(&format!("{base_url}/postgres"), 1).await;
        let name = format!("stride_test_{}", Uuid::new_v4().simple());
        maint
            .execute(format!("CREATE DATABASE {name}").as_str())
            .await
            .unwrap_or_else(|e| panic!("failed to create temp database {name}: {e}"));
        maint.close().await;

        let pool = connect(&format!("{base_url}/{name}"), 5).await;
        pool::run_migrations(&pool)
            .await
            .expect("migrations should succeed");

        Self { pool, name }
    }

    /// Close the pool and drop the database.
    pub async fn drop(self) {
        self.pool.close().await;

        let base_url = pg_url().await;
        let maint = connect(&format!("{base_url}/postgres"), 1).await;

        let terminate = format!(
            "SELECT pg_terminate_backend(pid) \
             FROM pg_stat_activity \
             WHERE datname = '{}' AND pid <> pg_backend_pid()",
            self.name
        );
        let _ = maint.execute(terminate.as_str()).await;
        let _ = maint
            .execute(format!("DROP DATABASE IF EXISTS {}", self.name).as_str())
            .await;
        maint.close().await;
    }
}

/// Insert a profile with a unique username and the given fitness fields.
pub async fn seed_profile(pool: &PgPool, fields: ProfileFields) -> Profile {
    let username = format!("athlete_{}", Uuid::new_v4().simple());
    profiles::insert_profile(pool, &username, &fields)
        .await
        .expect("seed profile insert should succeed")
}
