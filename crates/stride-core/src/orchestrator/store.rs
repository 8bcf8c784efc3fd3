//! Persistence seam for the generation job.
//!
//! The job only ever reads a plan, its profile and its predecessor, and
//! writes one of three status transitions. [`PgPlanStore`] maps those onto
//! the query functions in `stride_db`.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use stride_db::models::{Plan, Profile};
use stride_db::queries::{plans as plan_db, profiles as profile_db};

/// Reads and writes performed by a generation job.
#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn get_plan(&self, id: Uuid) -> Result<Option<Plan>>;

    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>>;

    /// Move a plan `pending -> generating`. `false` means someone else owns
    /// it or it has already finished.
    async fn claim(&self, id: Uuid) -> Result<bool>;

    /// `generating -> completed`. Returns rows updated.
    async fn complete(&self, id: Uuid, payload: &Value, title: &str, summary: &str) -> Result<u64>;

    /// `generating -> failed`. Returns rows updated.
    async fn fail(&self, id: Uuid, payload: &Value, summary: &str) -> Result<u64>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn PlanStore) {}
};

/// [`PlanStore`] backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgPlanStore {
    pool: PgPool,
}

impl PgPlanStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanStore for PgPlanStore {
    async fn get_plan(&self, id: Uuid) -> Result<Option<Plan>> {
        plan_db::get_plan(&self.pool, id).await
    }

    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        profile_db::get_profile(&self.pool, id).await
    }

    async fn claim(&self, id: Uuid) -> Result<bool> {
        plan_db::claim_plan(&self.pool, id).await
    }

    async fn complete(&self, id: Uuid, payload: &Value, title: &str, summary: &str) -> Result<u64> {
        plan_db::complete_plan(&self.pool, id, payload, title, summary).await
    }

    async fn fail(&self, id: Uuid, payload: &Value, summary: &str) -> Result<u64> {
        plan_db::fail_plan(&self.pool, id, payload, summary).await
    }
}
