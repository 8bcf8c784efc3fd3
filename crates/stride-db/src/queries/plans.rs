//! Database query functions for the `plans` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{NewPlanRow, Plan, PlanStatus};

/// Insert a new plan in `pending` status with an empty payload.
pub async fn insert_plan(pool: &PgPool, new: &NewPlanRow) -> Result<Plan> {
    let plan = sqlx::query_as::<_, Plan>(
        "INSERT INTO plans (profile_id, goal_type, target_event, target_date, start_date, \
                            end_date, preferences, progress_comment, minor_injuries, previous_plan_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING *",
    )
    .bind(new.profile_id)
    .bind(&new.goal_type)
    .bind(&new.target_event)
    .bind(new.target_date)
    .bind(new.start_date)
    .bind(new.end_date)
    .bind(&new.preferences)
    .bind(&new.progress_comment)
    .bind(&new.minor_injuries)
    .bind(new.previous_plan_id)
    .fetch_one(pool)
    .await
    .context("failed to insert plan")?;

    Ok(plan)
}

/// Fetch a plan by its ID.
pub async fn get_plan(pool: &PgPool, id: Uuid) -> Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch plan")?;

    Ok(plan)
}

/// List all plans, newest first.
pub async fn list_plans(pool: &PgPool) -> Result<Vec<Plan>> {
    let plans = sqlx::query_as::<_, Plan>("SELECT * FROM plans ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
        .context("failed to list plans")?;

    Ok(plans)
}

/// List a profile's plans, newest first.
pub async fn list_plans_for_profile(pool: &PgPool, profile_id: Uuid) -> Result<Vec<Plan>> {
    let plans = sqlx::query_as::<_, Plan>(
        "SELECT * FROM plans WHERE profile_id = $1 ORDER BY created_at DESC",
    )
    .bind(profile_id)
    .fetch_all(pool)
    .await
    .context("failed to list plans for profile")?;

    Ok(plans)
}

/// The most recently created plan for a profile, if any.
pub async fn latest_plan_for_profile(pool: &PgPool, profile_id: Uuid) -> Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>(
        "SELECT * FROM plans WHERE profile_id = $1 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(profile_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch latest plan")?;

    Ok(plan)
}

/// The most recently created `completed` plan for a profile, if any.
pub async fn latest_completed_plan_for_profile(
    pool: &PgPool,
    profile_id: Uuid,
) -> Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>(
        "SELECT * FROM plans WHERE profile_id = $1 AND status = 'completed' \
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(profile_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch latest completed plan")?;

    Ok(plan)
}

/// List plans in a given status, oldest first.
pub async fn list_plans_by_status(pool: &PgPool, status: PlanStatus) -> Result<Vec<Plan>> {
    let plans = sqlx::query_as::<_, Plan>(
        "SELECT * FROM plans WHERE status = $1 ORDER BY created_at ASC",
    )
    .bind(status)
    .fetch_all(pool)
    .await
    .context("failed to list plans by status")?;

    Ok(plans)
}

/// Claim a plan for generation: `pending -> generating`.
///
/// Returns `false` when the plan is missing or not pending, which means
/// another job already owns it.
pub async fn claim_plan(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE plans SET status = 'generating' \
         WHERE id = $1 AND status = 'pending'",
    )
    .bind(id)
    .execute(pool)
    .await
    .context("failed to claim plan")?;

    Ok(result.rows_affected() == 1)
}

/// Record a successful generation: payload, display fields, `completed`.
///
/// Only applies to a plan in `generating`; returns the number of rows
/// updated.
pub async fn complete_plan(
    pool: &PgPool,
    id: Uuid,
    payload: &serde_json::Value,
    title: &str,
    summary: &str,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE plans \
         SET status = 'completed', plan_json = $2, plan_title = $3, plan_summary = $4, \
             completed_at = now() \
         WHERE id = $1 AND status = 'generating'",
    )
    .bind(id)
    .bind(payload)
    .bind(title)
    .bind(summary)
    .execute(pool)
    .await
    .context("failed to complete plan")?;

    Ok(result.rows_affected())
}

/// Record a failed generation: error payload, failure summary, `failed`.
///
/// Only applies to a plan in `generating`; returns the number of rows
/// updated.
pub async fn fail_plan(
    pool: &PgPool,
    id: Uuid,
    payload: &serde_json::Value,
    summary: &str,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE plans \
         SET status = 'failed', plan_json = $2, plan_summary = $3, completed_at = now() \
         WHERE id = $1 AND status = 'generating'",
    )
    .bind(id)
    .bind(payload)
    .bind(summary)
    .execute(pool)
    .await
    .context("failed to mark plan failed")?;

    Ok(result.rows_affected())
}

/// Fail every plan left in `generating` (its worker died mid-call).
///
/// Returns the plans that were reset.
pub async fn fail_orphaned_plans(
    pool: &PgPool,
    payload: &serde_json::Value,
    summary: &str,
) -> Result<Vec<Plan>> {
    let plans = sqlx::query_as::<_, Plan>(
        "UPDATE plans \
         SET status = 'failed', plan_json = $1, plan_summary = $2, completed_at = now() \
         WHERE status = 'generating' \
         RETURNING *",
    )
    .bind(payload)
    .bind(summary)
    .fetch_all(pool)
    .await
    .context("failed to reset orphaned plans")?;

    Ok(plans)
}
