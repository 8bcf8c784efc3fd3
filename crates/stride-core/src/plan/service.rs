//! Plan request service.
//!
//! Validates a request against the stored profile and plan history, then
//! inserts a `pending` plan. Submitting it to the job queue is the caller's
//! job.

use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use stride_db::models::{NewPlanRow, Plan, PlanStatus};
use stride_db::queries::{plans as plan_queries, profiles as profile_queries};

/// Days after the start date on which a plan ends (two weeks inclusive).
pub const PLAN_SPAN_DAYS: u64 = 13;

/// Why a plan request was refused.
#[derive(Debug, Error)]
pub enum PlanRequestError {
    #[error("profile {0} not found")]
    ProfileNotFound(Uuid),

    #[error("plan {0} not found")]
    PlanNotFound(Uuid),

    #[error("goal type must not be empty")]
    EmptyGoal,

    #[error("target date {0} is in the past")]
    TargetDateInPast(NaiveDate),

    #[error("previous plan {plan_id} belongs to another profile")]
    PreviousPlanNotOwned { plan_id: Uuid },

    #[error("plan {plan_id} is {status}; only failed plans can be retried")]
    NotRetryable { plan_id: Uuid, status: PlanStatus },

    #[error(transparent)]
    Db(#[from] anyhow::Error),
}

/// A plan request as submitted by a profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPlan {
    pub goal_type: String,
    #[serde(default)]
    pub target_event: Option<String>,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    /// Defaults to today.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub preferences: Option<String>,
    #[serde(default)]
    pub progress_comment: Option<String>,
    #[serde(default)]
    pub minor_injuries: Option<String>,
    /// Explicit predecessor. When absent the profile's latest plan is used,
    /// unless `fresh_start` is set.
    #[serde(default)]
    pub previous_plan_id: Option<Uuid>,
    #[serde(default)]
    pub fresh_start: bool,
}

/// End date of a plan starting on `start`.
pub fn plan_end_date(start: NaiveDate) -> NaiveDate {
    start.checked_add_days(Days::new(PLAN_SPAN_DAYS)).unwrap_or(start)
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Validate and insert a new `pending` plan for `profile_id`.
///
/// Without an explicit previous plan the new plan follows the profile's
/// latest completed plan, unless `fresh_start` is set.
pub async fn request_plan(
    pool: &PgPool,
    profile_id: Uuid,
    request: &NewPlan,
) -> Result<Plan, PlanRequestError> {
    let today = Utc::now().date_naive();

    profile_queries::get_profile(pool, profile_id)
        .await?
        .ok_or(PlanRequestError::ProfileNotFound(profile_id))?;

    let goal_type = request.goal_type.trim();
    if goal_type.is_empty() {
        return Err(PlanRequestError::EmptyGoal);
    }

    if let Some(target) = request.target_date.filter(|t| *t < today) {
        return Err(PlanRequestError::TargetDateInPast(target));
    }

    let previous_plan_id = match request.previous_plan_id {
        Some(id) => {
            let previous = plan_queries::get_plan(pool, id)
                .await?
                .ok_or(PlanRequestError::PlanNotFound(id))?;
            if previous.profile_id != profile_id {
                return Err(PlanRequestError::PreviousPlanNotOwned { plan_id: id });
            }
            Some(id)
        }
        None if request.fresh_start => None,
        None => plan_queries::latest_completed_plan_for_profile(pool, profile_id)
            .await?
            .map(|p| p.id),
    };

    let start_date = request.start_date.unwrap_or(today);
    let row = NewPlanRow {
        profile_id,
        goal_type: goal_type.to_string(),
        target_event: non_blank(&request.target_event),
        target_date: request.target_date,
        start_date,
        end_date: plan_end_date(start_date),
        preferences: non_blank(&request.preferences),
        progress_comment: non_blank(&request.progress_comment),
        minor_injuries: non_blank(&request.minor_injuries),
        previous_plan_id,
    };

    let plan = plan_queries::insert_plan(pool, &row).await?;
    info!(plan_id = %plan.id, profile_id = %profile_id, "plan requested");
    Ok(plan)
}

/// Create a fresh `pending` plan from a failed one.
///
/// The failed plan stays as it is; the new plan copies its request fields
/// and previous link. The start date moves forward to today if it has
/// passed.
pub async fn retry_plan(pool: &PgPool, plan_id: Uuid) -> Result<Plan, PlanRequestError> {
    let failed = plan_queries::get_plan(pool, plan_id)
        .await?
        .ok_or(PlanRequestError::PlanNotFound(plan_id))?;

    if failed.status != PlanStatus::Failed {
        return Err(PlanRequestError::NotRetryable {
            plan_id,
            status: failed.status,
        });
    }

    let start_date = failed.start_date.max(Utc::now().date_naive());
    let row = NewPlanRow {
        profile_id: failed.profile_id,
        goal_type: failed.goal_type,
        target_event: failed.target_event,
        target_date: failed.target_date,
        start_date,
        end_date: plan_end_date(start_date),
        preferences: failed.preferences,
        progress_comment: failed.progress_comment,
        minor_injuries: failed.minor_injuries,
        previous_plan_id: failed.previous_plan_id,
    };

    let plan = plan_queries::insert_plan(pool, &row).await?;
    info!(plan_id = %plan.id, retried = %plan_id, "failed plan retried");
    Ok(plan)
}

/// The profile's most recent plan, if any.
pub async fn latest_plan_for(pool: &PgPool, profile_id: Uuid) -> anyhow::Result<Option<Plan>> {
    plan_queries::latest_plan_for_profile(pool, profile_id).await
}
