//! Plan generation job: one plan id in, one persisted outcome out.
//!
//! ```text
//! load plan ──► claim (pending -> generating)
//!                 │
//!                 ▼
//!   profile + previous plan ──► instructions + schema
//!                 │
//!                 ▼
//!        PlanGenerator::generate (single call)
//!                 │
//!                 ▼
//!          validate_reply ──► complete | fail
//! ```
//!
//! Nothing escapes [`run_generation_job`]: every error either ends the job
//! without writing (missing plan, lost claim) or is recorded on the plan as
//! a failure.

pub mod store;

use std::sync::Arc;

use serde_json::{Value, json};
use thiserror::Error;
use uuid::Uuid;

use stride_db::models::Plan;

use crate::generator::{PlanGenerator, TransportError};
use crate::plan::{
    GeneratedPlan, GenerationProfile, PlanGoal, ProfileDefaults, SchemaViolation, build_request,
    feedback_context, validate_reply,
};

pub use store::{PgPlanStore, PlanStore};

/// Prefix of a failed plan's summary.
pub const FAILURE_SUMMARY_PREFIX: &str = "Generation failed: ";

/// Message recorded for [`GenerationError::Unexpected`]; details go to the
/// log only.
pub const UNEXPECTED_FAILURE_MESSAGE: &str = "unexpected error during generation";

/// Why a generation job did not produce a plan.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("plan {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Schema(#[from] SchemaViolation),

    #[error("unexpected error: {0:#}")]
    Unexpected(#[from] anyhow::Error),
}

impl GenerationError {
    /// The message stored on the failed plan.
    pub fn failure_message(&self) -> String {
        match self {
            Self::Unexpected(_) => UNEXPECTED_FAILURE_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

/// Payload and summary recorded for a failed plan.
pub fn failure_record(message: &str) -> (Value, String) {
    (
        json!({ "error": message }),
        format!("{FAILURE_SUMMARY_PREFIX}{message}"),
    )
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Plan written as `completed`.
    Completed,
    /// Plan written as `failed` with this message.
    Failed { message: String },
    /// No plan with that id; nothing written.
    NotFound,
    /// The plan was not ours to generate (already claimed or finished), or
    /// the store was unreachable before the claim; nothing written.
    Skipped,
}

/// Everything a job needs, cheap to clone into worker tasks.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn PlanStore>,
    generator: Arc<dyn PlanGenerator>,
    defaults: ProfileDefaults,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn PlanStore>,
        generator: Arc<dyn PlanGenerator>,
        defaults: ProfileDefaults,
    ) -> Self {
        Self {
            store,
            generator,
            defaults,
        }
    }

    pub async fn run(&self, plan_id: Uuid) -> JobOutcome {
        run_generation_job(
            self.store.as_ref(),
            self.generator.as_ref(),
            &self.defaults,
            plan_id,
        )
        .await
    }
}

/// Run one generation job for `plan_id`.
pub async fn run_generation_job(
    store: &dyn PlanStore,
    generator: &dyn PlanGenerator,
    defaults: &ProfileDefaults,
    plan_id: Uuid,
) -> JobOutcome {
    let plan = match store.get_plan(plan_id).await {
        Ok(Some(plan)) => plan,
        Ok(None) => {
            let err = GenerationError::NotFound(plan_id);
            tracing::warn!(plan_id = %plan_id, "{err}, job ends");
            return JobOutcome::NotFound;
        }
        Err(e) => {
            tracing::error!(plan_id = %plan_id, error = %format!("{e:#}"), "could not load plan");
            return JobOutcome::Skipped;
        }
    };

    match store.claim(plan_id).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::info!(
                plan_id = %plan_id,
                status = %plan.status,
                "plan already claimed or finished, skipping"
            );
            return JobOutcome::Skipped;
        }
        Err(e) => {
            tracing::error!(plan_id = %plan_id, error = %format!("{e:#}"), "could not claim plan");
            return JobOutcome::Skipped;
        }
    }

    tracing::info!(plan_id = %plan_id, generator = generator.name(), "generating plan");

    let (payload, generated) = match generate(store, generator, defaults, &plan).await {
        Ok(result) => result,
        Err(err) => return record_failure(store, plan_id, &err).await,
    };

    let title = match generated.plan_title.trim() {
        "" => plan.plan_title.as_str(),
        t => t,
    };

    match store
        .complete(plan_id, &payload, title, &generated.plan_summary)
        .await
    {
        Ok(0) => {
            tracing::warn!(plan_id = %plan_id, "plan left generating before it could be completed");
            JobOutcome::Skipped
        }
        Ok(_) => {
            tracing::info!(plan_id = %plan_id, title = %title, "plan completed");
            JobOutcome::Completed
        }
        Err(e) => {
            let err = GenerationError::Unexpected(e.context("failed to store completed plan"));
            record_failure(store, plan_id, &err).await
        }
    }
}

/// Build the request, call the generator once and validate the reply.
///
/// Returns the reply object to persist together with its typed view.
async fn generate(
    store: &dyn PlanStore,
    generator: &dyn PlanGenerator,
    defaults: &ProfileDefaults,
    plan: &Plan,
) -> Result<(Value, GeneratedPlan), GenerationError> {
    let profile = store.get_profile(plan.profile_id).await?.ok_or_else(|| {
        anyhow::anyhow!("profile {} of plan {} not found", plan.profile_id, plan.id)
    })?;

    let previous = match plan.previous_plan_id {
        Some(prev_id) => {
            let prev = store
                .get_plan(prev_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("previous plan {prev_id} not found"))?;
            check_history(plan, &prev)?;
            Some(prev)
        }
        None => None,
    };

    let feedback = feedback_context(previous.as_ref());
    let profile = GenerationProfile::from_profile(&profile, defaults);
    let request = build_request(&profile, &PlanGoal::from(plan), &feedback);

    let reply = generator.generate(&request).await?;
    if let Some(text) = &reply.text {
        tracing::debug!(plan_id = %plan.id, chars = text.len(), "generator returned free text");
    }

    let generated = validate_reply(&reply)?;

    let per_week = generated.workout_days_per_week();
    if per_week.iter().any(|&n| n != usize::from(profile.days_per_week)) {
        tracing::warn!(
            plan_id = %plan.id,
            requested = profile.days_per_week,
            got = ?per_week,
            "training days per week differ from the requested frequency"
        );
    }

    let payload = reply
        .structured
        .ok_or(GenerationError::Schema(SchemaViolation::NoStructuredReply))?;
    Ok((payload, generated))
}

/// The previous plan must be an older plan of the same profile.
fn check_history(plan: &Plan, previous: &Plan) -> anyhow::Result<()> {
    if previous.id == plan.id {
        anyhow::bail!("plan {} lists itself as its previous plan", plan.id);
    }
    if previous.profile_id != plan.profile_id {
        anyhow::bail!(
            "previous plan {} belongs to profile {}, not {}",
            previous.id,
            previous.profile_id,
            plan.profile_id
        );
    }
    if previous.created_at >= plan.created_at {
        anyhow::bail!(
            "previous plan {} is not older than plan {}",
            previous.id,
            plan.id
        );
    }
    Ok(())
}

async fn record_failure(store: &dyn PlanStore, plan_id: Uuid, err: &GenerationError) -> JobOutcome {
    match err {
        GenerationError::Unexpected(e) => {
            tracing::error!(plan_id = %plan_id, error = %format!("{e:?}"), "plan generation failed")
        }
        other => tracing::warn!(plan_id = %plan_id, error = %other, "plan generation failed"),
    }

    let message = err.failure_message();
    let (payload, summary) = failure_record(&message);

    match store.fail(plan_id, &payload, &summary).await {
        Ok(0) => tracing::warn!(plan_id = %plan_id, "plan left generating before failure was recorded"),
        Ok(_) => {}
        Err(e) => tracing::error!(
            plan_id = %plan_id,
            error = %format!("{e:#}"),
            "could not record plan failure"
        ),
    }

    JobOutcome::Failed { message }
}
