//! Plan generation pieces: output contract, request construction, reply
//! validation and the plan request service.

pub mod prompt;
pub mod schema;
pub mod service;
pub mod validate;

pub use prompt::{
    GenerationProfile, NO_PREVIOUS_FEEDBACK, PlanGoal, ProfileDefaults, build_instructions,
    build_request, feedback_context,
};
pub use schema::{
    Exercise, ExerciseKind, GeneratedPlan, PLAN_TOOL_NAME, PLAN_WEEKS, PlanDay, PlanWeek,
    REST_DAY_NAME, output_schema,
};
pub use service::{NewPlan, PlanRequestError, latest_plan_for, plan_end_date, request_plan, retry_plan};
pub use validate::{SchemaViolation, validate_reply};
