use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Generation status of a plan.
///
/// ```text
/// pending -> generating -> completed
///                       -> failed
/// ```
///
/// `completed` and `failed` are terminal. A retry is a new plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    Generating,
    Completed,
    Failed,
}

impl PlanStatus {
    /// Whether no further transition is allowed.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for PlanStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "generating" => Ok(Self::Generating),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(ParseEnumError::new("plan status", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// Self-reported fitness level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FitnessLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for FitnessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        };
        f.write_str(s)
    }
}

impl FromStr for FitnessLevel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            _ => Err(ParseEnumError::new("fitness level", s)),
        }
    }
}

// ---------------------------------------------------------------------------

/// Typical session length band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
pub enum SessionDuration {
    #[sqlx(rename = "0-30")]
    #[serde(rename = "0-30")]
    UpTo30,
    #[sqlx(rename = "31-60")]
    #[serde(rename = "31-60")]
    From31To60,
    #[sqlx(rename = "61-90")]
    #[serde(rename = "61-90")]
    From61To90,
    #[sqlx(rename = "91+")]
    #[serde(rename = "91+")]
    Over90,
}

impl SessionDuration {
    /// Human-readable band used in generation instructions.
    pub fn label(self) -> &'static str {
        match self {
            Self::UpTo30 => "0-30 minutes",
            Self::From31To60 => "31-60 minutes",
            Self::From61To90 => "61-90 minutes",
            Self::Over90 => "91+ minutes",
        }
    }
}

impl fmt::Display for SessionDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UpTo30 => "0-30",
            Self::From31To60 => "31-60",
            Self::From61To90 => "61-90",
            Self::Over90 => "91+",
        };
        f.write_str(s)
    }
}

impl FromStr for SessionDuration {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0-30" => Ok(Self::UpTo30),
            "31-60" => Ok(Self::From31To60),
            "61-90" => Ok(Self::From61To90),
            "91+" => Ok(Self::Over90),
            other => Err(ParseEnumError::new("session duration", other)),
        }
    }
}

/// Error returned when parsing an invalid enum string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A person's durable fitness record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub equipment_text: Option<String>,
    #[serde(skip_serializing)]
    pub weight_kg: Option<f64>,
    #[serde(skip_serializing)]
    pub height_cm: Option<f64>,
    #[serde(skip_serializing)]
    pub age: Option<i32>,
    #[serde(skip_serializing)]
    pub gender: Option<String>,
    pub fitness_level: Option<FitnessLevel>,
    pub long_term_injuries: Option<String>,
    pub injury_limitations: Option<String>,
    pub minor_injuries: Option<String>,
    pub exercise_days_per_week: Option<i32>,
    pub exercise_duration: Option<SessionDuration>,
    pub goal_event: Option<String>,
    pub goal_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable profile fields. `None` leaves a column untouched on update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileFields {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub equipment_text: Option<String>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub fitness_level: Option<FitnessLevel>,
    pub long_term_injuries: Option<String>,
    pub injury_limitations: Option<String>,
    pub minor_injuries: Option<String>,
    pub exercise_days_per_week: Option<i32>,
    pub exercise_duration: Option<SessionDuration>,
    pub goal_event: Option<String>,
    pub goal_date: Option<NaiveDate>,
}

/// A profile with its accepted follower count, as listed publicly.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProfileWithFollowers {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub profile: Profile,
    pub follower_count: i64,
}

/// One generation cycle for a profile's two-week schedule.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub goal_type: String,
    pub target_event: Option<String>,
    pub target_date: Option<NaiveDate>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub preferences: Option<String>,
    pub progress_comment: Option<String>,
    pub minor_injuries: Option<String>,
    pub previous_plan_id: Option<Uuid>,
    pub status: PlanStatus,
    pub plan_title: String,
    pub plan_summary: String,
    pub plan_json: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Plan {
    /// The message recorded in a failed plan's `{"error": ...}` payload.
    pub fn error_message(&self) -> Option<&str> {
        self.plan_json.get("error").and_then(|v| v.as_str())
    }
}

/// Fields supplied when a plan is requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPlanRow {
    pub profile_id: Uuid,
    pub goal_type: String,
    pub target_event: Option<String>,
    pub target_date: Option<NaiveDate>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub preferences: Option<String>,
    pub progress_comment: Option<String>,
    pub minor_injuries: Option<String>,
    pub previous_plan_id: Option<Uuid>,
}

/// What a comment is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CommentTarget {
    Profile(Uuid),
    Plan(Uuid),
}

/// A comment on a profile or plan. Replies point at their parent.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub author_id: Uuid,
    pub profile_id: Option<Uuid>,
    pub plan_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    /// The comment's target. The table constraint guarantees exactly one of
    /// `profile_id`/`plan_id` is set.
    pub fn target(&self) -> CommentTarget {
        match (self.profile_id, self.plan_id) {
            (Some(id), _) => CommentTarget::Profile(id),
            (None, Some(id)) => CommentTarget::Plan(id),
            (None, None) => CommentTarget::Profile(Uuid::nil()),
        }
    }
}

/// A directed follow edge between two profiles.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FollowRequest {
    pub id: Uuid,
    pub from_profile_id: Uuid,
    pub to_profile_id: Uuid,
    pub accepted: bool,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}
