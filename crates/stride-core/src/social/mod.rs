//! Profiles, follow requests and comments.
//!
//! Thin services over `stride_db::queries` that enforce who may do what.
//! The acting profile is always passed in explicitly.

pub mod comments;
pub mod follows;
pub mod profiles;

use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use stride_db::models::CommentTarget;
use stride_db::queries::{plans as plan_db, profiles as profile_db};

pub use comments::{
    add_comment, approve_comment, delete_comment, edit_comment, list_comments, replies,
};
pub use follows::{
    accept_follow, cancel_follow, followers, following, pending_requests,
    request_follow,
};
pub use profiles::{create_profile, get_profile, list_profiles, update_profile};

/// Refusals from the social services.
#[derive(Debug, Error)]
pub enum SocialError {
    #[error("profile {0} not found")]
    ProfileNotFound(Uuid),

    #[error("plan {0} not found")]
    PlanNotFound(Uuid),

    #[error("comment {0} not found")]
    CommentNotFound(Uuid),

    #[error("follow request {0} not found")]
    FollowRequestNotFound(Uuid),

    #[error("parent comment {0} is not on the same target")]
    ParentOnOtherTarget(Uuid),

    #[error("comment content must not be empty")]
    EmptyContent,

    #[error("a profile cannot follow itself")]
    SelfFollow,

    #[error("a follow request between these profiles already exists")]
    DuplicateFollow,

    #[error("username {0:?} is already taken")]
    UsernameTaken(String),

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("not allowed: {0}")]
    Forbidden(&'static str),

    #[error(transparent)]
    Db(#[from] anyhow::Error),
}

/// The profile that owns a comment target: the profile itself, or the
/// plan's owner.
pub async fn target_owner(pool: &PgPool, target: CommentTarget) -> Result<Uuid, SocialError> {
    match target {
        CommentTarget::Profile(id) => {
            profile_db::get_profile(pool, id)
                .await?
                .ok_or(SocialError::ProfileNotFound(id))?;
            Ok(id)
        }
        CommentTarget::Plan(id) => {
            let plan = plan_db::get_plan(pool, id)
                .await?
                .ok_or(SocialError::PlanNotFound(id))?;
            Ok(plan.profile_id)
        }
    }
}

async fn require_profile(pool: &PgPool, id: Uuid) -> Result<(), SocialError> {
    profile_db::get_profile(pool, id)
        .await?
        .ok_or(SocialError::ProfileNotFound(id))?;
    Ok(())
}
