use sqlx::PgPool;
use uuid::Uuid;

use stride_db::models::{FollowRequest, Profile};
use stride_db::queries::follows as follow_db;

use super::{SocialError, require_profile};

/// Ask to follow `to`. The request starts unaccepted.
pub async fn request_follow(
    pool: &PgPool,
    from: Uuid,
    to: Uuid,
) -> Result<FollowRequest, SocialError> {
    if from == to {
        return Err(SocialError::SelfFollow);
    }
    require_profile(pool, from).await?;
    require_profile(pool, to).await?;

    let request = follow_db::insert_follow_request(pool, from, to)
        .await?
        .ok_or(SocialError::DuplicateFollow)?;
    tracing::info!(request_id = %request.id, from = %from, to = %to, "follow requested");
    Ok(request)
}

/// Accept a request. Only the followed profile may accept; accepting twice
/// returns the already-accepted request.
pub async fn accept_follow(
    pool: &PgPool,
    request_id: Uuid,
    acting: Uuid,
) -> Result<FollowRequest, SocialError> {
    let request = follow_db::get_follow_request(pool, request_id)
        .await?
        .ok_or(SocialError::FollowRequestNotFound(request_id))?;

    if request.to_profile_id != acting {
        return Err(SocialError::Forbidden(
            "only the followed profile can accept a request",
        ));
    }
    if request.accepted {
        return Ok(request);
    }

    match follow_db::accept_follow_request(pool, request_id).await? {
        Some(accepted) => {
            tracing::info!(request_id = %request_id, "follow accepted");
            Ok(accepted)
        }
        // Accepted concurrently.
        None => follow_db::get_follow_request(pool, request_id)
            .await?
            .ok_or(SocialError::FollowRequestNotFound(request_id)),
    }
}

/// Withdraw, decline or unfollow. Either party may do it.
pub async fn cancel_follow(pool: &PgPool, request_id: Uuid, acting: Uuid) -> Result<(), SocialError> {
    let request = follow_db::get_follow_request(pool, request_id)
        .await?
        .ok_or(SocialError::FollowRequestNotFound(request_id))?;

    if acting != request.from_profile_id && acting != request.to_profile_id {
        return Err(SocialError::Forbidden(
            "only the two profiles involved can cancel a follow",
        ));
    }

    follow_db::delete_follow_request(pool, request_id).await?;
    tracing::info!(request_id = %request_id, "follow cancelled");
    Ok(())
}

/// Profiles with an accepted follow of `profile_id`.
pub async fn followers(pool: &PgPool, profile_id: Uuid) -> Result<Vec<Profile>, SocialError> {
    require_profile(pool, profile_id).await?;
    Ok(follow_db::list_followers(pool, profile_id).await?)
}

/// Profiles `profile_id` follows (accepted only).
pub async fn following(pool: &PgPool, profile_id: Uuid) -> Result<Vec<Profile>, SocialError> {
    require_profile(pool, profile_id).await?;
    Ok(follow_db::list_following(pool, profile_id).await?)
}

/// Requests waiting for `profile_id` to accept.
pub async fn pending_requests(
    pool: &PgPool,
    profile_id: Uuid,
) -> Result<Vec<FollowRequest>, SocialError> {
    require_profile(pool, profile_id).await?;
    Ok(follow_db::list_pending_for(pool, profile_id).await?)
}
