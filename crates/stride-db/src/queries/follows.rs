//! Database query functions for the `follow_requests` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{FollowRequest, Profile};

/// Insert a follow request from `from` to `to`.
///
/// Returns `None` when a request for the same ordered pair already exists.
pub async fn insert_follow_request(
    pool: &PgPool,
    from: Uuid,
    to: Uuid,
) -> Result<Option<FollowRequest>> {
    let request = sqlx::query_as::<_, FollowRequest>(
        "INSERT INTO follow_requests (from_profile_id, to_profile_id) \
         VALUES ($1, $2) \
         ON CONFLICT (from_profile_id, to_profile_id) DO NOTHING \
         RETURNING *",
    )
    .bind(from)
    .bind(to)
    .fetch_optional(pool)
    .await
    .context("failed to insert follow request")?;

    Ok(request)
}

/// Fetch a follow request by ID.
pub async fn get_follow_request(pool: &PgPool, id: Uuid) -> Result<Option<FollowRequest>> {
    let request =
        sqlx::query_as::<_, FollowRequest>("SELECT * FROM follow_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch follow request")?;

    Ok(request)
}

/// Fetch the request for an ordered pair, if any.
pub async fn get_between(pool: &PgPool, from: Uuid, to: Uuid) -> Result<Option<FollowRequest>> {
    let request = sqlx::query_as::<_, FollowRequest>(
        "SELECT * FROM follow_requests WHERE from_profile_id = $1 AND to_profile_id = $2",
    )
    .bind(from)
    .bind(to)
    .fetch_optional(pool)
    .await
    .context("failed to fetch follow request")?;

    Ok(request)
}

/// Accept a pending request. Returns `None` if it is missing or already
/// accepted.
pub async fn accept_follow_request(pool: &PgPool, id: Uuid) -> Result<Option<FollowRequest>> {
    let request = sqlx::query_as::<_, FollowRequest>(
        "UPDATE follow_requests SET accepted = TRUE, accepted_at = now() \
         WHERE id = $1 AND accepted = FALSE \
         RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to accept follow request")?;

    Ok(request)
}

/// Delete a follow request (cancel, decline or unfollow).
pub async fn delete_follow_request(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM follow_requests WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete follow request")?;

    Ok(result.rows_affected())
}

/// Profiles with an accepted follow towards `profile_id`.
pub async fn list_followers(pool: &PgPool, profile_id: Uuid) -> Result<Vec<Profile>> {
    let profiles = sqlx::query_as::<_, Profile>(
        "SELECT p.* FROM profiles p \
         JOIN follow_requests f ON f.from_profile_id = p.id \
         WHERE f.to_profile_id = $1 AND f.accepted \
         ORDER BY f.accepted_at DESC",
    )
    .bind(profile_id)
    .fetch_all(pool)
    .await
    .context("failed to list followers")?;

    Ok(profiles)
}

/// Profiles that `profile_id` follows (accepted only).
pub async fn list_following(pool: &PgPool, profile_id: Uuid) -> Result<Vec<Profile>> {
    let profiles = sqlx::query_as::<_, Profile>(
        "SELECT p.* FROM profiles p \
         JOIN follow_requests f ON f.to_profile_id = p.id \
         WHERE f.from_profile_id = $1 AND f.accepted \
         ORDER BY f.accepted_at DESC",
    )
    .bind(profile_id)
    .fetch_all(pool)
    .await
    .context("failed to list following")?;

    Ok(profiles)
}

/// Requests awaiting `profile_id`'s approval, oldest first.
pub async fn list_pending_for(pool: &PgPool, profile_id: Uuid) -> Result<Vec<FollowRequest>> {
    let requests = sqlx::query_as::<_, FollowRequest>(
        "SELECT * FROM follow_requests \
         WHERE to_profile_id = $1 AND NOT accepted \
         ORDER BY created_at ASC",
    )
    .bind(profile_id)
    .fetch_all(pool)
    .await
    .context("failed to list pending follow requests")?;

    Ok(requests)
}
