//! Database query functions for the `comments` table.
//!
//! The reply tree is stored by `parent_id` and read one level at a time via
//! [`list_replies`]; nothing here walks the tree recursively.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Comment, CommentTarget};

/// Insert a comment on `target`, optionally as a reply to `parent_id`.
pub async fn insert_comment(
    pool: &PgPool,
    author_id: Uuid,
    target: CommentTarget,
    parent_id: Option<Uuid>,
    content: &str,
    approved: bool,
) -> Result<Comment> {
    let (profile_id, plan_id) = split_target(target);
    let comment = sqlx::query_as::<_, Comment>(
        "INSERT INTO comments (author_id, profile_id, plan_id, parent_id, content, approved) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(author_id)
    .bind(profile_id)
    .bind(plan_id)
    .bind(parent_id)
    .bind(content)
    .bind(approved)
    .fetch_one(pool)
    .await
    .context("failed to insert comment")?;

    Ok(comment)
}

/// Fetch a comment by ID.
pub async fn get_comment(pool: &PgPool, id: Uuid) -> Result<Option<Comment>> {
    let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch comment")?;

    Ok(comment)
}

/// List top-level comments on a target, newest first.
///
/// Unapproved comments are included only when `include_unapproved` is set.
pub async fn list_for_target(
    pool: &PgPool,
    target: CommentTarget,
    include_unapproved: bool,
) -> Result<Vec<Comment>> {
    let (profile_id, plan_id) = split_target(target);
    let comments = sqlx::query_as::<_, Comment>(
        "SELECT * FROM comments \
         WHERE profile_id IS NOT DISTINCT FROM $1 \
           AND plan_id IS NOT DISTINCT FROM $2 \
           AND parent_id IS NULL \
           AND (approved OR $3) \
         ORDER BY created_at DESC",
    )
    .bind(profile_id)
    .bind(plan_id)
    .bind(include_unapproved)
    .fetch_all(pool)
    .await
    .context("failed to list comments")?;

    Ok(comments)
}

/// List direct replies to a comment, newest first.
pub async fn list_replies(
    pool: &PgPool,
    parent_id: Uuid,
    include_unapproved: bool,
) -> Result<Vec<Comment>> {
    let comments = sqlx::query_as::<_, Comment>(
        "SELECT * FROM comments \
         WHERE parent_id = $1 AND (approved OR $2) \
         ORDER BY created_at DESC",
    )
    .bind(parent_id)
    .bind(include_unapproved)
    .fetch_all(pool)
    .await
    .context("failed to list replies")?;

    Ok(comments)
}

/// Set `approved = true` on an unapproved comment.
///
/// Returns the number of rows changed (0 if missing or already approved).
pub async fn approve_comment(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE comments SET approved = TRUE, updated_at = now() \
         WHERE id = $1 AND approved = FALSE",
    )
    .bind(id)
    .execute(pool)
    .await
    .context("failed to approve comment")?;

    Ok(result.rows_affected())
}

/// Replace a comment's content.
pub async fn update_content(pool: &PgPool, id: Uuid, content: &str) -> Result<Option<Comment>> {
    let comment = sqlx::query_as::<_, Comment>(
        "UPDATE comments SET content = $2, updated_at = now() \
         WHERE id = $1 \
         RETURNING *",
    )
    .bind(id)
    .bind(content)
    .fetch_optional(pool)
    .await
    .context("failed to update comment")?;

    Ok(comment)
}

/// Delete a comment and, through the foreign key, its replies.
pub async fn delete_comment(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete comment")?;

    Ok(result.rows_affected())
}

fn split_target(target: CommentTarget) -> (Option<Uuid>, Option<Uuid>) {
    match target {
        CommentTarget::Profile(id) => (Some(id), None),
        CommentTarget::Plan(id) => (None, Some(id)),
    }
}
