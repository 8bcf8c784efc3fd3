//! Comment threads on profiles and plans.
//!
//! New comments start approved. A comment held back by moderation can be
//! approved by the target's owner; approval only goes one way.

use sqlx::PgPool;
use uuid::Uuid;

use stride_db::models::{Comment, CommentTarget};
use stride_db::queries::comments as comment_db;

use super::{SocialError, require_profile, target_owner};

fn clean_content(content: &str) -> Result<&str, SocialError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(SocialError::EmptyContent);
    }
    Ok(trimmed)
}

async fn load(pool: &PgPool, id: Uuid) -> Result<Comment, SocialError> {
    comment_db::get_comment(pool, id)
        .await?
        .ok_or(SocialError::CommentNotFound(id))
}

/// Post a comment on `target`, optionally replying to `parent_id`.
pub async fn add_comment(
    pool: &PgPool,
    author: Uuid,
    target: CommentTarget,
    parent_id: Option<Uuid>,
    content: &str,
) -> Result<Comment, SocialError> {
    let content = clean_content(content)?;
    require_profile(pool, author).await?;
    target_owner(pool, target).await?;

    if let Some(parent_id) = parent_id {
        let parent = load(pool, parent_id).await?;
        if parent.target() != target {
            return Err(SocialError::ParentOnOtherTarget(parent_id));
        }
    }

    let comment =
        comment_db::insert_comment(pool, author, target, parent_id, content, true).await?;

    tracing::info!(comment_id = %comment.id, author = %author, "comment added");
    Ok(comment)
}

/// Top-level comments on `target`, newest first.
pub async fn list_comments(
    pool: &PgPool,
    target: CommentTarget,
    include_unapproved: bool,
) -> Result<Vec<Comment>, SocialError> {
    target_owner(pool, target).await?;
    Ok(comment_db::list_for_target(pool, target, include_unapproved).await?)
}

/// Direct replies to `parent_id`, newest first.
pub async fn replies(
    pool: &PgPool,
    parent_id: Uuid,
    include_unapproved: bool,
) -> Result<Vec<Comment>, SocialError> {
    load(pool, parent_id).await?;
    Ok(comment_db::list_replies(pool, parent_id, include_unapproved).await?)
}

/// Approve a held comment. Only the target's owner may approve; approving
/// an approved comment changes nothing.
pub async fn approve_comment(
    pool: &PgPool,
    comment_id: Uuid,
    acting: Uuid,
) -> Result<Comment, SocialError> {
    let comment = load(pool, comment_id).await?;
    let owner = target_owner(pool, comment.target()).await?;
    if acting != owner {
        return Err(SocialError::Forbidden("only the target's owner can approve comments"));
    }
    if comment.approved {
        return Ok(comment);
    }

    comment_db::approve_comment(pool, comment_id).await?;
    tracing::info!(comment_id = %comment_id, "comment approved");
    load(pool, comment_id).await
}

/// Replace a comment's content. Author only.
pub async fn edit_comment(
    pool: &PgPool,
    comment_id: Uuid,
    acting: Uuid,
    content: &str,
) -> Result<Comment, SocialError> {
    let content = clean_content(content)?;
    let comment = load(pool, comment_id).await?;
    if comment.author_id != acting {
        return Err(SocialError::Forbidden("only the author can edit a comment"));
    }
    comment_db::update_content(pool, comment_id, content)
        .await?
        .ok_or(SocialError::CommentNotFound(comment_id))
}

/// Delete a comment and its replies. The author or the target's owner may
/// delete.
pub async fn delete_comment(pool: &PgPool, comment_id: Uuid, acting: Uuid) -> Result<(), SocialError> {
    let comment = load(pool, comment_id).await?;
    if comment.author_id != acting {
        let owner = target_owner(pool, comment.target()).await?;
        if owner != acting {
            return Err(SocialError::Forbidden(
                "only the author or the target's owner can delete a comment",
            ));
        }
    }
    comment_db::delete_comment(pool, comment_id).await?;
    tracing::info!(comment_id = %comment_id, "comment deleted");
    Ok(())
}
