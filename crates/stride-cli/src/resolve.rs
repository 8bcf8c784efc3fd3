//! Identifier resolution for CLI arguments.
//!
//! - [`parse_plan_id`] accepts a UUID string.
//! - [`resolve_profile_id`] accepts either a UUID or a username.

use anyhow::{Context, Result, bail};
use sqlx::PgPool;
use uuid::Uuid;

use stride_db::queries::profiles as profile_db;

/// Parse a plan UUID, naming the bad input on failure.
pub fn parse_plan_id(input: &str) -> Result<Uuid> {
    Uuid::parse_str(input.trim()).with_context(|| format!("invalid plan ID: {input:?}"))
}

/// Returns true if `input` should be treated as a username rather than an id.
fn looks_like_username(input: &str) -> bool {
    Uuid::parse_str(input.trim()).is_err()
}

/// Resolve a profile given by UUID or username.
pub async fn resolve_profile_id(pool: &PgPool, input: &str) -> Result<Uuid> {
    let input = input.trim();
    if !looks_like_username(input) {
        return Ok(Uuid::parse_str(input)?);
    }
    match profile_db::get_profile_by_username(pool, input).await? {
        Some(profile) => Ok(profile.id),
        None => bail!("no profile with id or username {input:?}"),
    }
}
