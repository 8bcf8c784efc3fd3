use sqlx::PgPool;
use uuid::Uuid;

use stride_db::models::{Profile, ProfileFields, ProfileWithFollowers};
use stride_db::queries::profiles as profile_db;

use super::SocialError;

const MAX_USERNAME_LEN: usize = 150;

fn validate_username(username: &str) -> Result<(), SocialError> {
    let invalid = |reason: &str| SocialError::InvalidField {
        field: "username",
        reason: reason.to_string(),
    };
    if username.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(invalid("at most 150 characters"));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '@' | '+'))
    {
        return Err(invalid("letters, digits and @ . + - _ only"));
    }
    Ok(())
}

fn validate_fields(fields: &ProfileFields) -> Result<(), SocialError> {
    if let Some(days) = fields.exercise_days_per_week.filter(|d| !(1..=7).contains(d)) {
        return Err(SocialError::InvalidField {
            field: "exercise_days_per_week",
            reason: format!("{days} is not between 1 and 7"),
        });
    }
    if let Some(age) = fields.age.filter(|a| *a <= 0) {
        return Err(SocialError::InvalidField {
            field: "age",
            reason: format!("{age} is not positive"),
        });
    }
    for (field, value) in [("weight_kg", fields.weight_kg), ("height_cm", fields.height_cm)] {
        if let Some(v) = value.filter(|v| !v.is_finite() || *v <= 0.0) {
            return Err(SocialError::InvalidField {
                field,
                reason: format!("{v} is not a positive number"),
            });
        }
    }
    Ok(())
}

/// Create a profile. Usernames are unique.
pub async fn create_profile(
    pool: &PgPool,
    username: &str,
    fields: &ProfileFields,
) -> Result<Profile, SocialError> {
    let username = username.trim();
    validate_username(username)?;
    validate_fields(fields)?;

    if profile_db::get_profile_by_username(pool, username)
        .await?
        .is_some()
    {
        return Err(SocialError::UsernameTaken(username.to_string()));
    }

    let profile = profile_db::insert_profile(pool, username, fields).await?;
    tracing::info!(profile_id = %profile.id, username = %profile.username, "profile created");
    Ok(profile)
}

pub async fn get_profile(pool: &PgPool, id: Uuid) -> Result<Profile, SocialError> {
    profile_db::get_profile(pool, id)
        .await?
        .ok_or(SocialError::ProfileNotFound(id))
}

/// Update a profile. Only the owner may edit it.
pub async fn update_profile(
    pool: &PgPool,
    id: Uuid,
    acting: Uuid,
    fields: &ProfileFields,
) -> Result<Profile, SocialError> {
    if id != acting {
        return Err(SocialError::Forbidden("only the owner can edit a profile"));
    }
    validate_fields(fields)?;
    profile_db::update_profile(pool, id, fields)
        .await?
        .ok_or(SocialError::ProfileNotFound(id))
}

/// All profiles, most accepted followers first.
pub async fn list_profiles(pool: &PgPool) -> Result<Vec<ProfileWithFollowers>, SocialError> {
    Ok(profile_db::list_profiles_by_followers(pool).await?)
}
