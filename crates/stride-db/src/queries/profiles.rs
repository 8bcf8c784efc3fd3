//! Database query functions for the `profiles` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Profile, ProfileFields, ProfileWithFollowers};

/// Insert a profile for `username` with the given fields.
pub async fn insert_profile(
    pool: &PgPool,
    username: &str,
    fields: &ProfileFields,
) -> Result<Profile> {
    let profile = sqlx::query_as::<_, Profile>(
        "INSERT INTO profiles (username, display_name, bio, equipment_text, weight_kg, height_cm, \
                               age, gender, fitness_level, long_term_injuries, injury_limitations, \
                               minor_injuries, exercise_days_per_week, exercise_duration, \
                               goal_event, goal_date) \
         VALUES ($1, COALESCE($2, ''), $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
         RETURNING *",
    )
    .bind(username)
    .bind(&fields.display_name)
    .bind(&fields.bio)
    .bind(&fields.equipment_text)
    .bind(fields.weight_kg)
    .bind(fields.height_cm)
    .bind(fields.age)
    .bind(&fields.gender)
    .bind(fields.fitness_level)
    .bind(&fields.long_term_injuries)
    .bind(&fields.injury_limitations)
    .bind(&fields.minor_injuries)
    .bind(fields.exercise_days_per_week)
    .bind(fields.exercise_duration)
    .bind(&fields.goal_event)
    .bind(fields.goal_date)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert profile {username:?}"))?;

    Ok(profile)
}

/// Fetch a profile by ID.
pub async fn get_profile(pool: &PgPool, id: Uuid) -> Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch profile")?;

    Ok(profile)
}

/// Fetch a profile by username.
pub async fn get_profile_by_username(pool: &PgPool, username: &str) -> Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("failed to fetch profile by username")?;

    Ok(profile)
}

/// Update the supplied fields of a profile; `None` fields keep their value.
///
/// Returns `None` if the profile does not exist.
pub async fn update_profile(
    pool: &PgPool,
    id: Uuid,
    fields: &ProfileFields,
) -> Result<Option<Profile>> {
    let profile = sqlx::query_as::<_, Profile>(
        "UPDATE profiles SET \
             display_name = COALESCE($2, display_name), \
             bio = COALESCE($3, bio), \
             equipment_text = COALESCE($4, equipment_text), \
             weight_kg = COALESCE($5, weight_kg), \
             height_cm = COALESCE($6, height_cm), \
             age = COALESCE($7, age), \
             gender = COALESCE($8, gender), \
             fitness_level = COALESCE($9, fitness_level), \
             long_term_injuries = COALESCE($10, long_term_injuries), \
             injury_limitations = COALESCE($11, injury_limitations), \
             minor_injuries = COALESCE($12, minor_injuries), \
             exercise_days_per_week = COALESCE($13, exercise_days_per_week), \
             exercise_duration = COALESCE($14, exercise_duration), \
             goal_event = COALESCE($15, goal_event), \
             goal_date = COALESCE($16, goal_date), \
             updated_at = now() \
         WHERE id = $1 \
         RETURNING *",
    )
    .bind(id)
    .bind(&fields.display_name)
    .bind(&fields.bio)
    .bind(&fields.equipment_text)
    .bind(fields.weight_kg)
    .bind(fields.height_cm)
    .bind(fields.age)
    .bind(&fields.gender)
    .bind(fields.fitness_level)
    .bind(&fields.long_term_injuries)
    .bind(&fields.injury_limitations)
    .bind(&fields.minor_injuries)
    .bind(fields.exercise_days_per_week)
    .bind(fields.exercise_duration)
    .bind(&fields.goal_event)
    .bind(fields.goal_date)
    .fetch_optional(pool)
    .await
    .context("failed to update profile")?;

    Ok(profile)
}

/// List all profiles, most-followed first (accepted follows only).
pub async fn list_profiles_by_followers(pool: &PgPool) -> Result<Vec<ProfileWithFollowers>> {
    let rows = sqlx::query_as::<_, ProfileWithFollowers>(
        "SELECT p.*, COUNT(f.id) AS follower_count \
         FROM profiles p \
         LEFT JOIN follow_requests f ON f.to_profile_id = p.id AND f.accepted \
         GROUP BY p.id \
         ORDER BY follower_count DESC, p.created_at ASC",
    )
    .fetch_all(pool)
    .await
    .context("failed to list profiles")?;

    Ok(rows)
}
