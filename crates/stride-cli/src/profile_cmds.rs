//! Operator CLI handlers for `stride profile` subcommands.

use anyhow::Result;
use sqlx::PgPool;

use stride_core::plan::latest_plan_for;
use stride_core::social;
use stride_db::models::{Profile, ProfileFields};

use crate::ProfileCommands;
use crate::resolve::resolve_profile_id;

/// Dispatch a `ProfileCommands` variant to the appropriate handler.
pub async fn run_profile_command(command: ProfileCommands, pool: &PgPool) -> Result<()> {
    match command {
        ProfileCommands::Show { profile } => match profile {
            Some(p) => cmd_show_one(pool, &p).await,
            None => cmd_show_all(pool).await,
        },
        ProfileCommands::Create {
            username,
            display_name,
            fitness_level,
            days_per_week,
            duration,
            equipment,
        } => {
            let fields = ProfileFields {
                display_name,
                fitness_level,
                exercise_days_per_week: days_per_week,
                exercise_duration: duration,
                equipment_text: equipment,
                ..ProfileFields::default()
            };
            let profile = social::create_profile(pool, &username, &fields).await?;
            println!("Profile created.");
            println!("  ID:        {}", profile.id);
            println!("  Username:  {}", profile.username);
            Ok(())
        }
    }
}

async fn cmd_show_all(pool: &PgPool) -> Result<()> {
    let profiles = social::list_profiles(pool).await?;
    if profiles.is_empty() {
        println!("No profiles found. Use `stride profile create <username>` to add one.");
        return Ok(());
    }

    let name_w = profiles
        .iter()
        .map(|p| p.profile.username.len())
        .max()
        .unwrap_or(8)
        .max(8);
    println!("{:<36}  {:<name_w$}  {:>9}  LEVEL", "ID", "USERNAME", "FOLLOWERS");
    for row in &profiles {
        let level = row
            .profile
            .fitness_level
            .map(|l| l.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<36}  {:<name_w$}  {:>9}  {}",
            row.profile.id, row.profile.username, row.follower_count, level
        );
    }
    Ok(())
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

async fn cmd_show_one(pool: &PgPool, input: &str) -> Result<()> {
    let id = resolve_profile_id(pool, input).await?;
    let profile: Profile = social::get_profile(pool, id).await?;
    let followers = social::followers(pool, id).await?;
    let following = social::following(pool, id).await?;
    let pending = social::pending_requests(pool, id).await?;

    println!("Profile: {}", profile.username);
    println!("  ID:             {}", profile.id);
    if !profile.display_name.is_empty() {
        println!("  Name:           {}", profile.display_name);
    }
    println!("  Fitness level:  {}", or_dash(profile.fitness_level));
    println!("  Days per week:  {}", or_dash(profile.exercise_days_per_week));
    println!("  Session:        {}", or_dash(profile.exercise_duration.map(|d| d.label())));
    println!("  Equipment:      {}", or_dash(profile.equipment_text.as_deref()));
    if let Some(goal) = &profile.goal_event {
        println!("  Goal:           {goal} ({})", or_dash(profile.goal_date));
    }
    println!(
        "  Social:         {} followers, {} following, {} pending",
        followers.len(),
        following.len(),
        pending.len()
    );

    match latest_plan_for(pool, id).await? {
        Some(plan) => println!("  Latest plan:    {} [{}]", plan.id, plan.status),
        None => println!("  Latest plan:    -"),
    }
    Ok(())
}
