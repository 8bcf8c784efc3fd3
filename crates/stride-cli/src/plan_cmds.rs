//! Operator CLI handlers for `stride plan` subcommands.
//!
//! Implements:
//! - `stride plan show [plan-id]`            -- show one plan or list all plans
//! - `stride plan request <profile> --goal`  -- create a pending plan
//! - `stride plan generate <plan-id>`        -- run one generation job inline
//! - `stride plan retry <plan-id>`           -- re-request a failed plan

use anyhow::{Context, Result};
use sqlx::PgPool;

use stride_core::generator::AnthropicGenerator;
use stride_core::orchestrator::{JobOutcome, PgPlanStore, run_generation_job};
use stride_core::plan::{self, GeneratedPlan, NewPlan, ProfileDefaults};
use stride_db::models::{Plan, PlanStatus};
use stride_db::queries::plans as plan_queries;

use crate::PlanCommands;
use crate::config::StrideConfig;
use crate::resolve::{parse_plan_id, resolve_profile_id};

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

/// Dispatch a `PlanCommands` variant to the appropriate handler.
pub async fn run_plan_command(
    command: PlanCommands,
    pool: &PgPool,
    config: &StrideConfig,
) -> Result<()> {
    match command {
        PlanCommands::Show { plan_id } => match plan_id {
            Some(id) => cmd_show_one(pool, &id).await,
            None => cmd_show_all(pool).await,
        },
        PlanCommands::Request {
            profile,
            goal,
            event,
            target_date,
            start_date,
            preferences,
            progress,
            injuries,
            previous,
            fresh,
        } => {
            let previous_plan_id = previous.as_deref().map(parse_plan_id).transpose()?;
            let request = NewPlan {
                goal_type: goal,
                target_event: event,
                target_date,
                start_date,
                preferences,
                progress_comment: progress,
                minor_injuries: injuries,
                previous_plan_id,
                fresh_start: fresh,
            };
            cmd_request(pool, &profile, &request).await
        }
        PlanCommands::Generate { plan_id } => cmd_generate(pool, config, &plan_id).await,
        PlanCommands::Retry { plan_id } => cmd_retry(pool, &plan_id).await,
    }
}

// -----------------------------------------------------------------------
// stride plan show (list all)
// -----------------------------------------------------------------------

/// List all plans with summary info.
async fn cmd_show_all(pool: &PgPool) -> Result<()> {
    let plans = plan_queries::list_plans(pool).await?;

    if plans.is_empty() {
        println!("No plans found. Use `stride plan request <profile> --goal <goal>` to create one.");
        return Ok(());
    }

    let id_w = 36;
    let status_w = 10;
    let goal_w = plans
        .iter()
        .map(|p| p.goal_type.len())
        .max()
        .unwrap_or(4)
        .max(4);

    println!(
        "{:<id_w$}  {:<status_w$}  {:<goal_w$}  {:<23}  TITLE",
        "ID", "STATUS", "GOAL", "DATES",
    );

    for plan in &plans {
        println!(
            "{:<id_w$}  {:<status_w$}  {:<goal_w$}  {:<23}  {}",
            plan.id,
            plan.status,
            plan.goal_type,
            date_range(plan),
            plan.plan_title,
        );
    }

    Ok(())
}

fn date_range(plan: &Plan) -> String {
    match plan.end_date {
        Some(end) => format!("{} .. {}", plan.start_date, end),
        None => plan.start_date.to_string(),
    }
}

// -----------------------------------------------------------------------
// stride plan show <plan-id>
// -----------------------------------------------------------------------

/// Show detailed info for a single plan, including its schedule once generated.
async fn cmd_show_one(pool: &PgPool, plan_id_str: &str) -> Result<()> {
    let plan_id = parse_plan_id(plan_id_str)?;
    let plan = plan_queries::get_plan(pool, plan_id)
        .await?
        .with_context(|| format!("plan {plan_id} not found"))?;

    print_plan(&plan);
    Ok(())
}

fn print_plan(plan: &Plan) {
    let title = if plan.plan_title.is_empty() {
        "(untitled)"
    } else {
        plan.plan_title.as_str()
    };
    println!("Plan: {title}");
    println!("  ID:           {}", plan.id);
    println!("  Profile:      {}", plan.profile_id);
    println!("  Status:       {}", plan.status);
    println!("  Goal:         {}", plan.goal_type);
    if let Some(event) = &plan.target_event {
        println!("  Event:        {event}");
    }
    if let Some(date) = plan.target_date {
        println!("  Target date:  {date}");
    }
    println!("  Dates:        {}", date_range(plan));
    if let Some(previous) = plan.previous_plan_id {
        println!("  Follows:      {previous}");
    }
    println!(
        "  Created:      {}",
        plan.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(completed) = plan.completed_at {
        println!(
            "  Finished:     {}",
            completed.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    match plan.status {
        PlanStatus::Failed => {
            println!();
            println!("  {}", plan.plan_summary);
        }
        PlanStatus::Completed => print_schedule(plan),
        PlanStatus::Pending | PlanStatus::Generating => {}
    }
}

fn print_schedule(plan: &Plan) {
    let generated: GeneratedPlan = match serde_json::from_value(plan.plan_json.clone()) {
        Ok(g) => g,
        Err(e) => {
            tracing::warn!(plan_id = %plan.id, error = %e, "stored plan does not match the schedule format");
            return;
        }
    };

    println!();
    println!("{}", generated.plan_summary);

    for week in &generated.plan_weeks {
        println!();
        println!("Week {}: {}", week.week_number, week.focus);
        for day in &week.days {
            if day.is_rest_day() {
                println!("  {:<10} Rest", day.day);
                continue;
            }
            let length = day
                .total_length_minutes
                .map(|m| format!(" ({m} min)"))
                .unwrap_or_default();
            println!("  {:<10} {}{}", day.day, day.workout_title, length);
            for exercise in &day.exercises {
                let mut detail = Vec::new();
                if let Some(sets) = exercise.sets {
                    detail.push(format!("{sets} sets"));
                }
                if let Some(reps) = &exercise.reps {
                    detail.push(format!("{reps} reps"));
                }
                if let Some(duration) = &exercise.duration {
                    detail.push(duration.clone());
                }
                if let Some(intensity) = &exercise.intensity {
                    detail.push(intensity.clone());
                }
                println!(
                    "             - {} [{}] {}",
                    exercise.name,
                    exercise.kind.as_str(),
                    detail.join(", ")
                );
            }
        }
    }
}

// -----------------------------------------------------------------------
// stride plan request
// -----------------------------------------------------------------------

async fn cmd_request(pool: &PgPool, profile: &str, request: &NewPlan) -> Result<()> {
    let profile_id = resolve_profile_id(pool, profile).await?;
    let plan = plan::request_plan(pool, profile_id, request).await?;

    println!("Plan requested.");
    println!();
    println!("  Plan ID:  {}", plan.id);
    println!("  Status:   {}", plan.status);
    println!("  Dates:    {}", date_range(&plan));
    if let Some(previous) = plan.previous_plan_id {
        println!("  Follows:  {previous}");
    }
    println!();
    println!(
        "A running `stride worker` or `stride serve` will pick it up, or run `stride plan generate {}`.",
        plan.id
    );
    Ok(())
}

// -----------------------------------------------------------------------
// stride plan generate <plan-id>
// -----------------------------------------------------------------------

/// Run the generation job for one plan in this process.
async fn cmd_generate(pool: &PgPool, config: &StrideConfig, plan_id_str: &str) -> Result<()> {
    let plan_id = parse_plan_id(plan_id_str)?;
    let store = PgPlanStore::new(pool.clone());
    let generator = AnthropicGenerator::new(config.generator.clone());

    println!("Generating plan {plan_id} with {}...", config.generator.model);
    let outcome =
        run_generation_job(&store, &generator, &ProfileDefaults::default(), plan_id).await;

    match outcome {
        JobOutcome::Completed => {
            let plan = plan_queries::get_plan(pool, plan_id)
                .await?
                .with_context(|| format!("plan {plan_id} disappeared after generation"))?;
            print_plan(&plan);
            Ok(())
        }
        JobOutcome::Failed { message } => anyhow::bail!("generation failed: {message}"),
        JobOutcome::NotFound => anyhow::bail!("plan {plan_id} not found"),
        JobOutcome::Skipped => {
            println!("Plan {plan_id} is not pending; nothing to do.");
            Ok(())
        }
    }
}

// -----------------------------------------------------------------------
// stride plan retry <plan-id>
// -----------------------------------------------------------------------

async fn cmd_retry(pool: &PgPool, plan_id_str: &str) -> Result<()> {
    let plan_id = parse_plan_id(plan_id_str)?;
    let plan = plan::retry_plan(pool, plan_id).await?;

    println!("Retry requested.");
    println!("  New plan ID:  {}", plan.id);
    println!("  Dates:        {}", date_range(&plan));
    Ok(())
}
