//! Generation request construction: profile defaults, feedback context and
//! the natural-language instructions sent alongside the output schema.
//!
//! Everything here is pure; the orchestrator feeds it rows it has loaded.

use chrono::NaiveDate;

use stride_db::models::{Plan, Profile};

use super::schema::{PLAN_TOOL_NAME, PLAN_WEEKS, REST_DAY_NAME, output_schema};
use crate::generator::GenerationRequest;

/// Feedback text used when a plan has no predecessor.
pub const NO_PREVIOUS_FEEDBACK: &str = "No previous feedback available.";

/// Values substituted for profile attributes that are missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDefaults {
    pub fitness_level: String,
    pub days_per_week: u8,
    pub session_duration: String,
    pub equipment: String,
    pub injuries: String,
}

impl Default for ProfileDefaults {
    fn default() -> Self {
        Self {
            fitness_level: "unknown".to_string(),
            days_per_week: 3,
            session_duration: "31-60 minutes".to_string(),
            equipment: "bodyweight only (no equipment listed)".to_string(),
            injuries: "None reported".to_string(),
        }
    }
}

/// Profile attributes as they go into the instructions, defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationProfile {
    pub fitness_level: String,
    pub days_per_week: u8,
    pub session_duration: String,
    pub equipment: String,
    pub long_term_injuries: String,
    pub injury_limitations: String,
    pub minor_injuries: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
}

fn text_or(value: &Option<String>, fallback: &str) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => fallback.to_string(),
    }
}

impl GenerationProfile {
    /// Read a profile, substituting `defaults` for anything missing or out
    /// of range. Never fails.
    pub fn from_profile(profile: &Profile, defaults: &ProfileDefaults) -> Self {
        let days_per_week = profile
            .exercise_days_per_week
            .and_then(|d| u8::try_from(d).ok())
            .filter(|d| (1..=7).contains(d))
            .unwrap_or(defaults.days_per_week);

        Self {
            fitness_level: profile
                .fitness_level
                .map(|l| l.to_string())
                .unwrap_or_else(|| defaults.fitness_level.clone()),
            days_per_week,
            session_duration: profile
                .exercise_duration
                .map(|d| d.label().to_string())
                .unwrap_or_else(|| defaults.session_duration.clone()),
            equipment: text_or(&profile.equipment_text, &defaults.equipment),
            long_term_injuries: text_or(&profile.long_term_injuries, &defaults.injuries),
            injury_limitations: text_or(&profile.injury_limitations, &defaults.injuries),
            minor_injuries: text_or(&profile.minor_injuries, &defaults.injuries),
            age: profile.age,
            gender: profile.gender.clone().filter(|g| !g.trim().is_empty()),
            weight_kg: profile.weight_kg,
            height_cm: profile.height_cm,
        }
    }
}

/// The goal fields of the plan being generated.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanGoal {
    pub goal_type: String,
    pub target_event: Option<String>,
    pub target_date: Option<NaiveDate>,
    pub start_date: NaiveDate,
    pub preferences: Option<String>,
    pub minor_injuries: Option<String>,
}

impl From<&Plan> for PlanGoal {
    fn from(plan: &Plan) -> Self {
        Self {
            goal_type: plan.goal_type.clone(),
            target_event: plan.target_event.clone(),
            target_date: plan.target_date,
            start_date: plan.start_date,
            preferences: plan.preferences.clone(),
            minor_injuries: plan.minor_injuries.clone(),
        }
    }
}

/// Summarise a predecessor plan for the next generation.
///
/// Field order is fixed: summary, duration, progress notes, injury notes.
pub fn feedback_context(previous: Option<&Plan>) -> String {
    let Some(prev) = previous else {
        return NO_PREVIOUS_FEEDBACK.to_string();
    };

    let summary = if prev.plan_summary.trim().is_empty() {
        "None"
    } else {
        prev.plan_summary.trim()
    };
    let end = prev
        .end_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "None".to_string());

    format!(
        "Previous Plan Summary: {summary}\n\
         Duration: {} to {end}\n\
         Progress Comments: {}\n\
         Minor Injuries: {}\n\
         \n\
         Use this information to improve the new training plan.",
        prev.start_date,
        text_or(&prev.progress_comment, "None"),
        text_or(&prev.minor_injuries, "None"),
    )
}

/// Build the natural-language instructions for one plan.
pub fn build_instructions(profile: &GenerationProfile, goal: &PlanGoal, feedback: &str) -> String {
    let mut prompt = String::with_capacity(2048);

    prompt.push_str(
        "You are an experienced personal trainer. Design a safe, progressive training plan \
         for the athlete described below and record it with the provided tool.\n\n",
    );

    prompt.push_str("## Athlete\n\n");
    prompt.push_str(&format!("- Fitness level: {}\n", profile.fitness_level));
    prompt.push_str(&format!(
        "- Training days per week: {}\n",
        profile.days_per_week
    ));
    prompt.push_str(&format!("- Session length: {}\n", profile.session_duration));
    prompt.push_str(&format!("- Equipment: {}\n", profile.equipment));
    prompt.push_str(&format!(
        "- Long-term injuries: {}\n",
        profile.long_term_injuries
    ));
    prompt.push_str(&format!(
        "- Movement limitations: {}\n",
        profile.injury_limitations
    ));
    prompt.push_str(&format!(
        "- Recent minor injuries: {}\n",
        goal.minor_injuries
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&profile.minor_injuries)
    ));
    if let Some(age) = profile.age {
        prompt.push_str(&format!("- Age: {age}\n"));
    }
    if let Some(gender) = &profile.gender {
        prompt.push_str(&format!("- Gender: {gender}\n"));
    }
    if let Some(w) = profile.weight_kg {
        prompt.push_str(&format!("- Weight: {w} kg\n"));
    }
    if let Some(h) = profile.height_cm {
        prompt.push_str(&format!("- Height: {h} cm\n"));
    }

    prompt.push_str("\n## Goal\n\n");
    prompt.push_str(&format!("- Goal type: {}\n", goal.goal_type));
    if let Some(event) = goal.target_event.as_deref().filter(|e| !e.trim().is_empty()) {
        prompt.push_str(&format!("- Target event: {event}\n"));
    }
    if let Some(date) = goal.target_date {
        prompt.push_str(&format!("- Target date: {date}\n"));
    }
    prompt.push_str(&format!("- Plan starts: {}\n", goal.start_date));
    if let Some(prefs) = goal.preferences.as_deref().filter(|p| !p.trim().is_empty()) {
        prompt.push_str(&format!("- Preferences: {prefs}\n"));
    }

    prompt.push_str("\n## Feedback from the previous plan\n\n");
    prompt.push_str(feedback.trim());
    prompt.push_str("\n\n");

    prompt.push_str("## Requirements\n\n");
    prompt.push_str(&format!(
        "1. The plan covers exactly {PLAN_WEEKS} weeks, numbered 1 and 2, each listing all seven days.\n"
    ));
    prompt.push_str(&format!(
        "2. Each week has exactly {} training days; every other day is a rest day.\n",
        profile.days_per_week
    ));
    prompt.push_str(&format!(
        "3. A rest day has exactly one exercise: name \"{REST_DAY_NAME}\", type \"rest\", \
         with sets, reps, duration and intensity set to null. Never leave a day's exercises empty \
         and never describe rest as free text.\n"
    ));
    prompt.push_str(&format!(
        "4. Every workout respects the injuries, limitations and equipment above and fits \
         within {}.\n",
        profile.session_duration
    ));
    prompt.push_str(
        "5. Exercise type is one of strength, cardio, flexibility or rest.\n\
         6. Intensity is an RPE between 1 and 10, or for cardio an equivalent heart-rate zone or pace.\n\
         7. Use reps for strength sets and duration for timed or distance work.\n",
    );
    prompt.push_str(&format!(
        "\nRespond only by calling the `{PLAN_TOOL_NAME}` tool. Do not reply with text.\n"
    ));

    prompt
}

/// Assemble the full request: instructions plus the output schema.
pub fn build_request(profile: &GenerationProfile, goal: &PlanGoal, feedback: &str) -> GenerationRequest {
    GenerationRequest {
        instructions: build_instructions(profile, goal, feedback),
        tool_name: PLAN_TOOL_NAME.to_string(),
        output_schema: output_schema(),
    }
}
