//! The structured output contract for a generated two-week plan.
//!
//! [`output_schema`] is sent to the generation service as the only channel
//! it may answer through, and the typed structs below are what a reply is
//! decoded into. The JSON field names are the persisted wire format: a
//! completed plan's payload is the reply object verbatim.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Number of weeks a generated plan must contain.
pub const PLAN_WEEKS: usize = 2;

/// The `name` a rest-day entry must carry.
pub const REST_DAY_NAME: &str = "Rest Day";

/// Name of the tool the generation service is forced to call.
pub const PLAN_TOOL_NAME: &str = "record_training_plan";

/// Allowed exercise categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    Strength,
    Cardio,
    Flexibility,
    Rest,
}

impl ExerciseKind {
    pub const ALL: [ExerciseKind; 4] = [
        ExerciseKind::Strength,
        ExerciseKind::Cardio,
        ExerciseKind::Flexibility,
        ExerciseKind::Rest,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strength => "strength",
            Self::Cardio => "cardio",
            Self::Flexibility => "flexibility",
            Self::Rest => "rest",
        }
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated generated plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedPlan {
    pub plan_title: String,
    pub plan_summary: String,
    pub plan_weeks: Vec<PlanWeek>,
}

impl GeneratedPlan {
    /// Number of days per week that are not rest days.
    pub fn workout_days_per_week(&self) -> Vec<usize> {
        self.plan_weeks
            .iter()
            .map(|w| w.days.iter().filter(|d| !d.is_rest_day()).count())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanWeek {
    pub week_number: u8,
    #[serde(default)]
    pub focus: String,
    pub days: Vec<PlanDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDay {
    pub day: String,
    #[serde(default)]
    pub workout_title: String,
    #[serde(default)]
    pub total_length_minutes: Option<u32>,
    pub exercises: Vec<Exercise>,
}

impl PlanDay {
    /// A rest day is a day whose only exercise is of type `rest`.
    pub fn is_rest_day(&self) -> bool {
        matches!(self.exercises.as_slice(), [only] if only.kind == ExerciseKind::Rest)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ExerciseKind,
    #[serde(default)]
    pub sets: Option<u32>,
    #[serde(default)]
    pub reps: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub intensity: Option<String>,
}

impl Exercise {
    /// Whether any of the quantitative fields is set.
    pub fn has_quantities(&self) -> bool {
        self.sets.is_some() || self.reps.is_some() || self.duration.is_some() || self.intensity.is_some()
    }
}

fn nullable(ty: &str, description: &str) -> Value {
    json!({ "type": [ty, "null"], "description": description })
}

/// JSON Schema describing the only accepted reply shape.
pub fn output_schema() -> Value {
    let kinds: Vec<&str> = ExerciseKind::ALL.iter().map(|k| k.as_str()).collect();

    let exercise = json!({
        "type": "object",
        "description": format!(
            "One movement or block. A rest day is exactly one exercise with name \"{REST_DAY_NAME}\", \
             type \"rest\" and null sets, reps, duration and intensity."
        ),
        "properties": {
            "name": { "type": "string", "description": "Specific exercise name, e.g. Barbell Squat, Treadmill Run, Yoga Flow." },
            "type": { "type": "string", "enum": kinds },
            "sets": nullable("integer", "Number of sets, or null for continuous work and rest days."),
            "reps": nullable("string", "Repetitions per set, e.g. \"8-10\"; null when duration is used."),
            "duration": nullable("string", "Time or distance, e.g. \"30 minutes\", \"3 x 800m\"; null when reps are used."),
            "intensity": nullable("string", "RPE 1-10, or a heart-rate zone or pace for cardio, e.g. \"RPE 7\", \"Zone 2 HR\".")
        },
        "required": ["name", "type"]
    });

    let day = json!({
        "type": "object",
        "properties": {
            "day": { "type": "string", "description": "Day of the week, e.g. Monday." },
            "workout_title": { "type": "string", "description": "Short session title, e.g. Full Body Push, Long Run Tempo, Rest." },
            "total_length_minutes": nullable("integer", "Total session length including warm-up and cool-down; null on rest days."),
            "exercises": { "type": "array", "minItems": 1, "items": exercise }
        },
        "required": ["day", "workout_title", "exercises"]
    });

    let week = json!({
        "type": "object",
        "properties": {
            "week_number": { "type": "integer", "enum": [1, 2] },
            "focus": { "type": "string", "description": "Main goal for the week, e.g. aerobic base, strength endurance." },
            "days": { "type": "array", "minItems": 7, "maxItems": 7, "items": day }
        },
        "required": ["week_number", "focus", "days"]
    });

    json!({
        "type": "object",
        "properties": {
            "plan_title": { "type": "string", "description": "Short title for the two-week block." },
            "plan_summary": { "type": "string", "description": "A concise, actionable and encouraging summary of the next two weeks." },
            "plan_weeks": {
                "type": "array",
                "description": "Exactly 2 weeks of training.",
                "minItems": PLAN_WEEKS,
                "maxItems": PLAN_WEEKS,
                "items": week
            }
        },
        "required": ["plan_title", "plan_summary", "plan_weeks"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_requires_top_level_fields() {
        let schema = output_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(required, vec!["plan_title", "plan_summary", "plan_weeks"]);
        assert_eq!(schema["properties"]["plan_weeks"]["minItems"], 2);
        assert_eq!(schema["properties"]["plan_weeks"]["maxItems"], 2);
    }

    #[test]
    fn schema_enumerates_exercise_kinds() {
        let schema = output_schema();
        let kinds = &schema["properties"]["plan_weeks"]["items"]["properties"]["days"]["items"]
            ["properties"]["exercises"]["items"]["properties"]["type"]["enum"];
        assert_eq!(kinds, &json!(["strength", "cardio", "flexibility", "rest"]));
    }

    #[test]
    fn schema_describes_rest_day_encoding() {
        let text = output_schema().to_string();
        assert!(text.contains("Rest Day"));
        assert!(text.contains("type \\\"rest\\\""));
    }

    #[test]
    fn rest_day_detection_needs_single_rest_entry() {
        let rest = Exercise {
            name: REST_DAY_NAME.to_string(),
            kind: ExerciseKind::Rest,
            sets: None,
            reps: None,
            duration: None,
            intensity: None,
        };
        let squat = Exercise {
            name: "Goblet Squat".to_string(),
            kind: ExerciseKind::Strength,
            sets: Some(3),
            reps: Some("10".to_string()),
            duration: None,
            intensity: Some("RPE 7".to_string()),
        };
        let day = |exercises| PlanDay {
            day: "Monday".to_string(),
            workout_title: String::new(),
            total_length_minutes: None,
            exercises,
        };

        assert!(day(vec![rest.clone()]).is_rest_day());
        assert!(!day(vec![squat.clone()]).is_rest_day());
        assert!(!day(vec![rest, squat]).is_rest_day());
        assert!(!day(vec![]).is_rest_day());
    }

    #[test]
    fn exercise_type_field_is_named_type() {
        let ex: Exercise = serde_json::from_value(json!({
            "name": "Easy Run", "type": "cardio", "duration": "25 minutes", "intensity": "Zone 2 HR"
        }))
        .unwrap();
        assert_eq!(ex.kind, ExerciseKind::Cardio);
        assert_eq!(ex.sets, None);
        assert!(ex.has_quantities());
    }
}
