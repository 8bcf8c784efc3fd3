//! Structural validation of a generation reply.
//!
//! Checks run on the raw JSON first so that a reply missing a top-level key
//! or carrying the wrong number of weeks is reported as incomplete rather
//! than as a decode error. Only then is the reply decoded into
//! [`GeneratedPlan`] and the rest-day encoding checked.

use serde_json::{Map, Value};
use thiserror::Error;

use super::schema::{ExerciseKind, GeneratedPlan, PLAN_WEEKS, REST_DAY_NAME};
use crate::generator::GenerationReply;

/// Ways a reply can fail to describe a usable plan.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaViolation {
    #[error("no structured reply from generation service")]
    NoStructuredReply,

    #[error("incomplete plan: {0}")]
    Incomplete(String),

    #[error("week {week}, {day}: exercises must be a list of objects")]
    ExercisesNotObjects { week: usize, day: String },

    #[error("week {week}, {day}: day has no exercises")]
    EmptyDay { week: usize, day: String },

    #[error("week {week}, {day}: unknown exercise type {value:?}")]
    UnknownExerciseType { week: usize, day: String, value: String },

    #[error("week {week}, {day}: a rest entry must be the only exercise of its day")]
    RestNotAlone { week: usize, day: String },

    #[error("week {week}, {day}: rest entry must be named {REST_DAY_NAME:?}, got {name:?}")]
    RestDayName { week: usize, day: String, name: String },

    #[error("week {week}, {day}: rest entry must not carry sets, reps, duration or intensity")]
    RestWithQuantities { week: usize, day: String },

    #[error("malformed plan: {0}")]
    Malformed(String),
}

const REQUIRED_KEYS: [&str; 3] = ["plan_title", "plan_summary", "plan_weeks"];

/// Validate a reply and decode it.
///
/// On success the caller persists `reply.structured` verbatim; the returned
/// [`GeneratedPlan`] is the typed view of the same object.
pub fn validate_reply(reply: &GenerationReply) -> Result<GeneratedPlan, SchemaViolation> {
    let value = reply
        .structured
        .as_ref()
        .ok_or(SchemaViolation::NoStructuredReply)?;

    let object = value
        .as_object()
        .ok_or_else(|| SchemaViolation::Incomplete("reply is not an object".to_string()))?;

    check_completeness(object)?;

    // `check_completeness` guarantees an array here.
    if let Some(Value::Array(weeks)) = object.get("plan_weeks") {
        for (index, week) in weeks.iter().enumerate() {
            check_week_encoding(index + 1, week)?;
        }
    }

    let plan: GeneratedPlan = serde_json::from_value(value.clone())
        .map_err(|e| SchemaViolation::Malformed(e.to_string()))?;

    check_rest_days(&plan)?;

    Ok(plan)
}

fn check_completeness(object: &Map<String, Value>) -> Result<(), SchemaViolation> {
    for key in REQUIRED_KEYS {
        if !object.contains_key(key) || object[key].is_null() {
            return Err(SchemaViolation::Incomplete(format!("missing {key}")));
        }
    }

    let weeks = object["plan_weeks"]
        .as_array()
        .ok_or_else(|| SchemaViolation::Incomplete("plan_weeks is not a list".to_string()))?;

    if weeks.is_empty() {
        return Err(SchemaViolation::Incomplete("plan_weeks is empty".to_string()));
    }
    if weeks.len() != PLAN_WEEKS {
        return Err(SchemaViolation::Incomplete(format!(
            "expected {PLAN_WEEKS} weeks, got {}",
            weeks.len()
        )));
    }
    Ok(())
}

/// Day-level checks that need the raw value: exercise list shape and
/// exercise type names.
fn check_week_encoding(week: usize, value: &Value) -> Result<(), SchemaViolation> {
    let Some(days) = value.get("days").and_then(Value::as_array) else {
        return Err(SchemaViolation::Incomplete(format!(
            "week {week} has no list of days"
        )));
    };

    for (index, day) in days.iter().enumerate() {
        let day_name = day
            .get("day")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("day {}", index + 1));

        let Some(exercises) = day.get("exercises").and_then(Value::as_array) else {
            return Err(SchemaViolation::ExercisesNotObjects {
                week,
                day: day_name,
            });
        };
        if exercises.is_empty() {
            return Err(SchemaViolation::EmptyDay {
                week,
                day: day_name,
            });
        }

        for exercise in exercises {
            let Some(fields) = exercise.as_object() else {
                return Err(SchemaViolation::ExercisesNotObjects {
                    week,
                    day: day_name,
                });
            };
            let kind = fields.get("type").and_then(Value::as_str).unwrap_or("");
            if !ExerciseKind::ALL.iter().any(|k| k.as_str() == kind) {
                return Err(SchemaViolation::UnknownExerciseType {
                    week,
                    day: day_name,
                    value: kind.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn check_rest_days(plan: &GeneratedPlan) -> Result<(), SchemaViolation> {
    for (index, week) in plan.plan_weeks.iter().enumerate() {
        let week_no = index + 1;
        for day in &week.days {
            let rest_entries: Vec<_> = day
                .exercises
                .iter()
                .filter(|e| e.kind == ExerciseKind::Rest)
                .collect();

            let Some(rest) = rest_entries.first() else {
                continue;
            };
            if day.exercises.len() != 1 {
                return Err(SchemaViolation::RestNotAlone {
                    week: week_no,
                    day: day.day.clone(),
                });
            }
            if rest.name != REST_DAY_NAME {
                return Err(SchemaViolation::RestDayName {
                    week: week_no,
                    day: day.day.clone(),
                    name: rest.name.clone(),
                });
            }
            if rest.has_quantities() {
                return Err(SchemaViolation::RestWithQuantities {
                    week: week_no,
                    day: day.day.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rest_day(day: &str) -> Value {
        json!({
            "day": day,
            "workout_title": "Rest",
            "total_length_minutes": null,
            "exercises": [{"name": "Rest Day", "type": "rest",
                           "sets": null, "reps": null, "duration": null, "intensity": null}]
        })
    }

    fn workout_day(day: &str) -> Value {
        json!({
            "day": day,
            "workout_title": "Full Body",
            "total_length_minutes": 45,
            "exercises": [
                {"name": "Goblet Squat", "type": "strength", "sets": 3, "reps": "10",
                 "duration": null, "intensity": "RPE 7"},
                {"name": "Easy Run", "type": "cardio", "sets": null, "reps": null,
                 "duration": "20 minutes", "intensity": "Zone 2 HR"}
            ]
        })
    }

    fn week(n: u8) -> Value {
        json!({
            "week_number": n,
            "focus": "base",
            "days": [
                workout_day("Monday"), rest_day("Tuesday"), workout_day("Wednesday"),
                rest_day("Thursday"), workout_day("Friday"), rest_day("Saturday"), rest_day("Sunday")
            ]
        })
    }

    fn good_plan() -> Value {
        json!({
            "plan_title": "Base Builder",
            "plan_summary": "Two weeks of aerobic base.",
            "plan_weeks": [week(1), week(2)]
        })
    }

    fn check(value: Value) -> Result<GeneratedPlan, SchemaViolation> {
        validate_reply(&GenerationReply::structured(value))
    }

    #[test]
    fn well_formed_plan_validates() {
        let plan = check(good_plan()).unwrap();
        assert_eq!(plan.plan_title, "Base Builder");
        assert_eq!(plan.plan_weeks.len(), 2);
        assert_eq!(plan.workout_days_per_week(), vec![3, 3]);
    }

    #[test]
    fn text_only_reply_is_no_structured_reply() {
        let err = validate_reply(&GenerationReply::text_only("Here is a plan")).unwrap_err();
        assert_eq!(err, SchemaViolation::NoStructuredReply);
        assert_eq!(err.to_string(), "no structured reply from generation service");
    }

    #[test]
    fn missing_top_level_key_is_incomplete() {
        for key in REQUIRED_KEYS {
            let mut value = good_plan();
            value.as_object_mut().unwrap().remove(key);
            let err = check(value).unwrap_err();
            assert_eq!(err, SchemaViolation::Incomplete(format!("missing {key}")));
            assert!(err.to_string().starts_with("incomplete plan"));
        }
    }

    #[test]
    fn wrong_week_count_is_incomplete() {
        let mut value = good_plan();
        value["plan_weeks"] = json!([week(1)]);
        assert!(matches!(check(value).unwrap_err(), SchemaViolation::Incomplete(_)));

        let mut value = good_plan();
        value["plan_weeks"] = json!([]);
        assert_eq!(
            check(value).unwrap_err(),
            SchemaViolation::Incomplete("plan_weeks is empty".to_string())
        );

        let mut value = good_plan();
        value["plan_weeks"] = json!([week(1), week(2), week(2)]);
        assert_eq!(
            check(value).unwrap_err(),
            SchemaViolation::Incomplete("expected 2 weeks, got 3".to_string())
        );
    }

    #[test]
    fn empty_day_is_rejected() {
        let mut value = good_plan();
        value["plan_weeks"][0]["days"][1]["exercises"] = json!([]);
        assert_eq!(
            check(value).unwrap_err(),
            SchemaViolation::EmptyDay {
                week: 1,
                day: "Tuesday".to_string()
            }
        );
    }

    #[test]
    fn rest_as_free_text_is_rejected() {
        let mut value = good_plan();
        value["plan_weeks"][1]["days"][3]["exercises"] = json!("Rest");
        assert!(matches!(
            check(value).unwrap_err(),
            SchemaViolation::ExercisesNotObjects { week: 2, .. }
        ));

        let mut value = good_plan();
        value["plan_weeks"][1]["days"][3]["exercises"] = json!(["Rest"]);
        assert!(matches!(
            check(value).unwrap_err(),
            SchemaViolation::ExercisesNotObjects { week: 2, .. }
        ));
    }

    #[test]
    fn unknown_exercise_type_is_rejected() {
        let mut value = good_plan();
        value["plan_weeks"][0]["days"][0]["exercises"][0]["type"] = json!("plyometrics");
        assert!(matches!(
            check(value).unwrap_err(),
            SchemaViolation::UnknownExerciseType { ref value, .. } if value == "plyometrics"
        ));
    }

    #[test]
    fn rest_mixed_with_work_is_rejected() {
        let mut value = good_plan();
        let exercises = value["plan_weeks"][0]["days"][0]["exercises"].as_array_mut().unwrap();
        exercises.push(json!({"name": "Rest Day", "type": "rest"}));
        assert!(matches!(
            check(value).unwrap_err(),
            SchemaViolation::RestNotAlone { week: 1, .. }
        ));
    }

    #[test]
    fn rest_entry_must_use_canonical_name() {
        let mut value = good_plan();
        value["plan_weeks"][0]["days"][1]["exercises"][0]["name"] = json!("Recovery");
        assert!(matches!(
            check(value).unwrap_err(),
            SchemaViolation::RestDayName { ref name, .. } if name == "Recovery"
        ));
    }

    #[test]
    fn rest_entry_must_not_carry_quantities() {
        let mut value = good_plan();
        value["plan_weeks"][0]["days"][1]["exercises"][0]["duration"] = json!("all day");
        assert!(matches!(
            check(value).unwrap_err(),
            SchemaViolation::RestWithQuantities { week: 1, .. }
        ));
    }

    #[test]
    fn rest_entry_may_omit_null_fields() {
        let mut value = good_plan();
        value["plan_weeks"][0]["days"][1]["exercises"] = json!([{"name": "Rest Day", "type": "rest"}]);
        assert!(check(value).is_ok());
    }

    #[test]
    fn wrong_field_types_are_malformed() {
        let mut value = good_plan();
        value["plan_weeks"][0]["days"][0]["exercises"][0]["sets"] = json!("three");
        assert!(matches!(check(value).unwrap_err(), SchemaViolation::Malformed(_)));
    }
}
