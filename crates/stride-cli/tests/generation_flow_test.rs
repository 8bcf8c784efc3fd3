//! End-to-end generation against a local stand-in for the Messages API.
//!
//! A small axum server plays the generation service so the real HTTP client,
//! the queue and Postgres are all exercised together.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use stride_core::generator::{AnthropicGenerator, GeneratorConfig};
use stride_core::orchestrator::{JobOutcome, Orchestrator, PgPlanStore, run_generation_job};
use stride_core::plan::{NewPlan, PLAN_TOOL_NAME, ProfileDefaults, request_plan};
use stride_core::queue::JobQueue;
use stride_db::models::{FitnessLevel, PlanStatus, ProfileFields};
use stride_db::queries::plans as plan_db;
use stride_test_utils::{TestDb, seed_profile};

// -----------------------------------------------------------------------
// Fake generation service
// -----------------------------------------------------------------------

#[derive(Clone)]
struct FakeService {
    status: StatusCode,
    reply: Value,
    seen: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
}

async fn messages(
    State(svc): State<FakeService>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    svc.seen.lock().unwrap().push((headers, body));
    (svc.status, Json(svc.reply.clone()))
}

async fn start_fake(status: StatusCode, reply: Value) -> (String, FakeService) {
    let svc = FakeService {
        status,
        reply,
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/v1/messages", post(messages))
        .with_state(svc.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), svc)
}

fn generator_for(base_url: String) -> AnthropicGenerator {
    AnthropicGenerator::new(GeneratorConfig {
        api_key: Some("sk-test".to_string()),
        base_url,
        ..GeneratorConfig::default()
    })
}

// -----------------------------------------------------------------------
// Fixtures
// -----------------------------------------------------------------------

fn week(number: u8) -> Value {
    let names = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];
    let days: Vec<Value> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            if i % 2 == 0 && i < 6 {
                json!({"day": name, "workout_title": "Easy Run", "total_length_minutes": 40,
                       "exercises": [{"name": "Run", "type": "cardio", "sets": null, "reps": null,
                                      "duration": "40 min", "intensity": "Zone 2"}]})
            } else {
                json!({"day": name, "workout_title": "Rest", "total_length_minutes": null,
                       "exercises": [{"name": "Rest Day", "type": "rest"}]})
            }
        })
        .collect();
    json!({"week_number": number, "focus": "aerobic base", "days": days})
}

fn tool_reply(input: Value) -> Value {
    json!({
        "id": "msg_1",
        "type": "message",
        "role": "assistant",
        "stop_reason": "tool_use",
        "content": [
            {"type": "tool_use", "id": "toolu_1", "name": PLAN_TOOL_NAME, "input": input}
        ],
        "usage": {"input_tokens": 900, "output_tokens": 1200}
    })
}

fn base_plan() -> Value {
    json!({
        "plan_title": "10K Base",
        "plan_summary": "Three easy runs a week.",
        "plan_weeks": [week(1), week(2)]
    })
}

fn runner() -> ProfileFields {
    ProfileFields {
        fitness_level: Some(FitnessLevel::Beginner),
        exercise_days_per_week: Some(3),
        ..ProfileFields::default()
    }
}

fn goal() -> NewPlan {
    NewPlan {
        goal_type: "endurance".to_string(),
        target_event: Some("10k".to_string()),
        ..NewPlan::default()
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[tokio::test]
async fn queued_plan_is_generated_through_http_client() {
    let db = TestDb::create().await;
    let profile = seed_profile(&db.pool, runner()).await;
    let plan = request_plan(&db.pool, profile.id, &goal()).await.unwrap();
    let (base_url, svc) = start_fake(StatusCode::OK, tool_reply(base_plan())).await;

    let orchestrator = Orchestrator::new(
        Arc::new(PgPlanStore::new(db.pool.clone())),
        Arc::new(generator_for(base_url)),
        ProfileDefaults::default(),
    );
    let (queue, handle) = JobQueue::start(orchestrator, 2, CancellationToken::new());
    assert!(queue.submit(plan.id));
    drop(queue);
    let report = handle.join().await;
    assert_eq!(report.completed, 1);

    let stored = plan_db::get_plan(&db.pool, plan.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PlanStatus::Completed);
    assert_eq!(stored.plan_title, "10K Base");
    assert_eq!(stored.plan_json, base_plan());

    let seen = svc.seen.lock().unwrap();
    assert_eq!(seen.len(), 1, "exactly one call per job");
    let (headers, body) = &seen[0];
    assert_eq!(headers.get("x-api-key").unwrap(), "sk-test");
    assert!(headers.get("anthropic-version").is_some());
    assert_eq!(body["model"], GeneratorConfig::DEFAULT_MODEL);
    assert_eq!(body["tool_choice"]["type"], "tool");
    assert_eq!(body["tool_choice"]["name"], PLAN_TOOL_NAME);
    assert_eq!(body["tools"][0]["name"], PLAN_TOOL_NAME);
    let instructions = body["messages"][0]["content"].as_str().unwrap();
    assert!(instructions.contains("10k"), "goal reaches the instructions");

    drop(seen);
    db.drop().await;
}

#[tokio::test]
async fn service_error_fails_the_plan() {
    let db = TestDb::create().await;
    let profile = seed_profile(&db.pool, runner()).await;
    let plan = request_plan(&db.pool, profile.id, &goal()).await.unwrap();
    let (base_url, _svc) = start_fake(
        StatusCode::SERVICE_UNAVAILABLE,
        json!({"type": "error", "error": {"type": "overloaded_error"}}),
    )
    .await;

    let store = PgPlanStore::new(db.pool.clone());
    let outcome = run_generation_job(
        &store,
        &generator_for(base_url),
        &ProfileDefaults::default(),
        plan.id,
    )
    .await;

    let JobOutcome::Failed { message } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(message.contains("503"), "got: {message}");

    let stored = plan_db::get_plan(&db.pool, plan.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PlanStatus::Failed);
    assert_eq!(stored.error_message(), Some(message.as_str()));
    assert!(stored.plan_summary.starts_with("Generation failed: "));

    db.drop().await;
}

#[tokio::test]
async fn reply_with_one_week_is_rejected() {
    let db = TestDb::create().await;
    let profile = seed_profile(&db.pool, runner()).await;
    let plan = request_plan(&db.pool, profile.id, &goal()).await.unwrap();
    let short = json!({
        "plan_title": "Half",
        "plan_summary": "Only one week.",
        "plan_weeks": [week(1)]
    });
    let (base_url, _svc) = start_fake(StatusCode::OK, tool_reply(short)).await;

    let store = PgPlanStore::new(db.pool.clone());
    let outcome = run_generation_job(
        &store,
        &generator_for(base_url),
        &ProfileDefaults::default(),
        plan.id,
    )
    .await;

    assert_eq!(
        outcome,
        JobOutcome::Failed {
            message: "incomplete plan: expected 2 weeks, got 1".to_string()
        }
    );

    db.drop().await;
}
