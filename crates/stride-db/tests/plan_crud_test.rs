//! Plan query functions: insert, lookups and the status transitions used by
//! generation jobs.

use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;

use stride_db::models::{NewPlanRow, PlanStatus, Profile, ProfileFields};
use stride_db::queries::plans;
use stride_test_utils::{TestDb, seed_profile};

fn new_plan(profile: &Profile, previous: Option<Uuid>) -> NewPlanRow {
    let start = NaiveDate::from_ymd_opt(2026, 11, 2).unwrap();
    NewPlanRow {
        profile_id: profile.id,
        goal_type: "endurance".to_string(),
        target_event: Some("half marathon".to_string()),
        target_date: NaiveDate::from_ymd_opt(2027, 3, 14),
        start_date: start,
        end_date: NaiveDate::from_ymd_opt(2026, 11, 15).unwrap(),
        preferences: Some("mornings".to_string()),
        progress_comment: None,
        minor_injuries: None,
        previous_plan_id: previous,
    }
}

#[tokio::test]
async fn insert_and_get_plan() {
    let db = TestDb::create().await;
    let profile = seed_profile(&db.pool, ProfileFields::default()).await;

    let plan = plans::insert_plan(&db.pool, &new_plan(&profile, None))
        .await
        .unwrap();

    assert_eq!(plan.status, PlanStatus::Pending);
    assert_eq!(plan.plan_json, json!({}));
    assert_eq!(plan.plan_title, "");
    assert!(plan.completed_at.is_none());

    let fetched = plans::get_plan(&db.pool, plan.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, plan.id);
    assert_eq!(fetched.goal_type, "endurance");
    assert_eq!(fetched.end_date, NaiveDate::from_ymd_opt(2026, 11, 15));

    assert!(plans::get_plan(&db.pool, Uuid::new_v4()).await.unwrap().is_none());

    db.drop().await;
}

#[tokio::test]
async fn plans_are_listed_newest_first() {
    let db = TestDb::create().await;
    let a = seed_profile(&db.pool, ProfileFields::default()).await;
    let b = seed_profile(&db.pool, ProfileFields::default()).await;

    let first = plans::insert_plan(&db.pool, &new_plan(&a, None)).await.unwrap();
    let second = plans::insert_plan(&db.pool, &new_plan(&a, Some(first.id))).await.unwrap();
    plans::insert_plan(&db.pool, &new_plan(&b, None)).await.unwrap();

    let for_a = plans::list_plans_for_profile(&db.pool, a.id).await.unwrap();
    let ids: Vec<Uuid> = for_a.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let latest = plans::latest_plan_for_profile(&db.pool, a.id).await.unwrap().unwrap();
    assert_eq!(latest.id, second.id);
    assert_eq!(latest.previous_plan_id, Some(first.id));
    assert!(
        plans::latest_completed_plan_for_profile(&db.pool, a.id)
            .await
            .unwrap()
            .is_none(),
        "pending plans are not completed"
    );

    assert_eq!(plans::list_plans(&db.pool).await.unwrap().len(), 3);

    let pending = plans::list_plans_by_status(&db.pool, PlanStatus::Pending).await.unwrap();
    assert_eq!(pending.len(), 3);
    assert_eq!(pending[0].id, first.id, "oldest first");

    db.drop().await;
}

#[tokio::test]
async fn claim_is_single_owner() {
    let db = TestDb::create().await;
    let profile = seed_profile(&db.pool, ProfileFields::default()).await;
    let plan = plans::insert_plan(&db.pool, &new_plan(&profile, None)).await.unwrap();

    assert!(plans::claim_plan(&db.pool, plan.id).await.unwrap());
    assert!(!plans::claim_plan(&db.pool, plan.id).await.unwrap());
    assert!(!plans::claim_plan(&db.pool, Uuid::new_v4()).await.unwrap());

    let claimed = plans::get_plan(&db.pool, plan.id).await.unwrap().unwrap();
    assert_eq!(claimed.status, PlanStatus::Generating);

    db.drop().await;
}

#[tokio::test]
async fn complete_requires_generating() {
    let db = TestDb::create().await;
    let profile = seed_profile(&db.pool, ProfileFields::default()).await;
    let plan = plans::insert_plan(&db.pool, &new_plan(&profile, None)).await.unwrap();
    let payload = json!({"plan_title": "T", "plan_summary": "S", "plan_weeks": []});

    // Still pending: nothing happens.
    let rows = plans::complete_plan(&db.pool, plan.id, &payload, "T", "S").await.unwrap();
    assert_eq!(rows, 0);

    plans::claim_plan(&db.pool, plan.id).await.unwrap();
    let rows = plans::complete_plan(&db.pool, plan.id, &payload, "T", "S").await.unwrap();
    assert_eq!(rows, 1);

    let done = plans::get_plan(&db.pool, plan.id).await.unwrap().unwrap();
    assert_eq!(done.status, PlanStatus::Completed);
    assert_eq!(done.plan_json, payload);
    assert_eq!(done.plan_title, "T");
    assert_eq!(done.plan_summary, "S");
    assert!(done.completed_at.is_some());

    // Terminal: a late failure write is ignored.
    let rows = plans::fail_plan(&db.pool, plan.id, &json!({"error": "late"}), "x")
        .await
        .unwrap();
    assert_eq!(rows, 0);
    let still = plans::get_plan(&db.pool, plan.id).await.unwrap().unwrap();
    assert_eq!(still.status, PlanStatus::Completed);

    db.drop().await;
}

#[tokio::test]
async fn fail_records_error_payload() {
    let db = TestDb::create().await;
    let profile = seed_profile(&db.pool, ProfileFields::default()).await;
    let plan = plans::insert_plan(&db.pool, &new_plan(&profile, None)).await.unwrap();
    plans::claim_plan(&db.pool, plan.id).await.unwrap();

    let payload = json!({"error": "boom"});
    let rows = plans::fail_plan(&db.pool, plan.id, &payload, "Generation failed: boom")
        .await
        .unwrap();
    assert_eq!(rows, 1);

    let failed = plans::get_plan(&db.pool, plan.id).await.unwrap().unwrap();
    assert_eq!(failed.status, PlanStatus::Failed);
    assert_eq!(failed.error_message(), Some("boom"));
    assert_eq!(failed.plan_summary, "Generation failed: boom");

    db.drop().await;
}

#[tokio::test]
async fn orphaned_generating_plans_are_failed() {
    let db = TestDb::create().await;
    let profile = seed_profile(&db.pool, ProfileFields::default()).await;
    let stuck = plans::insert_plan(&db.pool, &new_plan(&profile, None)).await.unwrap();
    let waiting = plans::insert_plan(&db.pool, &new_plan(&profile, None)).await.unwrap();
    plans::claim_plan(&db.pool, stuck.id).await.unwrap();

    let reset = plans::fail_orphaned_plans(&db.pool, &json!({"error": "restart"}), "restart")
        .await
        .unwrap();

    assert_eq!(reset.len(), 1);
    assert_eq!(reset[0].id, stuck.id);
    assert_eq!(reset[0].status, PlanStatus::Failed);
    let waiting = plans::get_plan(&db.pool, waiting.id).await.unwrap().unwrap();
    assert_eq!(waiting.status, PlanStatus::Pending);

    db.drop().await;
}
