//! Profile, comment and follow-request query functions.

use uuid::Uuid;

use stride_db::models::{CommentTarget, FitnessLevel, ProfileFields, SessionDuration};
use stride_db::queries::{comments, follows, profiles};
use stride_test_utils::{TestDb, seed_profile};

#[tokio::test]
async fn profile_update_keeps_unset_fields() {
    let db = TestDb::create().await;
    let profile = seed_profile(
        &db.pool,
        ProfileFields {
            fitness_level: Some(FitnessLevel::Beginner),
            equipment_text: Some("yoga mat".to_string()),
            ..ProfileFields::default()
        },
    )
    .await;

    let updated = profiles::update_profile(
        &db.pool,
        profile.id,
        &ProfileFields {
            exercise_duration: Some(SessionDuration::From31To60),
            ..ProfileFields::default()
        },
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(updated.fitness_level, Some(FitnessLevel::Beginner));
    assert_eq!(updated.equipment_text.as_deref(), Some("yoga mat"));
    assert_eq!(updated.exercise_duration, Some(SessionDuration::From31To60));
    assert!(updated.updated_at >= profile.updated_at);

    let by_name = profiles::get_profile_by_username(&db.pool, &profile.username)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_name.id, profile.id);

    let missing = profiles::update_profile(&db.pool, Uuid::new_v4(), &ProfileFields::default())
        .await
        .unwrap();
    assert!(missing.is_none());

    db.drop().await;
}

#[tokio::test]
async fn follow_request_lifecycle() {
    let db = TestDb::create().await;
    let a = seed_profile(&db.pool, ProfileFields::default()).await;
    let b = seed_profile(&db.pool, ProfileFields::default()).await;

    let req = follows::insert_follow_request(&db.pool, a.id, b.id)
        .await
        .unwrap()
        .unwrap();
    assert!(!req.accepted);

    let dup = follows::insert_follow_request(&db.pool, a.id, b.id).await.unwrap();
    assert!(dup.is_none());

    assert_eq!(follows::list_pending_for(&db.pool, b.id).await.unwrap().len(), 1);
    assert!(follows::list_followers(&db.pool, b.id).await.unwrap().is_empty());

    let accepted = follows::accept_follow_request(&db.pool, req.id).await.unwrap().unwrap();
    assert!(accepted.accepted);
    assert!(follows::accept_follow_request(&db.pool, req.id).await.unwrap().is_none());

    assert_eq!(follows::list_followers(&db.pool, b.id).await.unwrap()[0].id, a.id);
    assert_eq!(follows::list_following(&db.pool, a.id).await.unwrap()[0].id, b.id);
    assert!(follows::get_between(&db.pool, a.id, b.id).await.unwrap().is_some());
    assert!(follows::get_between(&db.pool, b.id, a.id).await.unwrap().is_none());

    assert_eq!(follows::delete_follow_request(&db.pool, req.id).await.unwrap(), 1);
    assert!(follows::get_follow_request(&db.pool, req.id).await.unwrap().is_none());

    db.drop().await;
}

#[tokio::test]
async fn comment_queries_respect_target_and_approval() {
    let db = TestDb::create().await;
    let owner = seed_profile(&db.pool, ProfileFields::default()).await;
    let author = seed_profile(&db.pool, ProfileFields::default()).await;
    let target = CommentTarget::Profile(owner.id);

    let visible = comments::insert_comment(&db.pool, author.id, target, None, "Strong week", true)
        .await
        .unwrap();
    let held = comments::insert_comment(&db.pool, author.id, target, None, "Held back", false)
        .await
        .unwrap();
    let reply = comments::insert_comment(&db.pool, owner.id, target, Some(visible.id), "Thanks", true)
        .await
        .unwrap();
    assert_eq!(visible.target(), target);

    let public = comments::list_for_target(&db.pool, target, false).await.unwrap();
    assert_eq!(public.len(), 1);
    assert_eq!(public[0].id, visible.id);

    let all = comments::list_for_target(&db.pool, target, true).await.unwrap();
    let ids: Vec<Uuid> = all.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![held.id, visible.id], "newest first, replies excluded");

    let replies = comments::list_replies(&db.pool, visible.id, false).await.unwrap();
    assert_eq!(replies[0].id, reply.id);

    assert_eq!(comments::approve_comment(&db.pool, held.id).await.unwrap(), 1);
    assert_eq!(comments::approve_comment(&db.pool, held.id).await.unwrap(), 0);

    let edited = comments::update_content(&db.pool, held.id, "Edited").await.unwrap().unwrap();
    assert_eq!(edited.content, "Edited");

    // Deleting the root removes its replies too.
    assert_eq!(comments::delete_comment(&db.pool, visible.id).await.unwrap(), 1);
    assert!(comments::get_comment(&db.pool, reply.id).await.unwrap().is_none());

    db.drop().await;
}
