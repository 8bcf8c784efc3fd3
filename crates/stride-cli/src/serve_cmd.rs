use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use stride_core::plan::{self, NewPlan, PlanRequestError};
use stride_core::queue::JobQueue;
use stride_core::social::{self, SocialError};
use stride_db::models::{
    Comment, CommentTarget, FollowRequest, Plan, Profile, ProfileFields, ProfileWithFollowers,
};
use stride_db::queries::{comments as comment_db, plans as plan_db};

use crate::config::StrideConfig;
use crate::worker_cmd;

/// Header carrying the acting profile's id.
pub const PROFILE_HEADER: &str = "x-profile-id";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn internal(err: anyhow::Error) -> Self {
        tracing::error!(error = %format!("{err:#}"), "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<SocialError> for AppError {
    fn from(err: SocialError) -> Self {
        let status = match err {
            SocialError::Db(e) => return Self::internal(e),
            SocialError::ProfileNotFound(_)
            | SocialError::PlanNotFound(_)
            | SocialError::CommentNotFound(_)
            | SocialError::FollowRequestNotFound(_) => StatusCode::NOT_FOUND,
            SocialError::ParentOnOtherTarget(_)
            | SocialError::EmptyContent
            | SocialError::SelfFollow
            | SocialError::InvalidField { .. } => StatusCode::BAD_REQUEST,
            SocialError::DuplicateFollow | SocialError::UsernameTaken(_) => StatusCode::CONFLICT,
            SocialError::Forbidden(_) => StatusCode::FORBIDDEN,
        };
        Self::new(status, err.to_string())
    }
}

impl From<PlanRequestError> for AppError {
    fn from(err: PlanRequestError) -> Self {
        let status = match err {
            PlanRequestError::Db(e) => return Self::internal(e),
            PlanRequestError::ProfileNotFound(_) | PlanRequestError::PlanNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            PlanRequestError::EmptyGoal
            | PlanRequestError::TargetDateInPast(_)
            | PlanRequestError::PreviousPlanNotOwned { .. } => StatusCode::BAD_REQUEST,
            PlanRequestError::NotRetryable { .. } => StatusCode::CONFLICT,
        };
        Self::new(status, err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Acting profile extractors
// ---------------------------------------------------------------------------

/// The profile performing the request. Required.
#[derive(Debug, Clone, Copy)]
pub struct Acting(pub Uuid);

/// The profile performing the request, when the caller identified one.
#[derive(Debug, Clone, Copy)]
pub struct MaybeActing(pub Option<Uuid>);

fn profile_header(parts: &Parts) -> Result<Option<Uuid>, AppError> {
    let Some(value) = parts.headers.get(PROFILE_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .map(Some)
        .ok_or_else(|| AppError::bad_request(format!("{PROFILE_HEADER} is not a valid id")))
}

impl<S: Send + Sync> FromRequestParts<S> for Acting {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        profile_header(parts)?
            .map(Acting)
            .ok_or_else(|| AppError::bad_request(format!("missing {PROFILE_HEADER} header")))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for MaybeActing {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        profile_header(parts).map(MaybeActing)
    }
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProfileBody {
    pub username: String,
    #[serde(flatten)]
    pub fields: ProfileFields,
}

#[derive(Debug, Deserialize)]
pub struct NewCommentBody {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct EditCommentBody {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct FollowBody {
    pub to_profile_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentQuery {
    #[serde(default)]
    pub include_unapproved: bool,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub queue: JobQueue,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/profiles", get(list_profiles).post(create_profile))
        .route("/api/profiles/{id}", get(get_profile).patch(update_profile))
        .route("/api/profiles/{id}/plans", get(list_profile_plans))
        .route(
            "/api/profiles/{id}/comments",
            get(list_profile_comments).post(add_profile_comment),
        )
        .route("/api/profiles/{id}/followers", get(list_followers))
        .route("/api/profiles/{id}/following", get(list_following))
        .route("/api/profiles/{id}/follow-requests", get(list_pending_follows))
        .route("/api/plans", post(request_plan))
        .route("/api/plans/{id}", get(get_plan))
        .route("/api/plans/{id}/retry", post(retry_plan))
        .route(
            "/api/plans/{id}/comments",
            get(list_plan_comments).post(add_plan_comment),
        )
        .route(
            "/api/comments/{id}",
            patch(edit_comment).delete(delete_comment),
        )
        .route("/api/comments/{id}/replies", get(list_replies))
        .route("/api/comments/{id}/approve", post(approve_comment))
        .route("/api/follows", post(request_follow))
        .route("/api/follows/{id}", delete(cancel_follow))
        .route("/api/follows/{id}/accept", post(accept_follow))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(pool: PgPool, config: &StrideConfig, bind: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    let cancel = CancellationToken::new();
    let (queue, handle) = worker_cmd::start_queue(&pool, config, cancel).await?;

    let app = build_router(AppState { pool, queue });
    tracing::info!("stride serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    let report = handle.shutdown().await;
    worker_cmd::log_drain(&report);
    served?;
    tracing::info!("stride serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

async fn list_profiles(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProfileWithFollowers>>, AppError> {
    Ok(Json(social::list_profiles(&state.pool).await?))
}

async fn create_profile(
    State(state): State<AppState>,
    Json(body): Json<CreateProfileBody>,
) -> Result<(StatusCode, Json<Profile>), AppError> {
    let profile = social::create_profile(&state.pool, body.username.trim(), &body.fields).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(social::get_profile(&state.pool, id).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Acting(acting): Acting,
    Json(fields): Json<ProfileFields>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(
        social::update_profile(&state.pool, id, acting, &fields).await?,
    ))
}

async fn list_profile_plans(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Plan>>, AppError> {
    social::get_profile(&state.pool, id).await?;
    let plans = plan_db::list_plans_for_profile(&state.pool, id)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(plans))
}

async fn list_followers(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Profile>>, AppError> {
    social::get_profile(&state.pool, id).await?;
    Ok(Json(social::followers(&state.pool, id).await?))
}

async fn list_following(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Profile>>, AppError> {
    social::get_profile(&state.pool, id).await?;
    Ok(Json(social::following(&state.pool, id).await?))
}

async fn list_pending_follows(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Acting(acting): Acting,
) -> Result<Json<Vec<FollowRequest>>, AppError> {
    if acting != id {
        return Err(AppError::forbidden(
            "only the profile owner can see pending follow requests",
        ));
    }
    Ok(Json(social::pending_requests(&state.pool, id).await?))
}

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

async fn request_plan(
    State(state): State<AppState>,
    Acting(acting): Acting,
    Json(body): Json<NewPlan>,
) -> Result<(StatusCode, Json<Plan>), AppError> {
    let plan = plan::request_plan(&state.pool, acting, &body).await?;
    state.queue.submit(plan.id);
    Ok((StatusCode::ACCEPTED, Json(plan)))
}

async fn load_plan(pool: &PgPool, id: Uuid) -> Result<Plan, AppError> {
    plan_db::get_plan(pool, id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found(format!("plan {id} not found")))
}

async fn get_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Plan>, AppError> {
    Ok(Json(load_plan(&state.pool, id).await?))
}

async fn retry_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Acting(acting): Acting,
) -> Result<(StatusCode, Json<Plan>), AppError> {
    let existing = load_plan(&state.pool, id).await?;
    if existing.profile_id != acting {
        return Err(AppError::forbidden("only the plan owner can retry it"));
    }
    let plan = plan::retry_plan(&state.pool, id).await?;
    state.queue.submit(plan.id);
    Ok((StatusCode::ACCEPTED, Json(plan)))
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

/// Unapproved comments are visible to the target's owner only.
async fn check_unapproved_access(
    pool: &PgPool,
    target: CommentTarget,
    include_unapproved: bool,
    acting: Option<Uuid>,
) -> Result<(), AppError> {
    let owner = social::target_owner(pool, target).await?;
    if include_unapproved && acting != Some(owner) {
        return Err(AppError::forbidden(
            "only the owner can see unapproved comments",
        ));
    }
    Ok(())
}

async fn list_target_comments(
    pool: &PgPool,
    target: CommentTarget,
    query: CommentQuery,
    acting: Option<Uuid>,
) -> Result<Json<Vec<Comment>>, AppError> {
    check_unapproved_access(pool, target, query.include_unapproved, acting).await?;
    Ok(Json(
        social::list_comments(pool, target, query.include_unapproved).await?,
    ))
}

async fn list_profile_comments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<CommentQuery>,
    MaybeActing(acting): MaybeActing,
) -> Result<Json<Vec<Comment>>, AppError> {
    list_target_comments(&state.pool, CommentTarget::Profile(id), query, acting).await
}

async fn list_plan_comments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<CommentQuery>,
    MaybeActing(acting): MaybeActing,
) -> Result<Json<Vec<Comment>>, AppError> {
    list_target_comments(&state.pool, CommentTarget::Plan(id), query, acting).await
}

async fn add_profile_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Acting(acting): Acting,
    Json(body): Json<NewCommentBody>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let comment = social::add_comment(
        &state.pool,
        acting,
        CommentTarget::Profile(id),
        body.parent_id,
        &body.content,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn add_plan_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Acting(acting): Acting,
    Json(body): Json<NewCommentBody>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let comment = social::add_comment(
        &state.pool,
        acting,
        CommentTarget::Plan(id),
        body.parent_id,
        &body.content,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn list_replies(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<CommentQuery>,
    MaybeActing(acting): MaybeActing,
) -> Result<Json<Vec<Comment>>, AppError> {
    let parent = comment_db::get_comment(&state.pool, id)
        .await
        .map_err(AppError::internal)?
        .ok_or(SocialError::CommentNotFound(id))?;
    check_unapproved_access(&state.pool, parent.target(), query.include_unapproved, acting)
        .await?;
    Ok(Json(
        social::replies(&state.pool, id, query.include_unapproved).await?,
    ))
}

async fn approve_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Acting(acting): Acting,
) -> Result<Json<Comment>, AppError> {
    Ok(Json(social::approve_comment(&state.pool, id, acting).await?))
}

async fn edit_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Acting(acting): Acting,
    Json(body): Json<EditCommentBody>,
) -> Result<Json<Comment>, AppError> {
    Ok(Json(
        social::edit_comment(&state.pool, id, acting, &body.content).await?,
    ))
}

async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Acting(acting): Acting,
) -> Result<StatusCode, AppError> {
    social::delete_comment(&state.pool, id, acting).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Follows
// ---------------------------------------------------------------------------

async fn request_follow(
    State(state): State<AppState>,
    Acting(acting): Acting,
    Json(body): Json<FollowBody>,
) -> Result<(StatusCode, Json<FollowRequest>), AppError> {
    let req = social::request_follow(&state.pool, acting, body.to_profile_id).await?;
    Ok((StatusCode::CREATED, Json(req)))
}

async fn accept_follow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Acting(acting): Acting,
) -> Result<Json<FollowRequest>, AppError> {
    Ok(Json(social::accept_follow(&state.pool, id, acting).await?))
}

async fn cancel_follow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Acting(acting): Acting,
) -> Result<StatusCode, AppError> {
    social::cancel_follow(&state.pool, id, acting).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
