use crate::{
    error::{AppError, Result},
    models::{engagement::CommentRequest, feed::FeedQuery},
    state::AppState,
    utils::{
        middleware::{rate_limit_middleware, OptionalAuth},
        validation::validate_record_id,
    },
};
use axum::{
    extract::{Path, Query, State},
    middleware,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use validator::Validate;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // 写操作按IP限流
    let writes = Router::new()
        .route("/:id/view", post(record_view))
        .route("/:id/like", post(toggle_like))
        .route("/:id/comments", post(add_comment))
        .route("/:id/comments/:comment_id", delete(delete_comment))
        .route("/:id/comments/:comment_id/replies", post(add_reply))
        .route(
            "/:id/comments/:comment_id/replies/:reply_id",
            delete(delete_reply),
        )
        .route_layer(middleware::from_fn_with_state(state, rate_limit_middleware));

    Router::new()
        .route("/", get(browse_projects))
        .route("/:id", get(get_project).delete(delete_project))
        .merge(writes)
}

async fn browse_projects(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Value>> {
    let mode = query.rank_mode().map_err(AppError::BadRequest)?;
    let result = state.feed_service.browse(&query.filter(), mode).await?;

    Ok(Json(json!({
        "success": true,
        "data": result
    })))
}

async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<Value>> {
    validate_record_id("project", &id)?;
    let detail = state.project_service.get_detail(user.as_ref(), &id).await?;

    Ok(Json(json!({
        "success": true,
        "data": detail
    })))
}

async fn delete_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    auth: OptionalAuth,
) -> Result<Json<Value>> {
    let user = auth.require()?;
    validate_record_id("project", &id)?;

    state.project_service.delete_project(&user, &id).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "ok": true, "project_id": id }
    })))
}

async fn record_view(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    auth: OptionalAuth,
) -> Result<Json<Value>> {
    let user = auth.require()?;
    validate_record_id("project", &id)?;

    let recorded = state.engagement_service.record_view(&user, &id).await?;

    Ok(Json(json!({
        "success": true,
        "data": recorded
    })))
}

async fn toggle_like(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    auth: OptionalAuth,
) -> Result<Json<Value>> {
    let user = auth.require()?;
    validate_record_id("project", &id)?;

    let toggle = state.engagement_service.toggle_like(&user, &id).await?;

    Ok(Json(json!({
        "success": true,
        "data": toggle
    })))
}

async fn add_comment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    auth: OptionalAuth,
    Json(request): Json<CommentRequest>,
) -> Result<Json<Value>> {
    let user = auth.require()?;
    validate_record_id("project", &id)?;
    request.validate()?;

    debug!("Adding comment to {} by {}", id, user.id);
    let created = state
        .engagement_service
        .add_comment(&user, &id, &request.text)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": created
    })))
}

async fn delete_comment(
    State(state): State<Arc<AppState>>,
    Path((id, comment_id)): Path<(String, String)>,
    auth: OptionalAuth,
) -> Result<Json<Value>> {
    let user = auth.require()?;
    validate_record_id("project", &id)?;
    validate_record_id("comment", &comment_id)?;

    let deleted = state
        .engagement_service
        .delete_comment(&user, &id, &comment_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": deleted
    })))
}

async fn add_reply(
    State(state): State<Arc<AppState>>,
    Path((id, comment_id)): Path<(String, String)>,
    auth: OptionalAuth,
    Json(request): Json<CommentRequest>,
) -> Result<Json<Value>> {
    let user = auth.require()?;
    validate_record_id("project", &id)?;
    validate_record_id("comment", &comment_id)?;
    request.validate()?;

    let created = state
        .engagement_service
        .add_reply(&user, &id, &comment_id, &request.text)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": created
    })))
}

async fn delete_reply(
    State(state): State<Arc<AppState>>,
    Path((id, comment_id, reply_id)): Path<(String, String, String)>,
    auth: OptionalAuth,
) -> Result<Json<Value>> {
    let user = auth.require()?;
    validate_record_id("project", &id)?;
    validate_record_id("comment", &comment_id)?;
    validate_record_id("reply", &reply_id)?;

    let deleted = state
        .engagement_service
        .delete_reply(&user, &id, &comment_id, &reply_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": deleted
    })))
}
