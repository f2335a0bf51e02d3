use crate::{
    error::Result,
    models::notification::MarkReadRequest,
    state::AppState,
    utils::{middleware::OptionalAuth, validation::validate_record_id},
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(get_unread_count))
        .route("/mark-read", post(mark_read))
        .route("/clear", post(clear_all))
        .route("/:id", delete(delete_notification))
        .route("/:id/click", post(open_notification))
}

/// 当前用户的通知列表（最新在前）
async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
    auth: OptionalAuth,
) -> Result<Json<Value>> {
    let user = auth.require()?;
    let list = state
        .notification_service
        .list_for_recipient(&user.id, query.limit)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": list
    })))
}

async fn get_unread_count(
    State(state): State<Arc<AppState>>,
    auth: OptionalAuth,
) -> Result<Json<Value>> {
    let user = auth.require()?;
    let unread_count = state.notification_service.unread_count(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "unread_count": unread_count }
    })))
}

/// 无 `notification_id` 时全部标记为已读
async fn mark_read(
    State(state): State<Arc<AppState>>,
    auth: OptionalAuth,
    request: Option<Json<MarkReadRequest>>,
) -> Result<Json<Value>> {
    let user = auth.require()?;
    let target = request.map(|Json(r)| r).unwrap_or_default().target();

    let unread = state.notification_service.mark_read(&user.id, target).await?;

    Ok(Json(json!({
        "success": true,
        "data": unread
    })))
}

async fn clear_all(State(state): State<Arc<AppState>>, auth: OptionalAuth) -> Result<Json<Value>> {
    let user = auth.require()?;
    let deleted = state.notification_service.clear_all(&user.id).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "deleted": deleted, "unread_count": 0 }
    })))
}

async fn delete_notification(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    auth: OptionalAuth,
) -> Result<Json<Value>> {
    let user = auth.require()?;
    validate_record_id("notification", &id)?;

    let unread = state.notification_service.delete_one(&user.id, &id).await?;

    Ok(Json(json!({
        "success": true,
        "data": unread
    })))
}

/// 点击通知：标记已读并返回跳转地址
async fn open_notification(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    auth: OptionalAuth,
) -> Result<Json<Value>> {
    let user = auth.require()?;
    validate_record_id("notification", &id)?;

    let opened = state.notification_service.open(&user.id, &id).await?;

    Ok(Json(json!({
        "success": true,
        "data": opened
    })))
}
