use crate::{
    error::Result,
    state::AppState,
    utils::{middleware::OptionalAuth, validation::validate_record_id},
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{delete, get},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users/:id/projects", get(get_owner_projects))
        .route("/api/liked-projects", get(get_liked_projects))
        .route("/api/account", delete(delete_account))
}

/// 个人主页：资料与项目卡片
async fn get_owner_projects(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<String>,
) -> Result<Json<Value>> {
    validate_record_id("user", &owner_id)?;
    let page = state.user_service.owner_projects(&owner_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": page
    })))
}

async fn get_liked_projects(
    State(state): State<Arc<AppState>>,
    auth: OptionalAuth,
) -> Result<Json<Value>> {
    let user = auth.require()?;
    let liked = state.user_service.liked_projects(&user).await?;

    Ok(Json(json!({
        "success": true,
        "data": liked
    })))
}

/// 注销账号，级联删除项目、互动与通知
async fn delete_account(
    State(state): State<Arc<AppState>>,
    auth: OptionalAuth,
) -> Result<Json<Value>> {
    let user = auth.require()?;
    let deleted = state.user_service.delete_account(&user).await?;
    state.auth_service.forget_user(&user.id);

    info!("Account deleted: {}", user.id);

    Ok(Json(json!({
        "success": true,
        "data": deleted
    })))
}
