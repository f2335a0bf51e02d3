use crate::{
    error::Result,
    models::feed::FeedQuery,
    state::AppState,
    utils::middleware::OptionalAuth,
};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_feed))
        .route("/technologies", get(get_technologies))
}

/// 个性化首页（匿名访问时没有同届分区）
async fn get_feed(
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Value>> {
    let feed = state
        .feed_service
        .get_feed(user.as_ref(), &query.filter())
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": feed
    })))
}

async fn get_technologies(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let technologies = state.feed_service.available_technologies().await?;

    Ok(Json(json!({
        "success": true,
        "data": technologies
    })))
}
