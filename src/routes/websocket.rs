use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    response::{Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    error::Result,
    state::AppState,
    utils::middleware::OptionalAuth,
};

#[derive(Debug, Deserialize)]
struct ConnectQuery {
    /// 浏览器无法为 WebSocket 设置请求头，允许通过查询参数传令牌
    token: Option<String>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(websocket_handler))
        .route("/stats", get(get_websocket_stats))
}

/// WebSocket连接处理器
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<ConnectQuery>,
) -> Response {
    let user = match (user, query.token.as_deref()) {
        (Some(user), _) => Some(user),
        (None, Some(token)) => match state.auth_service.resolve_user(token).await {
            Ok(user) => Some(user),
            Err(e) => {
                debug!("WebSocket token rejected: {}", e);
                None
            }
        },
        (None, None) => None,
    };

    info!(
        "WebSocket upgrade request from user: {:?}",
        user.as_ref().map(|u| u.id.as_str())
    );

    let service = state.websocket_service.clone();
    ws.on_upgrade(move |socket| async move {
        service.handle_connection(socket, user).await;
    })
}

async fn get_websocket_stats(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let stats = state.websocket_service.registry().stats();

    Ok(Json(json!({
        "success": true,
        "data": stats
    })))
}
