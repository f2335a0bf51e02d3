use crate::{
    config::Config,
    error::{AppError, Result},
    models::{user::UserProfile, websocket::*},
};
use axum::extract::ws::{Message, WebSocket};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::{sink::SinkExt, stream::StreamExt};
use serde_json::json;
use std::{collections::HashSet, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// 实时投递通道
///
/// 仅用于降低轮询延迟，不保存任何持久状态。通知是否存在以存储为准。
#[cfg_attr(test, mockall::automock)]
pub trait DeliveryChannel: Send + Sync {
    /// 将连接加入接收者房间；连接不存在时返回 `false`
    fn join(&self, connection_id: &str, recipient_id: &str) -> bool;

    fn leave(&self, connection_id: &str, recipient_id: &str);

    /// 推送到房间内全部连接，返回实际送达的连接数；无订阅者时静默返回 0
    fn publish(&self, recipient_id: &str, message: WebSocketMessage) -> usize;
}

/// 连接信息
#[derive(Debug)]
struct ConnectionInfo {
    user_id: Option<String>,
    tx: mpsc::UnboundedSender<WebSocketMessage>,
    rooms: HashSet<String>,
    connected_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
}

/// 单进程房间注册表：接收者ID -> 在线连接
#[derive(Debug, Default)]
pub struct RoomRegistry {
    connections: DashMap<String, ConnectionInfo>,
    rooms: DashMap<String, HashSet<String>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册新连接
    pub fn register(
        &self,
        connection_id: &str,
        user_id: Option<String>,
        tx: mpsc::UnboundedSender<WebSocketMessage>,
    ) {
        let now = Utc::now();
        self.connections.insert(
            connection_id.to_string(),
            ConnectionInfo {
                user_id,
                tx,
                rooms: HashSet::new(),
                connected_at: now,
                last_seen_at: now,
            },
        );
        debug!("Registered connection: {}", connection_id);
    }

    /// 注销连接并退出其加入的全部房间
    pub fn unregister(&self, connection_id: &str) {
        let Some((_, info)) = self.connections.remove(connection_id) else {
            return;
        };
        for room in &info.rooms {
            self.remove_from_room(room, connection_id);
        }
        info!(
            "Unregistered connection: {} (user: {:?}, connected at {})",
            connection_id, info.user_id, info.connected_at
        );
    }

    pub fn touch(&self, connection_id: &str) {
        if let Some(mut conn) = self.connections.get_mut(connection_id) {
            conn.last_seen_at = Utc::now();
        }
    }

    /// 发送消息到指定连接
    pub fn send_to_connection(&self, connection_id: &str, message: WebSocketMessage) -> Result<()> {
        let tx = self
            .connections
            .get(connection_id)
            .map(|conn| conn.tx.clone())
            .ok_or_else(|| AppError::NotFound(format!("Connection not found: {}", connection_id)))?;

        tx.send(message).map_err(|_| {
            warn!("Failed to send message to connection: {}", connection_id);
            AppError::internal("Connection send failed")
        })
    }

    /// 最后活跃时间早于阈值的连接
    pub fn stale_connections(&self, threshold: DateTime<Utc>) -> Vec<String> {
        self.connections
            .iter()
            .filter(|conn| conn.last_seen_at < threshold)
            .map(|conn| conn.key().clone())
            .collect()
    }

    pub fn room_size(&self, recipient_id: &str) -> usize {
        self.rooms.get(recipient_id).map(|r| r.len()).unwrap_or(0)
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            total_connections: self.connections.len(),
            active_rooms: self.rooms.len(),
        }
    }

    fn remove_from_room(&self, room: &str, connection_id: &str) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(connection_id);
        }
        self.rooms.remove_if(room, |_, members| members.is_empty());
    }
}

impl DeliveryChannel for RoomRegistry {
    fn join(&self, connection_id: &str, recipient_id: &str) -> bool {
        match self.connections.get_mut(connection_id) {
            Some(mut conn) => {
                conn.rooms.insert(recipient_id.to_string());
            }
            None => return false,
        }

        self.rooms
            .entry(recipient_id.to_string())
            .or_default()
            .insert(connection_id.to_string());

        debug!("Connection {} joined room: {}", connection_id, recipient_id);
        true
    }

    fn leave(&self, connection_id: &str, recipient_id: &str) {
        if let Some(mut conn) = self.connections.get_mut(connection_id) {
            conn.rooms.remove(recipient_id);
        }
        self.remove_from_room(recipient_id, connection_id);
        debug!("Connection {} left room: {}", connection_id, recipient_id);
    }

    fn publish(&self, recipient_id: &str, message: WebSocketMessage) -> usize {
        let members: Vec<String> = match self.rooms.get(recipient_id) {
            Some(room) => room.iter().cloned().collect(),
            None => return 0,
        };

        let delivered = members
            .iter()
            .filter(|connection_id| self.send_to_connection(connection_id, message.clone()).is_ok())
            .count();

        debug!(
            "Published to room {} ({} of {} connections)",
            recipient_id,
            delivered,
            members.len()
        );
        delivered
    }
}

/// WebSocket连接管理器
#[derive(Clone)]
pub struct WebSocketService {
    registry: Arc<RoomRegistry>,
    stale_after: chrono::Duration,
}

impl WebSocketService {
    pub fn new(registry: Arc<RoomRegistry>, config: &Config) -> Self {
        Self {
            registry,
            stale_after: chrono::Duration::seconds(config.websocket_stale_after_secs),
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// 处理新的WebSocket连接
    pub async fn handle_connection(&self, websocket: WebSocket, user: Option<UserProfile>) {
        let connection_id = format!("conn_{}", uuid::Uuid::new_v4());
        let user_id = user.map(|u| u.id);
        info!("New WebSocket connection: {} for user: {:?}", connection_id, user_id);

        let (mut ws_tx, mut ws_rx) = websocket.split();
        let (tx, mut rx) = mpsc::unbounded_channel();

        self.registry.register(&connection_id, user_id.clone(), tx);

        // 已认证连接自动加入自己的房间
        if let Some(user_id) = &user_id {
            self.registry.join(&connection_id, user_id);
        }

        let connect_msg = WebSocketMessage::new(
            WebSocketMessageType::Connect,
            json!({
                "connection_id": connection_id,
                "user_id": user_id,
                "timestamp": Utc::now()
            }),
        );
        if let Err(e) = self.registry.send_to_connection(&connection_id, connect_msg) {
            error!("Failed to send connect message: {}", e);
        }

        let send_connection_id = connection_id.clone();
        let mut send_task = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match serde_json::to_string(&message) {
                    Ok(json_str) => {
                        if let Err(e) = ws_tx.send(Message::Text(json_str)).await {
                            error!("Failed to send WebSocket message: {}", e);
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                    }
                }
            }
            debug!("Send task ended for connection: {}", send_connection_id);
        });

        let service = self.clone();
        let recv_connection_id = connection_id.clone();
        let recv_user_id = user_id.clone();
        let mut receive_task = tokio::spawn(async move {
            while let Some(msg_result) = ws_rx.next().await {
                service.registry.touch(&recv_connection_id);
                match msg_result {
                    Ok(Message::Text(text)) => {
                        if let Err(e) = service.handle_incoming_message(
                            &recv_connection_id,
                            recv_user_id.as_deref(),
                            &text,
                        ) {
                            warn!("Error handling incoming message: {}", e);
                            let _ = service.registry.send_to_connection(
                                &recv_connection_id,
                                WebSocketMessage::error("BAD_REQUEST", &e.to_string()),
                            );
                        }
                    }
                    Ok(Message::Close(_)) => {
                        info!("WebSocket connection closed: {}", recv_connection_id);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("WebSocket error for connection {}: {}", recv_connection_id, e);
                        break;
                    }
                }
            }
            debug!("Receive task ended for connection: {}", recv_connection_id);
        });

        // 任一方向结束即关闭整个连接
        tokio::select! {
            _ = &mut send_task => receive_task.abort(),
            _ = &mut receive_task => send_task.abort(),
        }

        self.registry.unregister(&connection_id);
    }

    /// 处理客户端消息
    pub(crate) fn handle_incoming_message(
        &self,
        connection_id: &str,
        user_id: Option<&str>,
        text: &str,
    ) -> Result<()> {
        debug!("Received message from {}: {}", connection_id, text);

        let message: WebSocketMessage = serde_json::from_str(text)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON: {}", e)))?;

        match message.message_type {
            WebSocketMessageType::Ping => {
                let client_timestamp = message
                    .data
                    .get("timestamp")
                    .and_then(|ts| ts.as_str())
                    .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                    .map(|dt| dt.with_timezone(&Utc));
                self.registry
                    .send_to_connection(connection_id, WebSocketMessage::pong(connection_id, client_timestamp))?;
            }
            WebSocketMessageType::JoinRoom => {
                let request: JoinRoomRequest = serde_json::from_value(message.data)
                    .map_err(|e| AppError::BadRequest(format!("Invalid join request: {}", e)))?;

                let reply = if user_id == Some(request.user_id.as_str())
                    && self.registry.join(connection_id, &request.user_id)
                {
                    let mut ack = WebSocketMessage::new(
                        WebSocketMessageType::JoinAck,
                        json!({ "room": request.user_id }),
                    );
                    ack.room = Some(request.user_id);
                    ack
                } else {
                    warn!(
                        "Connection {} refused room {} (user: {:?})",
                        connection_id, request.user_id, user_id
                    );
                    WebSocketMessage::error("FORBIDDEN_ROOM", "Cannot join another user's room")
                };
                self.registry.send_to_connection(connection_id, reply)?;
            }
            _ => {
                warn!("Unhandled message type: {:?}", message.message_type);
            }
        }

        Ok(())
    }

    /// 清理过期连接，返回清理数量
    pub fn cleanup_stale_connections(&self) -> usize {
        let threshold = Utc::now() - self.stale_after;
        let stale = self.registry.stale_connections(threshold);
        for connection_id in &stale {
            warn!("Cleaning up stale connection: {}", connection_id);
            self.registry.unregister(connection_id);
        }
        stale.len()
    }
}
