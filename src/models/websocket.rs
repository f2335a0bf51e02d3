use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// WebSocket消息类型
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum WebSocketMessageType {
    // 系统消息
    Connect,
    Ping,
    Pong,
    Error,

    // 房间管理
    JoinRoom,
    JoinAck,

    // 通知消息
    Notification,
}

/// WebSocket消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketMessage {
    pub id: String,
    pub message_type: WebSocketMessageType,
    pub room: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// 客户端加入房间请求，房间即接收者的用户ID
#[derive(Debug, Deserialize)]
pub struct JoinRoomRequest {
    pub user_id: String,
}

/// 连接心跳
#[derive(Debug, Serialize, Deserialize)]
pub struct HeartbeatMessage {
    pub connection_id: String,
    pub timestamp: DateTime<Utc>,
    pub client_timestamp: Option<DateTime<Utc>>,
}

/// 错误消息
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub code: String,
    pub message: String,
}

/// 实时通道统计
#[derive(Debug, Clone, Serialize)]
pub struct ChannelStats {
    pub total_connections: usize,
    pub active_rooms: usize,
}

impl WebSocketMessage {
    /// 创建新消息
    pub fn new(message_type: WebSocketMessageType, data: serde_json::Value) -> Self {
        Self {
            id: format!("msg_{}", uuid::Uuid::new_v4()),
            message_type,
            room: None,
            data,
            timestamp: Utc::now(),
        }
    }

    /// 创建通知消息
    pub fn notification(data: serde_json::Value, recipient_id: &str) -> Self {
        Self {
            room: Some(recipient_id.to_string()),
            ..Self::new(WebSocketMessageType::Notification, data)
        }
    }

    /// 创建错误消息
    pub fn error(code: &str, message: &str) -> Self {
        let error_data = ErrorMessage {
            code: code.to_string(),
            message: message.to_string(),
        };

        Self::new(
            WebSocketMessageType::Error,
            serde_json::to_value(error_data).unwrap_or_default(),
        )
    }

    /// 创建心跳消息
    pub fn pong(connection_id: &str, client_timestamp: Option<DateTime<Utc>>) -> Self {
        let heartbeat = HeartbeatMessage {
            connection_id: connection_id.to_string(),
            timestamp: Utc::now(),
            client_timestamp,
        };

        Self::new(
            WebSocketMessageType::Pong,
            serde_json::to_value(heartbeat).unwrap_or_default(),
        )
    }
}
