use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Like,
    Comment,
    Reply,
    View,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Like => "like",
            NotificationType::Comment => "comment",
            NotificationType::Reply => "reply",
            NotificationType::View => "view",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub sender_id: String,
    pub project_id: String,
    pub notification_type: NotificationType,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub recipient_id: String,
    pub sender_id: String,
    pub project_id: String,
    pub notification_type: NotificationType,
    pub message: String,
}

impl NewNotification {
    pub fn is_self_notification(&self) -> bool {
        self.recipient_id == self.sender_id
    }

    pub fn into_notification(self) -> Notification {
        Notification {
            id: Uuid::new_v4().to_string(),
            recipient_id: self.recipient_id,
            sender_id: self.sender_id,
            project_id: self.project_id,
            notification_type: self.notification_type,
            message: self.message,
            is_read: false,
            created_at: Utc::now(),
        }
    }
}

/// 读取时解析发送者与项目名称后的通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationView {
    pub id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub project_id: String,
    pub project_name: String,
    pub notification_type: NotificationType,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationList {
    pub notifications: Vec<NotificationView>,
    pub unread_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    pub unread_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadTarget {
    One(String),
    All,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarkReadRequest {
    pub notification_id: Option<String>,
}

impl MarkReadRequest {
    pub fn target(self) -> ReadTarget {
        match self.notification_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => ReadTarget::One(id),
            None => ReadTarget::All,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationOpened {
    pub redirect_url: String,
    pub unread_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_type_serializes_lowercase() {
        let json = serde_json::to_string(&NotificationType::Reply).unwrap();
        assert_eq!(json, "\"reply\"");
        assert_eq!(NotificationType::Like.as_str(), "like");
    }

    #[test]
    fn test_mark_read_request_target() {
        let req = MarkReadRequest { notification_id: None };
        assert_eq!(req.target(), ReadTarget::All);

        let req = MarkReadRequest { notification_id: Some(" ".to_string()) };
        assert_eq!(req.target(), ReadTarget::All);

        let req = MarkReadRequest { notification_id: Some("n1".to_string()) };
        assert_eq!(req.target(), ReadTarget::One("n1".to_string()));
    }

    #[test]
    fn test_new_notification_starts_unread() {
        let n = NewNotification {
            recipient_id: "a".to_string(),
            sender_id: "b".to_string(),
            project_id: "p".to_string(),
            notification_type: NotificationType::Like,
            message: "b liked your project".to_string(),
        };
        assert!(!n.is_self_notification());
        let stored = n.into_notification();
        assert!(!stored.is_read);
        assert_eq!(stored.recipient_id, "a");
    }
}
