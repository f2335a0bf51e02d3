use crate::{
    config::Config,
    error::{AppError, Result},
    models::{
        notification::*,
        project::Project,
        user::UserProfile,
        websocket::WebSocketMessage,
    },
    services::websocket::DeliveryChannel,
    storage::Store,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const UNKNOWN_USER: &str = "Unknown User";
const UNKNOWN_PROJECT: &str = "Unknown Project";

/// 通知分发与未读状态
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn Store>,
    channel: Arc<dyn DeliveryChannel>,
    list_limit: usize,
}

/// 通知文案
pub fn compose_message(kind: NotificationType, sender_name: &str, project_name: &str) -> String {
    match kind {
        NotificationType::Like => format!("{} liked your project \"{}\"", sender_name, project_name),
        NotificationType::Comment => format!("{} commented on your project \"{}\"", sender_name, project_name),
        NotificationType::Reply => format!("{} replied to your comment on \"{}\"", sender_name, project_name),
        NotificationType::View => format!("{} viewed your project \"{}\"", sender_name, project_name),
    }
}

impl NotificationService {
    pub fn new(store: Arc<dyn Store>, channel: Arc<dyn DeliveryChannel>, config: &Config) -> Self {
        Self {
            store,
            channel,
            list_limit: config.notification_list_limit,
        }
    }

    /// 分发一条通知：持久化后推送到接收者房间
    ///
    /// 自我通知直接忽略。持久化失败只记录日志，不影响调用方的主操作。
    pub async fn dispatch(&self, event: NewNotification) -> Option<NotificationView> {
        if event.is_self_notification() {
            debug!(
                "Skipping self notification for user {} on project {}",
                event.sender_id, event.project_id
            );
            return None;
        }

        let notification = match self.store.insert_notification(event.into_notification()).await {
            Ok(n) => n,
            Err(e) => {
                error!("Failed to persist notification: {}", e);
                return None;
            }
        };

        info!(
            "Notification {} ({}) created for user {}",
            notification.id,
            notification.notification_type.as_str(),
            notification.recipient_id
        );

        let recipient_id = notification.recipient_id.clone();
        let view = match self.resolve_views(vec![notification.clone()]).await {
            Ok(mut views) => views.pop(),
            Err(e) => {
                warn!("Failed to resolve notification names: {}", e);
                None
            }
        }
        .unwrap_or_else(|| to_view(notification, &HashMap::new(), &HashMap::new()));

        match serde_json::to_value(&view) {
            Ok(payload) => {
                let delivered = self
                    .channel
                    .publish(&recipient_id, WebSocketMessage::notification(payload, &recipient_id));
                debug!("Live notification delivered to {} connections", delivered);
            }
            Err(e) => warn!("Failed to serialize live notification: {}", e),
        }

        Some(view)
    }

    /// 接收者的通知列表（最新在前）与未读数
    pub async fn list_for_recipient(&self, recipient_id: &str, limit: Option<usize>) -> Result<NotificationList> {
        debug!("Listing notifications for user: {}", recipient_id);

        let limit = limit.unwrap_or(self.list_limit).min(self.list_limit);
        let notifications = self.store.list_notifications(recipient_id, limit).await?;
        let notifications = self.resolve_views(notifications).await?;
        let unread_count = self.unread_count(recipient_id).await?;

        Ok(NotificationList {
            notifications,
            unread_count,
        })
    }

    pub async fn unread_count(&self, recipient_id: &str) -> Result<u64> {
        self.store.count_unread(recipient_id).await
    }

    /// 标记单条或全部为已读，返回新的未读数
    pub async fn mark_read(&self, recipient_id: &str, target: ReadTarget) -> Result<UnreadCount> {
        match target {
            ReadTarget::One(id) => {
                self.store
                    .mark_read(recipient_id, &id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Notification"))?;
            }
            ReadTarget::All => {
                let updated = self.store.mark_all_read(recipient_id).await?;
                debug!("Marked {} notifications as read for {}", updated, recipient_id);
            }
        }

        Ok(UnreadCount {
            unread_count: self.unread_count(recipient_id).await?,
        })
    }

    /// 删除接收者的全部通知
    pub async fn clear_all(&self, recipient_id: &str) -> Result<u64> {
        let removed = self.store.delete_all_notifications(recipient_id).await?;
        info!("Cleared {} notifications for user {}", removed, recipient_id);
        Ok(removed)
    }

    pub async fn delete_one(&self, recipient_id: &str, notification_id: &str) -> Result<UnreadCount> {
        if !self.store.delete_notification(recipient_id, notification_id).await? {
            return Err(AppError::not_found("Notification"));
        }

        Ok(UnreadCount {
            unread_count: self.unread_count(recipient_id).await?,
        })
    }

    /// 点击通知：标记已读并返回跳转地址
    pub async fn open(&self, recipient_id: &str, notification_id: &str) -> Result<NotificationOpened> {
        let notification = self
            .store
            .mark_read(recipient_id, notification_id)
            .await?
            .ok_or_else(|| AppError::not_found("Notification"))?;

        Ok(NotificationOpened {
            redirect_url: format!("/project/{}", notification.project_id),
            unread_count: self.unread_count(recipient_id).await?,
        })
    }

    pub async fn purge_for_project(&self, project_id: &str) -> Result<u64> {
        let removed = self.store.purge_notifications_for_project(project_id).await?;
        debug!("Purged {} notifications for project {}", removed, project_id);
        Ok(removed)
    }

    pub async fn purge_for_user(&self, user_id: &str) -> Result<u64> {
        let removed = self.store.purge_notifications_for_user(user_id).await?;
        debug!("Purged {} notifications for user {}", removed, user_id);
        Ok(removed)
    }

    /// 解析发送者与项目名称
    async fn resolve_views(&self, notifications: Vec<Notification>) -> Result<Vec<NotificationView>> {
        let sender_ids: Vec<String> = notifications
            .iter()
            .map(|n| n.sender_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let project_ids: Vec<String> = notifications
            .iter()
            .map(|n| n.project_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let (senders, projects) = tokio::try_join!(
            self.store.get_users(&sender_ids),
            self.store.get_projects(&project_ids),
        )?;

        Ok(notifications
            .into_iter()
            .map(|n| to_view(n, &senders, &projects))
            .collect())
    }
}

fn to_view(
    notification: Notification,
    senders: &HashMap<String, UserProfile>,
    projects: &HashMap<String, Project>,
) -> NotificationView {
    let sender_name = senders
        .get(&notification.sender_id)
        .map(|u| u.full_name.clone())
        .unwrap_or_else(|| UNKNOWN_USER.to_string());
    let project_name = projects
        .get(&notification.project_id)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| UNKNOWN_PROJECT.to_string());

    NotificationView {
        id: notification.id,
        sender_id: notification.sender_id,
        sender_name,
        project_id: notification.project_id,
        project_name,
        notification_type: notification.notification_type,
        message: notification.message,
        is_read: notification.is_read,
        created_at: notification.created_at,
    }
}
