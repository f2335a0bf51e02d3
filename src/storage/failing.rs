//! 测试用存储：按开关注入故障，其余操作委托给内存存储

use async_trait::async_trait;
use std::collections::HashMap;

use crate::{
    error::{AppError, Result},
    models::{
        engagement::{Comment, CommentTally, Like, Reply, View},
        notification::Notification,
        project::Project,
        user::UserProfile,
    },
    storage::{EngagementRepository, MemoryStore, NotificationRepository, ProjectRepository, UserDirectory},
};

#[derive(Debug, Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    /// 通知写入总是失败
    pub fail_notification_writes: bool,
    /// `has_liked` 总是返回 `false`，模拟并发点赞时读到的旧状态
    pub stale_like_reads: bool,
}

impl FaultyStore {
    pub fn failing_notifications() -> Self {
        Self {
            fail_notification_writes: true,
            ..Default::default()
        }
    }

    pub fn stale_like_reads() -> Self {
        Self {
            stale_like_reads: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl UserDirectory for FaultyStore {
    async fn insert_user(&self, user: UserProfile) -> Result<UserProfile> {
        self.inner.insert_user(user).await
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        self.inner.get_user(user_id).await
    }

    async fn get_users(&self, user_ids: &[String]) -> Result<HashMap<String, UserProfile>> {
        self.inner.get_users(user_ids).await
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool> {
        self.inner.delete_user(user_id).await
    }
}

#[async_trait]
impl ProjectRepository for FaultyStore {
    async fn insert_project(&self, project: Project) -> Result<Project> {
        self.inner.insert_project(project).await
    }

    async fn get_project(&self, project_id: &str) -> Result<Option<Project>> {
        self.inner.get_project(project_id).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.inner.list_projects().await
    }

    async fn list_projects_by_owner(&self, owner_id: &str) -> Result<Vec<Project>> {
        self.inner.list_projects_by_owner(owner_id).await
    }

    async fn get_projects(&self, project_ids: &[String]) -> Result<HashMap<String, Project>> {
        self.inner.get_projects(project_ids).await
    }

    async fn delete_project(&self, project_id: &str) -> Result<bool> {
        self.inner.delete_project(project_id).await
    }
}

#[async_trait]
impl EngagementRepository for FaultyStore {
    async fn insert_like(&self, like: Like) -> Result<bool> {
        self.inner.insert_like(like).await
    }

    async fn delete_like(&self, actor_id: &str, project_id: &str) -> Result<bool> {
        self.inner.delete_like(actor_id, project_id).await
    }

    async fn has_liked(&self, actor_id: &str, project_id: &str) -> Result<bool> {
        if self.stale_like_reads {
            return Ok(false);
        }
        self.inner.has_liked(actor_id, project_id).await
    }

    async fn likes_by_actor(&self, actor_id: &str, limit: usize) -> Result<Vec<Like>> {
        self.inner.likes_by_actor(actor_id, limit).await
    }

    async fn insert_view(&self, view: View) -> Result<bool> {
        self.inner.insert_view(view).await
    }

    async fn has_viewed(&self, actor_id: &str, project_id: &str) -> Result<bool> {
        self.inner.has_viewed(actor_id, project_id).await
    }

    async fn count_likes(&self, project_ids: &[String]) -> Result<HashMap<String, u64>> {
        self.inner.count_likes(project_ids).await
    }

    async fn count_views(&self, project_ids: &[String]) -> Result<HashMap<String, u64>> {
        self.inner.count_views(project_ids).await
    }

    async fn count_comments(&self, project_ids: &[String]) -> Result<HashMap<String, CommentTally>> {
        self.inner.count_comments(project_ids).await
    }

    async fn insert_comment(&self, comment: Comment) -> Result<Comment> {
        self.inner.insert_comment(comment).await
    }

    async fn get_comment(&self, comment_id: &str) -> Result<Option<Comment>> {
        self.inner.get_comment(comment_id).await
    }

    async fn list_comments(&self, project_id: &str) -> Result<Vec<Comment>> {
        self.inner.list_comments(project_id).await
    }

    async fn delete_comment(&self, comment_id: &str) -> Result<bool> {
        self.inner.delete_comment(comment_id).await
    }

    async fn append_reply(&self, comment_id: &str, reply: Reply) -> Result<Option<Comment>> {
        self.inner.append_reply(comment_id, reply).await
    }

    async fn remove_reply(&self, comment_id: &str, reply_id: &str) -> Result<bool> {
        self.inner.remove_reply(comment_id, reply_id).await
    }

    async fn purge_project_engagement(&self, project_id: &str) -> Result<()> {
        self.inner.purge_project_engagement(project_id).await
    }

    async fn purge_actor_engagement(&self, actor_id: &str) -> Result<()> {
        self.inner.purge_actor_engagement(actor_id).await
    }
}

#[async_trait]
impl NotificationRepository for FaultyStore {
    async fn insert_notification(&self, notification: Notification) -> Result<Notification> {
        if self.fail_notification_writes {
            return Err(AppError::ServiceUnavailable("notification table unavailable".to_string()));
        }
        self.inner.insert_notification(notification).await
    }

    async fn list_notifications(&self, recipient_id: &str, limit: usize) -> Result<Vec<Notification>> {
        self.inner.list_notifications(recipient_id, limit).await
    }

    async fn mark_read(&self, recipient_id: &str, notification_id: &str) -> Result<Option<Notification>> {
        self.inner.mark_read(recipient_id, notification_id).await
    }

    async fn mark_all_read(&self, recipient_id: &str) -> Result<u64> {
        self.inner.mark_all_read(recipient_id).await
    }

    async fn delete_notification(&self, recipient_id: &str, notification_id: &str) -> Result<bool> {
        self.inner.delete_notification(recipient_id, notification_id).await
    }

    async fn delete_all_notifications(&self, recipient_id: &str) -> Result<u64> {
        self.inner.delete_all_notifications(recipient_id).await
    }

    async fn count_unread(&self, recipient_id: &str) -> Result<u64> {
        self.inner.count_unread(recipient_id).await
    }

    async fn purge_notifications_for_project(&self, project_id: &str) -> Result<u64> {
        self.inner.purge_notifications_for_project(project_id).await
    }

    async fn purge_notifications_for_user(&self, user_id: &str) -> Result<u64> {
        self.inner.purge_notifications_for_user(user_id).await
    }
}
