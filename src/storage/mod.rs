//! 持久化协作方接口
//!
//! 核心服务只依赖这里的 trait：SurrealDB 实现用于部署，内存实现用于开发与测试。

#[cfg(test)]
pub(crate) mod failing;
pub mod memory;
pub mod surreal;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::{
    error::Result,
    models::{
        engagement::{Comment, CommentTally, Like, Reply, View},
        notification::Notification,
        project::Project,
        user::UserProfile,
    },
};

pub use memory::MemoryStore;
pub use surreal::SurrealStore;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn insert_user(&self, user: UserProfile) -> Result<UserProfile>;

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>>;

    /// 批量查询，缺失的ID不会出现在结果中
    async fn get_users(&self, user_ids: &[String]) -> Result<HashMap<String, UserProfile>>;

    async fn delete_user(&self, user_id: &str) -> Result<bool>;
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn insert_project(&self, project: Project) -> Result<Project>;

    async fn get_project(&self, project_id: &str) -> Result<Option<Project>>;

    async fn list_projects(&self) -> Result<Vec<Project>>;

    /// 作者的全部项目，最新在前
    async fn list_projects_by_owner(&self, owner_id: &str) -> Result<Vec<Project>>;

    /// 批量查询，缺失的ID不会出现在结果中
    async fn get_projects(&self, project_ids: &[String]) -> Result<HashMap<String, Project>>;

    async fn delete_project(&self, project_id: &str) -> Result<bool>;
}

#[async_trait]
pub trait EngagementRepository: Send + Sync {
    /// 唯一约束插入；已存在时返回 `Ok(false)` 而不是错误
    async fn insert_like(&self, like: Like) -> Result<bool>;

    async fn delete_like(&self, actor_id: &str, project_id: &str) -> Result<bool>;

    async fn has_liked(&self, actor_id: &str, project_id: &str) -> Result<bool>;

    /// 用户的点赞记录，最新在前
    async fn likes_by_actor(&self, actor_id: &str, limit: usize) -> Result<Vec<Like>>;

    /// 唯一约束插入；已存在时返回 `Ok(false)` 而不是错误
    async fn insert_view(&self, view: View) -> Result<bool>;

    async fn has_viewed(&self, actor_id: &str, project_id: &str) -> Result<bool>;

    /// 按项目分组统计点赞数（单次批量查询）
    async fn count_likes(&self, project_ids: &[String]) -> Result<HashMap<String, u64>>;

    /// 按项目分组统计浏览数（单次批量查询）
    async fn count_views(&self, project_ids: &[String]) -> Result<HashMap<String, u64>>;

    /// 按项目分组统计顶层评论数与回复数（单次批量查询）
    async fn count_comments(&self, project_ids: &[String]) -> Result<HashMap<String, CommentTally>>;

    async fn insert_comment(&self, comment: Comment) -> Result<Comment>;

    async fn get_comment(&self, comment_id: &str) -> Result<Option<Comment>>;

    /// 项目下全部评论，最新在前
    async fn list_comments(&self, project_id: &str) -> Result<Vec<Comment>>;

    async fn delete_comment(&self, comment_id: &str) -> Result<bool>;

    /// 原子追加回复；评论不存在时返回 `None`
    async fn append_reply(&self, comment_id: &str, reply: Reply) -> Result<Option<Comment>>;

    async fn remove_reply(&self, comment_id: &str, reply_id: &str) -> Result<bool>;

    /// 删除项目关联的全部点赞、浏览与评论
    async fn purge_project_engagement(&self, project_id: &str) -> Result<()>;

    /// 删除用户本人发出的全部点赞、浏览与顶层评论
    async fn purge_actor_engagement(&self, actor_id: &str) -> Result<()>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert_notification(&self, notification: Notification) -> Result<Notification>;

    /// 最新在前
    async fn list_notifications(&self, recipient_id: &str, limit: usize) -> Result<Vec<Notification>>;

    /// 只在通知属于该接收者时才返回并标记为已读
    async fn mark_read(&self, recipient_id: &str, notification_id: &str) -> Result<Option<Notification>>;

    async fn mark_all_read(&self, recipient_id: &str) -> Result<u64>;

    async fn delete_notification(&self, recipient_id: &str, notification_id: &str) -> Result<bool>;

    async fn delete_all_notifications(&self, recipient_id: &str) -> Result<u64>;

    async fn count_unread(&self, recipient_id: &str) -> Result<u64>;

    async fn purge_notifications_for_project(&self, project_id: &str) -> Result<u64>;

    /// 删除用户作为接收者或发送者的全部通知
    async fn purge_notifications_for_user(&self, user_id: &str) -> Result<u64>;
}

/// 服务层持有的完整持久化接口
pub trait Store: UserDirectory + ProjectRepository + EngagementRepository + NotificationRepository {}

impl<T> Store for T where T: UserDirectory + ProjectRepository + EngagementRepository + NotificationRepository {}
