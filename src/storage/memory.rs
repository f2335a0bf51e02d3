use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::{
    error::Result,
    models::{
        engagement::{Comment, CommentTally, Like, Reply, View},
        notification::Notification,
        project::Project,
        user::UserProfile,
    },
    storage::{EngagementRepository, NotificationRepository, ProjectRepository, UserDirectory},
};

type PairKey = (String, String);

/// 进程内存储，用于开发环境与测试
///
/// 点赞/浏览的唯一性由 `DashMap` 的 entry API 保证，回复追加在分片写锁内完成。
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: DashMap<String, UserProfile>,
    projects: DashMap<String, Project>,
    likes: DashMap<PairKey, Like>,
    views: DashMap<PairKey, View>,
    comments: DashMap<String, Comment>,
    notifications: DashMap<String, Notification>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn like_rows(&self) -> usize {
        self.likes.len()
    }

    pub fn view_rows(&self) -> usize {
        self.views.len()
    }

    pub fn notification_rows(&self) -> usize {
        self.notifications.len()
    }

    pub fn comment_rows(&self) -> usize {
        self.comments.len()
    }

    /// 删除满足条件的通知，返回本次实际删除的数量
    ///
    /// 计数在 `retain` 内完成，并发写入的新通知不会影响结果。
    fn remove_notifications_where<F>(&self, matches: F) -> u64
    where
        F: Fn(&Notification) -> bool,
    {
        let mut removed = 0;
        self.notifications.retain(|_, n| {
            let doomed = matches(&*n);
            if doomed {
                removed += 1;
            }
            !doomed
        });
        removed
    }
}

fn pair(actor_id: &str, project_id: &str) -> PairKey {
    (actor_id.to_string(), project_id.to_string())
}

fn id_set(ids: &[String]) -> HashSet<&str> {
    ids.iter().map(String::as_str).collect()
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn insert_user(&self, user: UserProfile) -> Result<UserProfile> {
        self.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.users.get(user_id).map(|u| u.value().clone()))
    }

    async fn get_users(&self, user_ids: &[String]) -> Result<HashMap<String, UserProfile>> {
        Ok(user_ids
            .iter()
            .filter_map(|id| self.users.get(id).map(|u| (id.clone(), u.value().clone())))
            .collect())
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool> {
        Ok(self.users.remove(user_id).is_some())
    }
}

#[async_trait]
impl ProjectRepository for MemoryStore {
    async fn insert_project(&self, project: Project) -> Result<Project> {
        self.projects.insert(project.id.clone(), project.clone());
        Ok(project)
    }

    async fn get_project(&self, project_id: &str) -> Result<Option<Project>> {
        Ok(self.projects.get(project_id).map(|p| p.value().clone()))
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(self.projects.iter().map(|p| p.value().clone()).collect())
    }

    async fn list_projects_by_owner(&self, owner_id: &str) -> Result<Vec<Project>> {
        let mut projects: Vec<Project> = self
            .projects
            .iter()
            .filter(|p| p.owner_id == owner_id)
            .map(|p| p.value().clone())
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn get_projects(&self, project_ids: &[String]) -> Result<HashMap<String, Project>> {
        Ok(project_ids
            .iter()
            .filter_map(|id| self.projects.get(id).map(|p| (id.clone(), p.value().clone())))
            .collect())
    }

    async fn delete_project(&self, project_id: &str) -> Result<bool> {
        Ok(self.projects.remove(project_id).is_some())
    }
}

#[async_trait]
impl EngagementRepository for MemoryStore {
    async fn insert_like(&self, like: Like) -> Result<bool> {
        match self.likes.entry(pair(&like.actor_id, &like.project_id)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(like);
                Ok(true)
            }
        }
    }

    async fn delete_like(&self, actor_id: &str, project_id: &str) -> Result<bool> {
        Ok(self.likes.remove(&pair(actor_id, project_id)).is_some())
    }

    async fn has_liked(&self, actor_id: &str, project_id: &str) -> Result<bool> {
        Ok(self.likes.contains_key(&pair(actor_id, project_id)))
    }

    async fn likes_by_actor(&self, actor_id: &str, limit: usize) -> Result<Vec<Like>> {
        let mut likes: Vec<Like> = self
            .likes
            .iter()
            .filter(|l| l.actor_id == actor_id)
            .map(|l| l.value().clone())
            .collect();
        likes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        likes.truncate(limit);
        Ok(likes)
    }

    async fn insert_view(&self, view: View) -> Result<bool> {
        match self.views.entry(pair(&view.actor_id, &view.project_id)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(view);
                Ok(true)
            }
        }
    }

    async fn has_viewed(&self, actor_id: &str, project_id: &str) -> Result<bool> {
        Ok(self.views.contains_key(&pair(actor_id, project_id)))
    }

    async fn count_likes(&self, project_ids: &[String]) -> Result<HashMap<String, u64>> {
        let wanted = id_set(project_ids);
        let mut counts = HashMap::new();
        for entry in self.likes.iter() {
            let project_id = &entry.key().1;
            if wanted.contains(project_id.as_str()) {
                *counts.entry(project_id.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn count_views(&self, project_ids: &[String]) -> Result<HashMap<String, u64>> {
        let wanted = id_set(project_ids);
        let mut counts = HashMap::new();
        for entry in self.views.iter() {
            let project_id = &entry.key().1;
            if wanted.contains(project_id.as_str()) {
                *counts.entry(project_id.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn count_comments(&self, project_ids: &[String]) -> Result<HashMap<String, CommentTally>> {
        let wanted = id_set(project_ids);
        let mut tallies: HashMap<String, CommentTally> = HashMap::new();
        for entry in self.comments.iter() {
            let comment = entry.value();
            if wanted.contains(comment.project_id.as_str()) {
                let tally = tallies.entry(comment.project_id.clone()).or_default();
                tally.top_level += 1;
                tally.replies += comment.replies.len() as u64;
            }
        }
        Ok(tallies)
    }

    async fn insert_comment(&self, comment: Comment) -> Result<Comment> {
        self.comments.insert(comment.id.clone(), comment.clone());
        Ok(comment)
    }

    async fn get_comment(&self, comment_id: &str) -> Result<Option<Comment>> {
        Ok(self.comments.get(comment_id).map(|c| c.value().clone()))
    }

    async fn list_comments(&self, project_id: &str) -> Result<Vec<Comment>> {
        let mut comments: Vec<Comment> = self
            .comments
            .iter()
            .filter(|c| c.project_id == project_id)
            .map(|c| c.value().clone())
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(comments)
    }

    async fn delete_comment(&self, comment_id: &str) -> Result<bool> {
        Ok(self.comments.remove(comment_id).is_some())
    }

    async fn append_reply(&self, comment_id: &str, reply: Reply) -> Result<Option<Comment>> {
        match self.comments.get_mut(comment_id) {
            Some(mut comment) => {
                comment.replies.push(reply);
                Ok(Some(comment.value().clone()))
            }
            None => Ok(None),
        }
    }

    async fn remove_reply(&self, comment_id: &str, reply_id: &str) -> Result<bool> {
        match self.comments.get_mut(comment_id) {
            Some(mut comment) => {
                let before = comment.replies.len();
                comment.replies.retain(|r| r.id != reply_id);
                Ok(comment.replies.len() != before)
            }
            None => Ok(false),
        }
    }

    async fn purge_project_engagement(&self, project_id: &str) -> Result<()> {
        self.likes.retain(|key, _| key.1 != project_id);
        self.views.retain(|key, _| key.1 != project_id);
        self.comments.retain(|_, c| c.project_id != project_id);
        debug!("Purged engagement for project: {}", project_id);
        Ok(())
    }

    async fn purge_actor_engagement(&self, actor_id: &str) -> Result<()> {
        self.likes.retain(|key, _| key.0 != actor_id);
        self.views.retain(|key, _| key.0 != actor_id);
        self.comments.retain(|_, c| c.actor_id != actor_id);
        debug!("Purged engagement by actor: {}", actor_id);
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert_notification(&self, notification: Notification) -> Result<Notification> {
        self.notifications.insert(notification.id.clone(), notification.clone());
        Ok(notification)
    }

    async fn list_notifications(&self, recipient_id: &str, limit: usize) -> Result<Vec<Notification>> {
        let mut items: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .map(|n| n.value().clone())
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        items.truncate(limit);
        Ok(items)
    }

    async fn mark_read(&self, recipient_id: &str, notification_id: &str) -> Result<Option<Notification>> {
        match self.notifications.get_mut(notification_id) {
            Some(mut n) if n.recipient_id == recipient_id => {
                n.is_read = true;
                Ok(Some(n.value().clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_all_read(&self, recipient_id: &str) -> Result<u64> {
        let mut updated = 0;
        for mut n in self.notifications.iter_mut() {
            if n.recipient_id == recipient_id && !n.is_read {
                n.is_read = true;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn delete_notification(&self, recipient_id: &str, notification_id: &str) -> Result<bool> {
        Ok(self
            .notifications
            .remove_if(notification_id, |_, n| n.recipient_id == recipient_id)
            .is_some())
    }

    async fn delete_all_notifications(&self, recipient_id: &str) -> Result<u64> {
        Ok(self.remove_notifications_where(|n| n.recipient_id == recipient_id))
    }

    async fn count_unread(&self, recipient_id: &str) -> Result<u64> {
        Ok(self
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient_id && !n.is_read)
            .count() as u64)
    }

    async fn purge_notifications_for_project(&self, project_id: &str) -> Result<u64> {
        Ok(self.remove_notifications_where(|n| n.project_id == project_id))
    }

    async fn purge_notifications_for_user(&self, user_id: &str) -> Result<u64> {
        Ok(self.remove_notifications_where(|n| n.recipient_id == user_id || n.sender_id == user_id))
    }
}
