use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    error::Result,
    models::{
        engagement::{Comment, CommentTally, Like, Reply, View},
        notification::Notification,
        project::Project,
        user::UserProfile,
    },
    services::database::Database,
    storage::{EngagementRepository, NotificationRepository, ProjectRepository, UserDirectory},
};

const SCHEMA: &str = r#"
DEFINE INDEX like_actor_project ON TABLE project_like COLUMNS actor_id, project_id UNIQUE;
DEFINE INDEX view_actor_project ON TABLE project_view COLUMNS actor_id, project_id UNIQUE;
DEFINE INDEX comment_project ON TABLE comment COLUMNS project_id;
DEFINE INDEX notification_recipient_created ON TABLE notification COLUMNS recipient_id, created_at;
DEFINE INDEX notification_recipient_read ON TABLE notification COLUMNS recipient_id, is_read;
"#;

/// SurrealDB 存储实现
#[derive(Clone)]
pub struct SurrealStore {
    db: Arc<Database>,
}

#[derive(Debug, Deserialize)]
struct GroupCount {
    project_id: String,
    total: u64,
}

#[derive(Debug, Deserialize)]
struct CommentGroup {
    project_id: String,
    top_level: u64,
    #[serde(default)]
    replies: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Total {
    total: u64,
}

impl SurrealStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// 定义唯一索引；重复执行是安全的
    pub async fn ensure_schema(&self) -> Result<()> {
        self.db.query(SCHEMA).await?.check()?;
        info!("Storage schema ensured");
        Ok(())
    }

    async fn create_record<T: Serialize>(&self, table: &str, id: &str, record: &T) -> Result<()> {
        let content = content_without_id(record)?;
        self.db
            .query_with_params(
                "CREATE type::thing($table, $id) CONTENT $content RETURN NONE",
                json!({ "table": table, "id": id, "content": content }),
            )
            .await?
            .check()?;
        Ok(())
    }

    async fn select_by_id<T: DeserializeOwned>(&self, table: &str, id: &str) -> Result<Option<T>> {
        let mut response = self
            .db
            .query_with_params(
                "SELECT *, meta::id(id) AS id FROM type::thing($table, $id)",
                json!({ "table": table, "id": id }),
            )
            .await?;
        let rows: Vec<T> = response.take(0)?;
        Ok(rows.into_iter().next())
    }

    async fn delete_by_id(&self, table: &str, id: &str) -> Result<bool> {
        let mut response = self
            .db
            .query_with_params(
                "DELETE type::thing($table, $id) RETURN BEFORE",
                json!({ "table": table, "id": id }),
            )
            .await?;
        let removed: Vec<serde_json::Value> = response.take(0)?;
        Ok(!removed.is_empty())
    }

    /// 唯一索引冲突视为已存在
    async fn insert_unique<T: Serialize>(&self, table: &str, record: &T) -> Result<bool> {
        let response = self
            .db
            .query_with_params(
                "CREATE type::table($table) CONTENT $content RETURN NONE",
                json!({ "table": table, "content": record }),
            )
            .await?;
        match response.check() {
            Ok(_) => Ok(true),
            Err(e) if is_unique_violation(&e) => {
                debug!("Duplicate {} row ignored", table);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn pair_exists(&self, table: &str, actor_id: &str, project_id: &str) -> Result<bool> {
        let mut response = self
            .db
            .query_with_params(
                "SELECT count() AS total FROM type::table($table) \
                 WHERE actor_id = $actor_id AND project_id = $project_id GROUP ALL",
                json!({ "table": table, "actor_id": actor_id, "project_id": project_id }),
            )
            .await?;
        let rows: Vec<Total> = response.take(0)?;
        Ok(rows.first().map(|r| r.total > 0).unwrap_or(false))
    }

    async fn grouped_counts(&self, table: &str, project_ids: &[String]) -> Result<HashMap<String, u64>> {
        if project_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut response = self
            .db
            .query_with_params(
                "SELECT project_id, count() AS total FROM type::table($table) \
                 WHERE project_id IN $ids GROUP BY project_id",
                json!({ "table": table, "ids": project_ids }),
            )
            .await?;
        let rows: Vec<GroupCount> = response.take(0)?;
        Ok(rows.into_iter().map(|r| (r.project_id, r.total)).collect())
    }

    async fn removed_rows(&self, sql: &str, params: serde_json::Value) -> Result<u64> {
        let mut response = self.db.query_with_params(sql, params).await?;
        let removed: Vec<serde_json::Value> = response.take(0)?;
        Ok(removed.len() as u64)
    }
}

fn content_without_id<T: Serialize>(record: &T) -> Result<serde_json::Value> {
    let mut value = serde_json::to_value(record)?;
    if let Some(map) = value.as_object_mut() {
        map.remove("id");
    }
    Ok(value)
}

fn is_unique_violation(err: &surrealdb::Error) -> bool {
    is_unique_violation_message(&err.to_string())
}

/// SurrealDB 唯一索引冲突的报错形如 "Database index `x` already contains ..."
fn is_unique_violation_message(message: &str) -> bool {
    message.contains("already contains")
}

/// 分组行中没有回复字段（或为 NULL）时回复数记为 0
fn comment_tally(group: CommentGroup) -> (String, CommentTally) {
    (
        group.project_id,
        CommentTally {
            top_level: group.top_level,
            replies: group.replies.unwrap_or(0),
        },
    )
}

#[async_trait]
impl UserDirectory for SurrealStore {
    async fn insert_user(&self, user: UserProfile) -> Result<UserProfile> {
        self.create_record("user_profile", &user.id, &user).await?;
        Ok(user)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>> {
        self.select_by_id("user_profile", user_id).await
    }

    async fn get_users(&self, user_ids: &[String]) -> Result<HashMap<String, UserProfile>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut response = self
            .db
            .query_with_params(
                "SELECT *, meta::id(id) AS id FROM user_profile WHERE meta::id(id) IN $ids",
                json!({ "ids": user_ids }),
            )
            .await?;
        let users: Vec<UserProfile> = response.take(0)?;
        Ok(users.into_iter().map(|u| (u.id.clone(), u)).collect())
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool> {
        self.delete_by_id("user_profile", user_id).await
    }
}

#[async_trait]
impl ProjectRepository for SurrealStore {
    async fn insert_project(&self, project: Project) -> Result<Project> {
        self.create_record("project", &project.id, &project).await?;
        Ok(project)
    }

    async fn get_project(&self, project_id: &str) -> Result<Option<Project>> {
        self.select_by_id("project", project_id).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let mut response = self
            .db
            .query("SELECT *, meta::id(id) AS id FROM project ORDER BY created_at DESC")
            .await?;
        Ok(response.take(0)?)
    }

    async fn list_projects_by_owner(&self, owner_id: &str) -> Result<Vec<Project>> {
        let mut response = self
            .db
            .query_with_params(
                "SELECT *, meta::id(id) AS id FROM project WHERE owner_id = $owner_id ORDER BY created_at DESC",
                json!({ "owner_id": owner_id }),
            )
            .await?;
        Ok(response.take(0)?)
    }

    async fn get_projects(&self, project_ids: &[String]) -> Result<HashMap<String, Project>> {
        if project_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut response = self
            .db
            .query_with_params(
                "SELECT *, meta::id(id) AS id FROM project WHERE meta::id(id) IN $ids",
                json!({ "ids": project_ids }),
            )
            .await?;
        let projects: Vec<Project> = response.take(0)?;
        Ok(projects.into_iter().map(|p| (p.id.clone(), p)).collect())
    }

    async fn delete_project(&self, project_id: &str) -> Result<bool> {
        self.delete_by_id("project", project_id).await
    }
}

#[async_trait]
impl EngagementRepository for SurrealStore {
    async fn insert_like(&self, like: Like) -> Result<bool> {
        self.insert_unique("project_like", &like).await
    }

    async fn delete_like(&self, actor_id: &str, project_id: &str) -> Result<bool> {
        let removed = self
            .removed_rows(
                "DELETE project_like WHERE actor_id = $actor_id AND project_id = $project_id RETURN BEFORE",
                json!({ "actor_id": actor_id, "project_id": project_id }),
            )
            .await?;
        Ok(removed > 0)
    }

    async fn has_liked(&self, actor_id: &str, project_id: &str) -> Result<bool> {
        self.pair_exists("project_like", actor_id, project_id).await
    }

    async fn likes_by_actor(&self, actor_id: &str, limit: usize) -> Result<Vec<Like>> {
        let mut response = self
            .db
            .query_with_params(
                "SELECT actor_id, project_id, created_at FROM project_like \
                 WHERE actor_id = $actor_id ORDER BY created_at DESC LIMIT $limit",
                json!({ "actor_id": actor_id, "limit": limit }),
            )
            .await?;
        Ok(response.take(0)?)
    }

    async fn insert_view(&self, view: View) -> Result<bool> {
        self.insert_unique("project_view", &view).await
    }

    async fn has_viewed(&self, actor_id: &str, project_id: &str) -> Result<bool> {
        self.pair_exists("project_view", actor_id, project_id).await
    }

    async fn count_likes(&self, project_ids: &[String]) -> Result<HashMap<String, u64>> {
        self.grouped_counts("project_like", project_ids).await
    }

    async fn count_views(&self, project_ids: &[String]) -> Result<HashMap<String, u64>> {
        self.grouped_counts("project_view", project_ids).await
    }

    async fn count_comments(&self, project_ids: &[String]) -> Result<HashMap<String, CommentTally>> {
        if project_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut response = self
            .db
            .query_with_params(
                "SELECT project_id, count() AS top_level, math::sum(array::len(replies)) AS replies \
                 FROM comment WHERE project_id IN $ids GROUP BY project_id",
                json!({ "ids": project_ids }),
            )
            .await?;
        let rows: Vec<CommentGroup> = response.take(0)?;
        Ok(rows.into_iter().map(comment_tally).collect())
    }

    async fn insert_comment(&self, comment: Comment) -> Result<Comment> {
        self.create_record("comment", &comment.id, &comment).await?;
        Ok(comment)
    }

    async fn get_comment(&self, comment_id: &str) -> Result<Option<Comment>> {
        self.select_by_id("comment", comment_id).await
    }

    async fn list_comments(&self, project_id: &str) -> Result<Vec<Comment>> {
        let mut response = self
            .db
            .query_with_params(
                "SELECT *, meta::id(id) AS id FROM comment WHERE project_id = $project_id ORDER BY created_at DESC",
                json!({ "project_id": project_id }),
            )
            .await?;
        Ok(response.take(0)?)
    }

    async fn delete_comment(&self, comment_id: &str) -> Result<bool> {
        self.delete_by_id("comment", comment_id).await
    }

    async fn append_reply(&self, comment_id: &str, reply: Reply) -> Result<Option<Comment>> {
        // 单条语句内完成追加，并发回复不会互相覆盖
        let mut response = self
            .db
            .query_with_params(
                "UPDATE comment SET replies += $reply WHERE meta::id(id) = $id RETURN NONE; \
                 SELECT *, meta::id(id) AS id FROM comment WHERE meta::id(id) = $id;",
                json!({ "id": comment_id, "reply": reply }),
            )
            .await?;
        let rows: Vec<Comment> = response.take(1)?;
        Ok(rows.into_iter().next())
    }

    async fn remove_reply(&self, comment_id: &str, reply_id: &str) -> Result<bool> {
        let existed = match self.get_comment(comment_id).await? {
            Some(comment) => comment.find_reply(reply_id).is_some(),
            None => false,
        };
        if !existed {
            return Ok(false);
        }
        self.db
            .query_with_params(
                "UPDATE comment SET replies = replies[WHERE id != $reply_id] WHERE meta::id(id) = $id RETURN NONE",
                json!({ "id": comment_id, "reply_id": reply_id }),
            )
            .await?
            .check()?;
        Ok(true)
    }

    async fn purge_project_engagement(&self, project_id: &str) -> Result<()> {
        self.db
            .query_with_params(
                "DELETE project_like WHERE project_id = $project_id; \
                 DELETE project_view WHERE project_id = $project_id; \
                 DELETE comment WHERE project_id = $project_id;",
                json!({ "project_id": project_id }),
            )
            .await?
            .check()?;
        debug!("Purged engagement for project: {}", project_id);
        Ok(())
    }

    async fn purge_actor_engagement(&self, actor_id: &str) -> Result<()> {
        self.db
            .query_with_params(
                "DELETE project_like WHERE actor_id = $actor_id; \
                 DELETE project_view WHERE actor_id = $actor_id; \
                 DELETE comment WHERE actor_id = $actor_id;",
                json!({ "actor_id": actor_id }),
            )
            .await?
            .check()?;
        debug!("Purged engagement by actor: {}", actor_id);
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for SurrealStore {
    async fn insert_notification(&self, notification: Notification) -> Result<Notification> {
        self.create_record("notification", &notification.id, &notification)
            .await?;
        Ok(notification)
    }

    async fn list_notifications(&self, recipient_id: &str, limit: usize) -> Result<Vec<Notification>> {
        let mut response = self
            .db
            .query_with_params(
                "SELECT *, meta::id(id) AS id FROM notification WHERE recipient_id = $recipient_id \
                 ORDER BY created_at DESC LIMIT $limit",
                json!({ "recipient_id": recipient_id, "limit": limit }),
            )
            .await?;
        Ok(response.take(0)?)
    }

    async fn mark_read(&self, recipient_id: &str, notification_id: &str) -> Result<Option<Notification>> {
        let mut response = self
            .db
            .query_with_params(
                "UPDATE notification SET is_read = true \
                 WHERE meta::id(id) = $id AND recipient_id = $recipient_id RETURN NONE; \
                 SELECT *, meta::id(id) AS id FROM notification \
                 WHERE meta::id(id) = $id AND recipient_id = $recipient_id;",
                json!({ "id": notification_id, "recipient_id": recipient_id }),
            )
            .await?;
        let rows: Vec<Notification> = response.take(1)?;
        Ok(rows.into_iter().next())
    }

    async fn mark_all_read(&self, recipient_id: &str) -> Result<u64> {
        self.removed_rows(
            "UPDATE notification SET is_read = true \
             WHERE recipient_id = $recipient_id AND is_read = false RETURN BEFORE",
            json!({ "recipient_id": recipient_id }),
        )
        .await
    }

    async fn delete_notification(&self, recipient_id: &str, notification_id: &str) -> Result<bool> {
        let removed = self
            .removed_rows(
                "DELETE notification WHERE meta::id(id) = $id AND recipient_id = $recipient_id RETURN BEFORE",
                json!({ "id": notification_id, "recipient_id": recipient_id }),
            )
            .await?;
        Ok(removed > 0)
    }

    async fn delete_all_notifications(&self, recipient_id: &str) -> Result<u64> {
        self.removed_rows(
            "DELETE notification WHERE recipient_id = $recipient_id RETURN BEFORE",
            json!({ "recipient_id": recipient_id }),
        )
        .await
    }

    async fn count_unread(&self, recipient_id: &str) -> Result<u64> {
        let mut response = self
            .db
            .query_with_params(
                "SELECT count() AS total FROM notification \
                 WHERE recipient_id = $recipient_id AND is_read = false GROUP ALL",
                json!({ "recipient_id": recipient_id }),
            )
            .await?;
        let rows: Vec<Total> = response.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn purge_notifications_for_project(&self, project_id: &str) -> Result<u64> {
        self.removed_rows(
            "DELETE notification WHERE project_id = $project_id RETURN BEFORE",
            json!({ "project_id": project_id }),
        )
        .await
    }

    async fn purge_notifications_for_user(&self, user_id: &str) -> Result<u64> {
        self.removed_rows(
            "DELETE notification WHERE recipient_id = $user_id OR sender_id = $user_id RETURN BEFORE",
            json!({ "user_id": user_id }),
        )
        .await
    }
}
