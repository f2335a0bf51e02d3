use crate::{
    config::Config,
    error::{AppError, Result},
    models::{
        engagement::*,
        notification::{NewNotification, NotificationType},
        project::Project,
        user::UserProfile,
    },
    services::notification::{compose_message, NotificationService},
    storage::Store,
    utils::validation::validate_comment_text,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 点赞、浏览、评论与回复
#[derive(Clone)]
pub struct EngagementService {
    store: Arc<dyn Store>,
    notifications: NotificationService,
    max_comment_length: usize,
}

impl EngagementService {
    pub fn new(store: Arc<dyn Store>, notifications: NotificationService, config: &Config) -> Self {
        Self {
            store,
            notifications,
            max_comment_length: config.max_comment_length,
        }
    }

    async fn require_project(&self, project_id: &str) -> Result<Project> {
        self.store
            .get_project(project_id)
            .await?
            .ok_or_else(|| AppError::not_found("Project"))
    }

    /// 评论必须存在且属于该项目
    async fn require_comment(&self, project_id: &str, comment_id: &str) -> Result<Comment> {
        self.store
            .get_comment(comment_id)
            .await?
            .filter(|c| c.project_id == project_id)
            .ok_or_else(|| AppError::not_found("Comment"))
    }

    async fn like_count(&self, project_id: &str) -> Result<u64> {
        let counts = self.store.count_likes(&[project_id.to_string()]).await?;
        Ok(counts.get(project_id).copied().unwrap_or(0))
    }

    async fn comment_count(&self, project_id: &str) -> Result<u64> {
        let counts = self.store.count_comments(&[project_id.to_string()]).await?;
        Ok(counts.get(project_id).map(|t| t.total()).unwrap_or(0))
    }

    async fn notify(&self, recipient_id: &str, actor: &UserProfile, project: &Project, kind: NotificationType) {
        self.notifications
            .dispatch(NewNotification {
                recipient_id: recipient_id.to_string(),
                sender_id: actor.id.clone(),
                project_id: project.id.clone(),
                notification_type: kind,
                message: compose_message(kind, &actor.full_name, &project.name),
            })
            .await;
    }

    /// 切换点赞状态
    ///
    /// 并发插入撞上唯一约束时视为已点赞，不再重复通知。
    pub async fn toggle_like(&self, actor: &UserProfile, project_id: &str) -> Result<LikeToggle> {
        debug!("Toggling like on project {} by {}", project_id, actor.id);

        let project = self.require_project(project_id).await?;

        let liked = if self.store.has_liked(&actor.id, &project.id).await? {
            self.store.delete_like(&actor.id, &project.id).await?;
            false
        } else {
            if self.store.insert_like(Like::new(&actor.id, &project.id)).await? {
                self.notify(&project.owner_id, actor, &project, NotificationType::Like)
                    .await;
            } else {
                debug!("Like by {} on {} already present", actor.id, project.id);
            }
            true
        };

        Ok(LikeToggle {
            liked,
            like_count: self.like_count(&project.id).await?,
        })
    }

    /// 记录首次浏览；重复或失败都被吞掉，项目作者自己的浏览不计入
    pub async fn record_view(&self, actor: &UserProfile, project_id: &str) -> Result<ViewRecorded> {
        let project = self.require_project(project_id).await?;

        if project.owner_id == actor.id {
            debug!("Owner view on {} not recorded", project.id);
            return Ok(ViewRecorded { ok: true });
        }

        match self.store.insert_view(View::new(&actor.id, &project.id)).await {
            Ok(true) => debug!("View recorded on {} by {}", project.id, actor.id),
            Ok(false) => {}
            Err(e) => warn!("Failed to record view on {}: {}", project.id, e),
        }

        Ok(ViewRecorded { ok: true })
    }

    pub async fn add_comment(&self, actor: &UserProfile, project_id: &str, text: &str) -> Result<CommentCreated> {
        let text = validate_comment_text(text, self.max_comment_length)?;
        let project = self.require_project(project_id).await?;

        let comment = self
            .store
            .insert_comment(Comment::new(&actor.id, &project.id, &text))
            .await?;
        info!("Comment {} added to project {}", comment.id, project.id);

        self.notify(&project.owner_id, actor, &project, NotificationType::Comment)
            .await;

        Ok(CommentCreated {
            comment,
            comment_count: self.comment_count(&project.id).await?,
        })
    }

    /// 追加回复并通知评论作者
    pub async fn add_reply(
        &self,
        actor: &UserProfile,
        project_id: &str,
        comment_id: &str,
        text: &str,
    ) -> Result<ReplyCreated> {
        let text = validate_comment_text(text, self.max_comment_length)?;
        let project = self.require_project(project_id).await?;
        self.require_comment(&project.id, comment_id).await?;

        let reply = Reply::new(&actor.id, &text);
        let comment = self
            .store
            .append_reply(comment_id, reply.clone())
            .await?
            .ok_or_else(|| AppError::not_found("Comment"))?;

        self.notify(&comment.actor_id, actor, &project, NotificationType::Reply)
            .await;

        Ok(ReplyCreated { reply })
    }

    /// 评论作者或项目作者可删除
    pub async fn delete_comment(
        &self,
        actor: &UserProfile,
        project_id: &str,
        comment_id: &str,
    ) -> Result<CommentDeleted> {
        let project = self.require_project(project_id).await?;
        let comment = self.require_comment(&project.id, comment_id).await?;

        if comment.actor_id != actor.id && project.owner_id != actor.id {
            return Err(AppError::forbidden("Not allowed to delete this comment"));
        }

        self.store.delete_comment(&comment.id).await?;
        info!("Comment {} deleted by {}", comment.id, actor.id);

        Ok(CommentDeleted {
            ok: true,
            comment_id: comment.id,
            comment_count: self.comment_count(&project.id).await?,
        })
    }

    /// 回复作者或项目作者可删除
    pub async fn delete_reply(
        &self,
        actor: &UserProfile,
        project_id: &str,
        comment_id: &str,
        reply_id: &str,
    ) -> Result<ReplyDeleted> {
        let project = self.require_project(project_id).await?;
        let comment = self.require_comment(&project.id, comment_id).await?;
        let reply = comment
            .find_reply(reply_id)
            .ok_or_else(|| AppError::not_found("Reply"))?;

        if reply.actor_id != actor.id && project.owner_id != actor.id {
            return Err(AppError::forbidden("Not allowed to delete this reply"));
        }

        if !self.store.remove_reply(&comment.id, reply_id).await? {
            return Err(AppError::not_found("Reply"));
        }

        Ok(ReplyDeleted {
            ok: true,
            reply_id: reply_id.to_string(),
        })
    }
}
