use crate::{
    error::{AppError, Result},
    models::{
        engagement::popularity,
        project::ProjectDetail,
        user::UserProfile,
    },
    services::{aggregation::AggregationService, notification::NotificationService},
    storage::Store,
};
use std::sync::Arc;
use tracing::{debug, info};

/// 项目详情读模型与级联删除
#[derive(Clone)]
pub struct ProjectService {
    store: Arc<dyn Store>,
    aggregation: AggregationService,
    notifications: NotificationService,
}

impl ProjectService {
    pub fn new(
        store: Arc<dyn Store>,
        aggregation: AggregationService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            store,
            aggregation,
            notifications,
        }
    }

    /// 获取项目详情
    pub async fn get_detail(&self, viewer: Option<&UserProfile>, project_id: &str) -> Result<ProjectDetail> {
        debug!("Getting project detail: {}", project_id);

        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| AppError::not_found("Project"))?;

        let ids = [project.id.clone()];
        let (owner, comments, counts) = tokio::try_join!(
            self.store.get_user(&project.owner_id),
            self.store.list_comments(&project.id),
            self.aggregation.count_engagement(&ids),
        )?;
        let counts = counts.get(&project.id).copied().unwrap_or_default();

        let (has_liked, has_viewed, is_owner) = match viewer {
            Some(viewer) => (
                self.store.has_liked(&viewer.id, &project.id).await?,
                self.store.has_viewed(&viewer.id, &project.id).await?,
                viewer.id == project.owner_id,
            ),
            None => (false, false, false),
        };

        Ok(ProjectDetail {
            project,
            owner,
            comments,
            counts,
            popularity: popularity(counts.like_count, counts.view_count),
            has_liked,
            has_viewed,
            is_owner,
        })
    }

    /// 删除项目及其全部互动与通知，仅作者可操作
    pub async fn delete_project(&self, actor: &UserProfile, project_id: &str) -> Result<()> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| AppError::not_found("Project"))?;

        if project.owner_id != actor.id {
            return Err(AppError::forbidden("Only the owner can delete this project"));
        }

        self.store.purge_project_engagement(&project.id).await?;
        self.notifications.purge_for_project(&project.id).await?;
        self.store.delete_project(&project.id).await?;

        info!("Project {} deleted by {}", project.id, actor.id);
        Ok(())
    }
}
