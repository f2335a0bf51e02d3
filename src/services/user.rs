use crate::{
    error::{AppError, Result},
    models::{
        project::{LikedProject, OwnerProjects, Project},
        user::{AccountDeleted, UserProfile},
    },
    services::{aggregation::AggregationService, notification::NotificationService},
    storage::Store,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// 点赞列表最多返回的条数
const LIKED_PROJECTS_LIMIT: usize = 50;

/// 用户服务：个人主页项目、点赞列表与注销级联
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    aggregation: AggregationService,
    notifications: NotificationService,
}

impl UserService {
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

    /// 用户主页的项目卡片，最新在前
    pub async fn owner_projects(&self, owner_id: &str) -> Result<OwnerProjects> {
        debug!("Loading projects for owner: {}", owner_id);

        let owner = self
            .store
            .get_user(owner_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        let projects = self.store.list_projects_by_owner(&owner.id).await?;
        let mut owners = HashMap::new();
        owners.insert(owner.id.clone(), owner.clone());
        let projects = self.aggregation.build_cards(&projects, &owners).await?;

        Ok(OwnerProjects { owner, projects })
    }

    /// 当前用户点赞过的项目，按点赞时间倒序；已删除的项目被跳过
    pub async fn liked_projects(&self, actor: &UserProfile) -> Result<Vec<LikedProject>> {
        let likes = self.store.likes_by_actor(&actor.id, LIKED_PROJECTS_LIMIT).await?;
        let project_ids: Vec<String> = likes.iter().map(|l| l.project_id.clone()).collect();
        let mut projects = self.store.get_projects(&project_ids).await?;

        let owner_ids: Vec<String> = projects
            .values()
            .map(|p| p.owner_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let owners = self.store.get_users(&owner_ids).await?;

        let (liked_at, ordered): (Vec<_>, Vec<Project>) = likes
            .into_iter()
            .filter_map(|like| projects.remove(&like.project_id).map(|p| (like.created_at, p)))
            .unzip();
        let cards = self.aggregation.build_cards(&ordered, &owners).await?;

        Ok(liked_at
            .into_iter()
            .zip(cards)
            .map(|(liked_at, card)| LikedProject { liked_at, card })
            .collect())
    }

    /// 删除用户拥有的项目及其互动、本人发出的互动和相关通知，最后删除资料
    pub async fn delete_account(&self, actor: &UserProfile) -> Result<AccountDeleted> {
        let projects = self.store.list_projects_by_owner(&actor.id).await?;

        let mut notifications_deleted = 0;
        for project in &projects {
            self.store.purge_project_engagement(&project.id).await?;
            notifications_deleted += self.notifications.purge_for_project(&project.id).await?;
            self.store.delete_project(&project.id).await?;
        }

        self.store.purge_actor_engagement(&actor.id).await?;
        notifications_deleted += self.notifications.purge_for_user(&actor.id).await?;
        self.store.delete_user(&actor.id).await?;

        info!(
            "Account {} deleted with {} projects and {} notifications",
            actor.id,
            projects.len(),
            notifications_deleted
        );

        Ok(AccountDeleted {
            projects_deleted: projects.len(),
            notifications_deleted,
        })
    }
}
