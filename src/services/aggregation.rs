use crate::{
    config::Config,
    error::Result,
    models::{
        engagement::{popularity, EngagementCounts},
        feed::RankMode,
        project::{Project, ProjectCard},
        user::UserProfile,
    },
    storage::Store,
};
use rand::seq::SliceRandom;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const ANONYMOUS_OWNER: &str = "Anonymous";

/// 互动统计与排名
#[derive(Clone)]
pub struct AggregationService {
    store: Arc<dyn Store>,
    default_thumbnail_url: String,
}

impl AggregationService {
    pub fn new(store: Arc<dyn Store>, config: &Config) -> Self {
        Self {
            store,
            default_thumbnail_url: config.default_thumbnail_url.clone(),
        }
    }

    /// 批量统计点赞/评论/浏览，三类查询并发执行
    ///
    /// 每个请求的项目ID都会出现在结果中，没有互动的计为 0。
    pub async fn count_engagement(&self, project_ids: &[String]) -> Result<HashMap<String, EngagementCounts>> {
        debug!("Counting engagement for {} projects", project_ids.len());

        if project_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let (likes, comments, views) = tokio::try_join!(
            self.store.count_likes(project_ids),
            self.store.count_comments(project_ids),
            self.store.count_views(project_ids),
        )?;

        Ok(project_ids
            .iter()
            .map(|id| {
                let counts = EngagementCounts {
                    like_count: likes.get(id).copied().unwrap_or(0),
                    comment_count: comments.get(id).map(|t| t.total()).unwrap_or(0),
                    view_count: views.get(id).copied().unwrap_or(0),
                };
                (id.clone(), counts)
            })
            .collect())
    }

    /// 组装项目卡片；缺失缩略图时使用默认图
    pub async fn build_cards(
        &self,
        projects: &[Project],
        owners: &HashMap<String, UserProfile>,
    ) -> Result<Vec<ProjectCard>> {
        let ids: Vec<String> = projects.iter().map(|p| p.id.clone()).collect();
        let counts = self.count_engagement(&ids).await?;

        Ok(projects
            .iter()
            .map(|project| {
                let owner = owners.get(&project.owner_id);
                let c = counts.get(&project.id).copied().unwrap_or_default();
                ProjectCard {
                    project_id: project.id.clone(),
                    name: project.name.clone(),
                    thumbnail_url: project
                        .thumbnail_url
                        .clone()
                        .filter(|url| !url.trim().is_empty())
                        .unwrap_or_else(|| self.default_thumbnail_url.clone()),
                    technologies: project.technologies.clone(),
                    owner_id: project.owner_id.clone(),
                    owner_name: owner
                        .map(|o| o.full_name.clone())
                        .unwrap_or_else(|| ANONYMOUS_OWNER.to_string()),
                    program: owner.and_then(|o| o.program.clone()),
                    year: owner.and_then(|o| o.cohort().map(str::to_string)),
                    like_count: c.like_count,
                    comment_count: c.comment_count,
                    view_count: c.view_count,
                    popularity: popularity(c.like_count, c.view_count),
                    created_at: project.created_at,
                }
            })
            .collect())
    }
}

fn newest_first(a: &ProjectCard, b: &ProjectCard) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.project_id.cmp(&b.project_id))
}

/// 按模式排序
///
/// 除 `Random` 外的模式都是全序：主键相同时按创建时间降序，再按ID，
/// 因此对同一输入重复调用结果一致。
pub fn rank_projects(mut cards: Vec<ProjectCard>, mode: RankMode) -> Vec<ProjectCard> {
    match mode {
        RankMode::Trending => cards.sort_by(|a, b| {
            b.popularity
                .cmp(&a.popularity)
                .then_with(|| newest_first(a, b))
        }),
        RankMode::Newest => cards.sort_by(newest_first),
        RankMode::Likes => cards.sort_by(|a, b| {
            b.like_count
                .cmp(&a.like_count)
                .then_with(|| newest_first(a, b))
        }),
        RankMode::Views => cards.sort_by(|a, b| {
            b.view_count
                .cmp(&a.view_count)
                .then_with(|| newest_first(a, b))
        }),
        RankMode::Random => cards.shuffle(&mut rand::thread_rng()),
    }
    cards
}
