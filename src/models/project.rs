use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    engagement::{Comment, EngagementCounts},
    user::UserProfile,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    /// 媒体服务托管的缩略图地址，核心只读
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub github_link: String,
    #[serde(default)]
    pub website_link: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>, technologies: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            name: name.into(),
            description: String::new(),
            technologies,
            thumbnail_url: None,
            github_link: String::new(),
            website_link: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// 首页/浏览页使用的项目卡片（项目 + 作者分组 + 互动统计）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectCard {
    pub project_id: String,
    pub name: String,
    pub thumbnail_url: String,
    pub technologies: Vec<String>,
    pub owner_id: String,
    pub owner_name: String,
    pub program: Option<String>,
    pub year: Option<String>,
    pub like_count: u64,
    pub comment_count: u64,
    pub view_count: u64,
    pub popularity: u64,
    pub created_at: DateTime<Utc>,
}

/// 项目详情页读模型
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetail {
    pub project: Project,
    pub owner: Option<UserProfile>,
    pub comments: Vec<Comment>,
    #[serde(flatten)]
    pub counts: EngagementCounts,
    pub popularity: u64,
    pub has_liked: bool,
    pub has_viewed: bool,
    pub is_owner: bool,
}

/// 某个用户主页上的项目卡片
#[derive(Debug, Clone, Serialize)]
pub struct OwnerProjects {
    pub owner: UserProfile,
    pub projects: Vec<ProjectCard>,
}

/// 点赞过的项目，按点赞时间倒序
#[derive(Debug, Clone, Serialize)]
pub struct LikedProject {
    pub liked_at: DateTime<Utc>,
    #[serde(flatten)]
    pub card: ProjectCard,
}
