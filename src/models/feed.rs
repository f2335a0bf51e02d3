use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::{
    project::{Project, ProjectCard},
    user::{normalize_year, UserProfile},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankMode {
    /// 热度降序，热度相同时较新的优先
    Trending,
    #[default]
    Newest,
    Likes,
    Views,
    /// 每次请求重新洗牌，不可复现
    Random,
}

impl FromStr for RankMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trending" | "popular" => Ok(RankMode::Trending),
            "newest" | "recent" => Ok(RankMode::Newest),
            "likes" => Ok(RankMode::Likes),
            "views" => Ok(RankMode::Views),
            "random" => Ok(RankMode::Random),
            other => Err(format!("Unknown sort mode: {}", other)),
        }
    }
}

/// 排名前的项目预过滤条件，可与任意排序方式组合
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedFilter {
    pub search: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    pub program: Option<String>,
    pub year: Option<String>,
    pub track: Option<String>,
}

impl FeedFilter {
    pub fn matches(&self, project: &Project, owner: Option<&UserProfile>) -> bool {
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let hit = project.name.to_lowercase().contains(&needle)
                || project.description.to_lowercase().contains(&needle)
                || project
                    .technologies
                    .iter()
                    .any(|t| t.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        if !self.technologies.is_empty()
            && !project
                .technologies
                .iter()
                .any(|t| self.technologies.iter().any(|wanted| wanted.eq_ignore_ascii_case(t.trim())))
        {
            return false;
        }

        if let Some(program) = self.program.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let owner_program = owner.and_then(|o| o.program.as_deref());
            if owner_program != Some(program) {
                return false;
            }
        }

        if let Some(year) = self.year.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let wanted = normalize_year(year);
            if owner.and_then(|o| o.cohort()) != Some(wanted.as_str()) {
                return false;
            }
        }

        if let Some(track) = self.track.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let owner_track = owner.and_then(|o| o.track.as_deref()).map(str::trim);
            if owner_track != Some(track) {
                return false;
            }
        }

        true
    }
}

/// 查询字符串形式的过滤参数（`technology` 为逗号分隔列表）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedQuery {
    pub search: Option<String>,
    pub technology: Option<String>,
    pub program: Option<String>,
    pub year: Option<String>,
    pub track: Option<String>,
    pub sort: Option<String>,
}

impl FeedQuery {
    pub fn filter(&self) -> FeedFilter {
        FeedFilter {
            search: self.search.clone(),
            technologies: self
                .technology
                .as_deref()
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            program: self.program.clone(),
            year: self.year.clone(),
            track: self.track.clone(),
        }
    }

    pub fn rank_mode(&self) -> Result<RankMode, String> {
        match self.sort.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(sort) => sort.parse(),
            None => Ok(RankMode::default()),
        }
    }
}

/// 个性化首页的三个互不相交的分区
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Feed {
    pub trending: Vec<ProjectCard>,
    pub peers: Vec<ProjectCard>,
    pub remainder: Vec<ProjectCard>,
    pub available_technologies: Vec<String>,
}

impl Feed {
    pub fn len(&self) -> usize {
        self.trending.len() + self.peers.len() + self.remainder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowseResult {
    pub projects: Vec<ProjectCard>,
    pub total: usize,
    pub sort: RankMode,
}
