use crate::{
    config::Config,
    error::Result,
    models::{
        feed::{BrowseResult, Feed, FeedFilter, RankMode},
        project::{Project, ProjectCard},
        user::UserProfile,
    },
    services::aggregation::{rank_projects, AggregationService},
    storage::Store,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// 首页三分区：热门、同届、其余
#[derive(Clone)]
pub struct FeedService {
    store: Arc<dyn Store>,
    aggregation: AggregationService,
    trending_size: usize,
}

impl FeedService {
    pub fn new(store: Arc<dyn Store>, aggregation: AggregationService, config: &Config) -> Self {
        Self {
            store,
            aggregation,
            trending_size: config.feed_trending_size,
        }
    }

    /// 个性化首页
    pub async fn get_feed(&self, viewer: Option<&UserProfile>, filter: &FeedFilter) -> Result<Feed> {
        debug!(
            "Composing feed for {:?} with filter {:?}",
            viewer.map(|v| v.id.as_str()),
            filter
        );

        let (cards, available_technologies) = self.filtered_cards(filter).await?;
        let (trending, peers, remainder) =
            compose_sections(cards, viewer.and_then(|v| v.cohort()), self.trending_size);

        Ok(Feed {
            trending,
            peers,
            remainder,
            available_technologies,
        })
    }

    /// 浏览页：过滤后的全部项目按指定方式排序
    pub async fn browse(&self, filter: &FeedFilter, mode: RankMode) -> Result<BrowseResult> {
        debug!("Browsing projects sorted by {:?}", mode);

        let (cards, _) = self.filtered_cards(filter).await?;
        let projects = rank_projects(cards, mode);

        Ok(BrowseResult {
            total: projects.len(),
            projects,
            sort: mode,
        })
    }

    pub async fn available_technologies(&self) -> Result<Vec<String>> {
        let projects = self.store.list_projects().await?;
        Ok(available_technologies(&projects))
    }

    async fn filtered_cards(&self, filter: &FeedFilter) -> Result<(Vec<ProjectCard>, Vec<String>)> {
        let projects = self.store.list_projects().await?;
        let technologies = available_technologies(&projects);

        let owner_ids: Vec<String> = projects
            .iter()
            .map(|p| p.owner_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let owners: HashMap<String, UserProfile> = self.store.get_users(&owner_ids).await?;

        let filtered: Vec<Project> = projects
            .into_iter()
            .filter(|p| filter.matches(p, owners.get(&p.owner_id)))
            .collect();

        let cards = self.aggregation.build_cards(&filtered, &owners).await?;
        Ok((cards, technologies))
    }
}

/// 去空白、去重并排序的技术标签
pub fn available_technologies(projects: &[Project]) -> Vec<String> {
    projects
        .iter()
        .flat_map(|p| p.technologies.iter())
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// 分区组合，三个分区互不相交且合起来覆盖全部卡片
///
/// 热门取热度前 `trending_size` 个；同届为剩余中作者年级与访问者相同的项目；
/// 其余为剩下的全部。后两个分区每次请求随机排列。
pub fn compose_sections(
    cards: Vec<ProjectCard>,
    viewer_year: Option<&str>,
    trending_size: usize,
) -> (Vec<ProjectCard>, Vec<ProjectCard>, Vec<ProjectCard>) {
    let mut ranked = rank_projects(cards, RankMode::Trending).into_iter();

    let trending: Vec<ProjectCard> = ranked.by_ref().take(trending_size).collect();
    let mut excluded: HashSet<String> = trending.iter().map(|c| c.project_id.clone()).collect();

    let (peers, rest): (Vec<ProjectCard>, Vec<ProjectCard>) = ranked
        .filter(|c| !excluded.contains(&c.project_id))
        .partition(|c| viewer_year.is_some() && c.year.as_deref() == viewer_year);
    excluded.extend(peers.iter().map(|c| c.project_id.clone()));

    let remainder: Vec<ProjectCard> = rest
        .into_iter()
        .filter(|c| !excluded.contains(&c.project_id))
        .collect();

    (
        trending,
        rank_projects(peers, RankMode::Random),
        rank_projects(remainder, RankMode::Random),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::engagement::{Like, View};
    use crate::storage::{EngagementRepository, MemoryStore, ProjectRepository, UserDirectory};
    use chrono::{Duration, Utc};
    use proptest::prelude::*;

    fn card(id: usize, popularity: u64, year: Option<&str>) -> ProjectCard {
        ProjectCard {
            project_id: format!("p{}", id),
            name: format!("Project {}", id),
            thumbnail_url: String::new(),
            technologies: vec![],
            owner_id: format!("o{}", id),
            owner_name: format!("Owner {}", id),
            program: None,
            year: year.map(str::to_string),
            like_count: popularity,
            comment_count: 0,
            view_count: 0,
            popularity,
            created_at: Utc::now() - Duration::minutes(id as i64),
        }
    }

    fn id_set(cards: &[ProjectCard]) -> HashSet<String> {
        cards.iter().map(|c| c.project_id.clone()).collect()
    }

    proptest! {
        #[test]
        fn prop_sections_are_disjoint_and_complete(
            rows in prop::collection::vec((0u64..10, prop::option::of(1usize..5)), 0..40),
            viewer in prop::option::of(1usize..5),
            k in 0usize..15,
        ) {
            let years = ["", "1st", "2nd", "3rd", "4th"];
            let cards: Vec<ProjectCard> = rows
                .iter()
                .enumerate()
                .map(|(i, (pop, year))| card(i, *pop, year.map(|y| years[y])))
                .collect();
            let all = id_set(&cards);

            let (a, b, c) = compose_sections(cards, viewer.map(|y| years[y]), k);
            let (a, b, c) = (id_set(&a), id_set(&b), id_set(&c));

            prop_assert!(a.is_disjoint(&b));
            prop_assert!(a.is_disjoint(&c));
            prop_assert!(b.is_disjoint(&c));
            prop_assert_eq!(a.len(), k.min(all.len()));

            let union: HashSet<String> = a.union(&b).chain(c.iter()).cloned().collect();
            prop_assert_eq!(union, all);
        }
    }

    #[test]
    fn test_peer_section_matches_viewer_year() {
        let mut cards: Vec<ProjectCard> = (0..3).map(|i| card(i, 10, Some("4th"))).collect();
        cards.extend((3..6).map(|i| card(i, 0, Some("2nd"))));
        cards.extend((6..9).map(|i| card(i, 0, Some("1st"))));

        let (trending, peers, remainder) = compose_sections(cards, Some("2nd"), 3);
        assert!(trending.iter().all(|c| c.popularity == 10));
        assert_eq!(peers.len(), 3);
        assert!(peers.iter().all(|c| c.year.as_deref() == Some("2nd")));
        assert_eq!(remainder.len(), 3);
    }

    #[test]
    fn test_anonymous_viewer_has_no_peers() {
        let cards: Vec<ProjectCard> = (0..5).map(|i| card(i, 0, Some("2nd"))).collect();
        let (trending, peers, remainder) = compose_sections(cards, None, 2);
        assert_eq!(trending.len(), 2);
        assert!(peers.is_empty());
        assert_eq!(remainder.len(), 3);
    }

    #[test]
    fn test_fewer_projects_than_k() {
        let cards: Vec<ProjectCard> = (0..4).map(|i| card(i, i as u64, None)).collect();
        let (trending, peers, remainder) = compose_sections(cards, Some("1st"), 10);
        assert_eq!(trending.len(), 4);
        assert!(peers.is_empty() && remainder.is_empty());
    }

    #[test]
    fn test_available_technologies_are_trimmed_and_unique() {
        let a = Project::new("o", "A", vec!["Rust ".to_string(), "Svelte".to_string()]);
        let b = Project::new("o", "B", vec!["Rust".to_string(), " ".to_string(), "Axum".to_string()]);
        assert_eq!(available_technologies(&[a, b]), vec!["Axum", "Rust", "Svelte"]);
    }

    async fn seeded() -> (Arc<MemoryStore>, FeedService, UserProfile) {
        let store = Arc::new(MemoryStore::new());
        let config = Config::default();
        let viewer = store
            .insert_user(UserProfile::new("Viewer", Some("BSIT"), Some("2nd")))
            .await
            .unwrap();
        let peer = store
            .insert_user(UserProfile::new("Peer", Some("BSCS"), Some("2nd")))
            .await
            .unwrap();
        let senior = store
            .insert_user(UserProfile::new("Senior", Some("BSIT"), Some("4th")))
            .await
            .unwrap();

        for i in 0..12 {
            let mut project = Project::new(senior.id.clone(), format!("Senior {}", i), vec!["Java".to_string()]);
            project.created_at = Utc::now() - Duration::hours(i);
            let project = store.insert_project(project).await.unwrap();
            for l in 0..(12 - i) {
                store.insert_like(Like::new(&format!("fan{}", l), &project.id)).await.unwrap();
            }
        }
        for i in 0..4 {
            let project = store
                .insert_project(Project::new(peer.id.clone(), format!("Peer {}", i), vec!["Rust".to_string()]))
                .await
                .unwrap();
            store.insert_view(View::new(&viewer.id, &project.id)).await.unwrap();
        }

        let aggregation = AggregationService::new(store.clone(), &config);
        (store.clone(), FeedService::new(store, aggregation, &config), viewer)
    }

    #[tokio::test]
    async fn test_feed_sections() {
        let (_store, feed_service, viewer) = seeded().await;
        let feed = feed_service.get_feed(Some(&viewer), &FeedFilter::default()).await.unwrap();

        assert_eq!(feed.trending.len(), 10);
        assert!(feed.trending.iter().all(|c| c.name.starts_with("Senior")));
        assert_eq!(feed.trending[0].name, "Senior 0");
        assert_eq!(feed.peers.len(), 4);
        assert_eq!(feed.remainder.len(), 2);
        assert_eq!(feed.len(), 16);
        assert_eq!(feed.available_technologies, vec!["Java", "Rust"]);
    }

    #[tokio::test]
    async fn test_filter_applies_before_ranking() {
        let (_store, feed_service, viewer) = seeded().await;
        let filter = FeedFilter {
            technologies: vec!["rust".to_string()],
            ..Default::default()
        };
        let feed = feed_service.get_feed(Some(&viewer), &filter).await.unwrap();
        assert_eq!(feed.len(), 4);
        assert_eq!(feed.trending.len(), 4);
        // 技术下拉框始终基于全部项目
        assert_eq!(feed.available_technologies, vec!["Java", "Rust"]);
    }

    #[tokio::test]
    async fn test_browse_by_likes() {
        let (_store, feed_service, _viewer) = seeded().await;
        let filter = FeedFilter {
            year: Some("4".to_string()),
            ..Default::default()
        };
        let result = feed_service.browse(&filter, RankMode::Likes).await.unwrap();
        assert_eq!(result.total, 12);
        assert_eq!(result.sort, RankMode::Likes);
        assert_eq!(result.projects[0].like_count, 12);
        assert_eq!(result.projects[11].like_count, 1);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = Arc::new(MemoryStore::new());
        let config = Config::default();
        let aggregation = AggregationService::new(store.clone(), &config);
        let service = FeedService::new(store, aggregation, &config);
        let feed = service.get_feed(None, &FeedFilter::default()).await.unwrap();
        assert!(feed.is_empty());
        assert!(feed.available_technologies.is_empty());
    }
}
