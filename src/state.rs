use crate::{
    config::Config,
    services::{
        aggregation::AggregationService,
        auth::AuthService,
        engagement::EngagementService,
        feed::FeedService,
        notification::NotificationService,
        project::ProjectService,
        user::UserService,
        websocket::{RoomRegistry, WebSocketService},
    },
    storage::Store,
    utils::middleware::{build_rate_limiter, KeyedRateLimiter},
};
use std::sync::Arc;

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 持久化存储
    pub store: Arc<dyn Store>,

    /// 认证服务
    pub auth_service: AuthService,

    /// 通知服务
    pub notification_service: NotificationService,

    /// 点赞/浏览/评论
    pub engagement_service: EngagementService,

    /// 首页与浏览
    pub feed_service: FeedService,

    /// 项目详情
    pub project_service: ProjectService,

    /// 个人主页、点赞列表与注销
    pub user_service: UserService,

    /// 实时连接
    pub websocket_service: WebSocketService,

    /// 写操作限流
    pub rate_limiter: Arc<KeyedRateLimiter>,
}

impl AppState {
    /// 组装全部服务；房间注册表只在这里创建一次并注入通知服务
    pub fn build(config: Config, store: Arc<dyn Store>) -> anyhow::Result<Self> {
        let registry = Arc::new(RoomRegistry::new());

        let auth_service = AuthService::new(&config, store.clone());
        let aggregation_service = AggregationService::new(store.clone(), &config);
        let notification_service = NotificationService::new(store.clone(), registry.clone(), &config);
        let engagement_service =
            EngagementService::new(store.clone(), notification_service.clone(), &config);
        let feed_service = FeedService::new(store.clone(), aggregation_service.clone(), &config);
        let project_service = ProjectService::new(
            store.clone(),
            aggregation_service.clone(),
            notification_service.clone(),
        );
        let user_service = UserService::new(store.clone(), aggregation_service, notification_service.clone());
        let websocket_service = WebSocketService::new(registry, &config);
        let rate_limiter = Arc::new(build_rate_limiter(&config)?);

        Ok(Self {
            config,
            store,
            auth_service,
            notification_service,
            engagement_service,
            feed_service,
            project_service,
            user_service,
            websocket_service,
            rate_limiter,
        })
    }
}
