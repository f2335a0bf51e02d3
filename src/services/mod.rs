pub mod aggregation;
pub mod auth;
pub mod database;
pub mod engagement;
pub mod feed;
pub mod notification;
pub mod project;
pub mod user;
pub mod websocket;

// 重新导出常用类型
pub use aggregation::AggregationService;
pub use auth::AuthService;
pub use database::Database;
pub use engagement::EngagementService;
pub use feed::FeedService;
pub use notification::NotificationService;
pub use project::ProjectService;
pub use user::UserService;
pub use websocket::{DeliveryChannel, RoomRegistry, WebSocketService};
