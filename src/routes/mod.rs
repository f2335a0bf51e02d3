pub mod feed;
pub mod notifications;
pub mod projects;
pub mod users;
pub mod websocket;
