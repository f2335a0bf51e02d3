pub mod engagement;
pub mod feed;
pub mod notification;
pub mod project;
pub mod user;
pub mod websocket;
