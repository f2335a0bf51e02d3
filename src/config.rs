use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,
    pub log_format: String,

    // Storage configuration
    pub storage_backend: String,
    pub database_url: String,
    pub database_namespace: String,
    pub database_name: String,
    pub database_username: String,
    pub database_password: String,

    // Authentication configuration
    pub jwt_secret: String,

    // Content settings
    pub max_comment_length: usize,
    pub default_thumbnail_url: String,

    // Feed configuration
    pub feed_trending_size: usize,

    // Notification configuration
    pub notification_list_limit: usize,
    pub websocket_stale_after_secs: i64,
    pub websocket_cleanup_interval: u64,

    // Rate limiting
    pub rate_limit_requests: u32,
    pub rate_limit_burst: u32,
    pub trust_proxy_headers: bool,

    // CORS configuration
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a port number")?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "project_showcase=debug,tower_http=debug".to_string()),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),

            storage_backend: env::var("STORAGE_BACKEND")
                .unwrap_or_else(|_| "surreal".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "localhost:8000".to_string()),
            database_namespace: env::var("DATABASE_NAMESPACE")
                .unwrap_or_else(|_| "showcase".to_string()),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "projects".to_string()),
            database_username: env::var("DATABASE_USERNAME")
                .unwrap_or_else(|_| "root".to_string()),
            database_password: env::var("DATABASE_PASSWORD")
                .unwrap_or_else(|_| "root".to_string()),

            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,

            max_comment_length: env::var("MAX_COMMENT_LENGTH")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()?,
            default_thumbnail_url: env::var("DEFAULT_THUMBNAIL_URL")
                .unwrap_or_else(|_| "/uploads/default-thumbnail.jpg".to_string()),

            feed_trending_size: env::var("FEED_TRENDING_SIZE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,

            notification_list_limit: env::var("NOTIFICATION_LIST_LIMIT")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            websocket_stale_after_secs: env::var("WEBSOCKET_STALE_AFTER_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,
            websocket_cleanup_interval: env::var("WEBSOCKET_CLEANUP_INTERVAL")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,

            rate_limit_requests: env::var("RATE_LIMIT_REQUESTS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()?,
            rate_limit_burst: env::var("RATE_LIMIT_BURST")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,
            trust_proxy_headers: env::var("TRUST_PROXY_HEADERS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .context("TRUST_PROXY_HEADERS must be true or false")?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn uses_memory_storage(&self) -> bool {
        self.storage_backend.eq_ignore_ascii_case("memory")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 3000,
            environment: "development".to_string(),
            log_level: "project_showcase=debug".to_string(),
            log_format: "pretty".to_string(),
            storage_backend: "memory".to_string(),
            database_url: "localhost:8000".to_string(),
            database_namespace: "showcase".to_string(),
            database_name: "projects".to_string(),
            database_username: "root".to_string(),
            database_password: "root".to_string(),
            jwt_secret: "development-secret".to_string(),
            max_comment_length: 2000,
            default_thumbnail_url: "/uploads/default-thumbnail.jpg".to_string(),
            feed_trending_size: 10,
            notification_list_limit: 50,
            websocket_stale_after_secs: 300,
            websocket_cleanup_interval: 60,
            rate_limit_requests: 120,
            rate_limit_burst: 20,
            trust_proxy_headers: false,
            cors_allowed_origins: "http://localhost:3001".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_uses_memory_storage() {
        let config = Config::default();
        assert!(config.uses_memory_storage());
        assert!(config.is_development());
        assert!(!config.is_production());
        assert_eq!(config.feed_trending_size, 10);
        assert_eq!(config.notification_list_limit, 50);
        assert!(!config.trust_proxy_headers);
    }
}
