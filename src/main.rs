use std::{net::SocketAddr, sync::Arc};
use tokio::time::{interval, Duration};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use project_showcase::{
    config::Config,
    create_router,
    services::Database,
    state::AppState,
    storage::{MemoryStore, Store, SurrealStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // 初始化日志
    let filter = tracing_subscriber::EnvFilter::new(&config.log_level);
    if config.log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting project showcase service ({})...", config.environment);

    if config.is_production() && config.jwt_secret == Config::default().jwt_secret {
        return Err(anyhow::anyhow!("JWT_SECRET must be changed in production"));
    }

    let store = open_store(&config).await?;
    let app_state = Arc::new(AppState::build(config.clone(), store)?);

    // 启动后台任务
    start_background_tasks(app_state.clone());

    let app = create_router(app_state);

    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr.parse()?)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    Ok(())
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    if config.uses_memory_storage() {
        info!("Using in-memory storage");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let db = match Database::new(config).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to create database connection: {}", e);
            return Err(anyhow::anyhow!("Database initialization failed"));
        }
    };
    db.verify_connection().await?;
    info!("Database connection established successfully");

    let store = SurrealStore::new(Arc::new(db));
    store.ensure_schema().await?;

    Ok(Arc::new(store))
}

fn start_background_tasks(app_state: Arc<AppState>) {
    info!("Starting background tasks...");

    // 清理失联的 WebSocket 连接
    let ws_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(
            ws_state.config.websocket_cleanup_interval.max(1),
        ));

        loop {
            interval.tick().await;
            let removed = ws_state.websocket_service.cleanup_stale_connections();
            if removed > 0 {
                info!("Removed {} stale WebSocket connections", removed);
            }
        }
    });

    // 清理过期的用户缓存
    let auth_state = app_state;
    tokio::spawn(async move {
        let mut interval = interval(Duration::from_secs(3600)); // 每小时执行一次

        loop {
            interval.tick().await;
            auth_state.auth_service.cleanup_expired_cache();
        }
    });
}
