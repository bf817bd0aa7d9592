//! 主应用程序入口
//!
//! 组装仓储、推送桥和实时服务，启动 Axum WebSocket 网关。

use std::sync::Arc;

use application::{PushBridge, RealtimeService, RealtimeServiceDependencies};
use config::AppConfig;
use domain::crypto::ContentCipher;
use infrastructure::{
    create_pg_pool, PgConversationRepository, PgMessageRepository, PgNotificationRepository,
    PgUserRepository, TelegramBridge, MIGRATOR,
};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 生产入口要求显式的 DATABASE_URL，带默认值的变体留给开发与测试
    let config = AppConfig::from_env();
    tracing::info!(
        "连接数据库: {}",
        config.database.url.split('@').last().unwrap_or("unknown")
    );

    let pool = Arc::new(
        create_pg_pool(&config.database.url, config.database.max_connections).await?,
    );
    MIGRATOR.run(&*pool).await?;

    let bridge: Option<Arc<dyn PushBridge>> = match &config.bridge.base_url {
        Some(base_url) => Some(Arc::new(TelegramBridge::new(
            base_url.clone(),
            config.bridge.timeout_ms,
        )?)),
        None => {
            tracing::info!("BRIDGE_BASE_URL not set, external push disabled");
            None
        }
    };

    let cipher = ContentCipher::new(config.chat.encryption_key.as_deref());
    if !cipher.is_enabled() {
        tracing::warn!("CHAT_ENCRYPTION_KEY missing or invalid, storing message content as-is");
    }

    let realtime = Arc::new(RealtimeService::new(RealtimeServiceDependencies {
        conversation_repository: Arc::new(PgConversationRepository::new(pool.clone())),
        message_repository: Arc::new(PgMessageRepository::new(pool.clone())),
        notification_repository: Arc::new(PgNotificationRepository::new(pool.clone())),
        user_repository: Arc::new(PgUserRepository::new(pool.clone())),
        bridge,
        cipher,
        sanitize_min_run: config.chat.sanitize_min_run,
    }));

    let app = router(AppState::new(realtime));
    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!("实时核心启动在 http://{}", address);
    axum::serve(listener, app).await?;

    Ok(())
}
