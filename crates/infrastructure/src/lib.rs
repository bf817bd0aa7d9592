//! 基础设施层实现。
//!
//! 提供 Postgres 仓储和外部推送桥适配器，实现应用/领域层定义的接口。

pub mod db;
pub mod telegram;

pub use db::repositories::{
    PgConversationRepository, PgMessageRepository, PgNotificationRepository, PgUserRepository,
};
pub use db::{create_pg_pool, DbPool, MIGRATOR};
pub use telegram::TelegramBridge;
