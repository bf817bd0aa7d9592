//! 数据库连接与仓储实现

use domain::errors::DomainError;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

pub mod repositories;

pub type DbPool = Pool<Postgres>;

/// 嵌入式迁移，启动时由 main 执行
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// 创建 Postgres 连接池
pub async fn create_pg_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// sqlx 错误到领域错误的统一映射
pub(crate) fn map_sqlx_err(err: sqlx::Error) -> DomainError {
    DomainError::storage(err.to_string())
}
