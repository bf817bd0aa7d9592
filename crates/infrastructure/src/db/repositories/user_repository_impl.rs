//! 用户Repository实现

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::entities::user::{User, UserDisplay, UserRole};
use domain::errors::DomainResult;
use domain::repositories::UserRepository;
use sqlx::{query, query_as, FromRow};
use uuid::Uuid;

use crate::db::{map_sqlx_err, DbPool};

/// 数据库用户模型
#[derive(Debug, FromRow)]
struct DbUser {
    id: Uuid,
    name: Option<String>,
    avatar: Option<String>,
    role: String,
    telegram_id: Option<String>,
    last_seen_at: Option<DateTime<Utc>>,
}

impl From<DbUser> for User {
    fn from(record: DbUser) -> Self {
        User {
            id: record.id,
            name: record.name,
            avatar: record.avatar,
            role: UserRole::from(record.role.as_str()),
            telegram_id: record.telegram_id,
            last_seen_at: record.last_seen_at,
        }
    }
}

/// 显示信息查询结果
#[derive(Debug, FromRow)]
struct DbUserDisplay {
    id: Uuid,
    name: Option<String>,
    avatar: Option<String>,
}

/// 用户Repository实现
pub struct PgUserRepository {
    pool: Arc<DbPool>,
}

impl PgUserRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        let record = query_as::<_, DbUser>(
            r#"
            SELECT id, name, avatar, role, telegram_id, last_seen_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.map(User::from))
    }

    async fn find_by_id(&self, user_id: Uuid) -> DomainResult<Option<User>> {
        let record = query_as::<_, DbUser>(
            r#"
            SELECT id, name, avatar, role, telegram_id, last_seen_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.map(User::from))
    }

    async fn find_display(&self, user_ids: &[Uuid]) -> DomainResult<Vec<UserDisplay>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let records = query_as::<_, DbUserDisplay>(
            "SELECT id, name, avatar FROM users WHERE id = ANY($1)",
        )
        .bind(user_ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(records
            .into_iter()
            .map(|record| UserDisplay {
                id: record.id,
                name: record.name,
                avatar: record.avatar,
            })
            .collect())
    }

    async fn update_last_seen(
        &self,
        user_id: Uuid,
        last_seen_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        query("UPDATE users SET last_seen_at = $2 WHERE id = $1")
            .bind(user_id)
            .bind(last_seen_at)
            .execute(&*self.pool)
            .await
            .map_err(map_sqlx_err)?;

        Ok(())
    }
}
