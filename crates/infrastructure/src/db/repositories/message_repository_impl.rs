//! 消息Repository实现

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::entities::message::{Message, NewMessage};
use domain::errors::DomainResult;
use domain::repositories::MessageRepository;
use sqlx::{query_as, query_scalar, FromRow};
use uuid::Uuid;

use crate::db::{map_sqlx_err, DbPool};

/// 数据库消息模型
#[derive(Debug, FromRow)]
struct DbMessage {
    id: Uuid,
    application_id: Uuid,
    sender_id: Uuid,
    receiver_id: Uuid,
    content: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl From<DbMessage> for Message {
    fn from(record: DbMessage) -> Self {
        Message {
            id: record.id,
            application_id: record.application_id,
            sender_id: record.sender_id,
            receiver_id: record.receiver_id,
            content: record.content,
            is_read: record.is_read,
            created_at: record.created_at,
        }
    }
}

/// 消息Repository实现
pub struct PgMessageRepository {
    pool: Arc<DbPool>,
}

impl PgMessageRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: NewMessage) -> DomainResult<Message> {
        let record = query_as::<_, DbMessage>(
            r#"
            INSERT INTO messages (application_id, sender_id, receiver_id, content)
            VALUES ($1, $2, $3, $4)
            RETURNING id, application_id, sender_id, receiver_id, content, is_read, created_at
            "#,
        )
        .bind(message.application_id)
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(&message.content)
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.into())
    }

    async fn mark_read(
        &self,
        application_id: Uuid,
        receiver_id: Uuid,
        message_ids: &[Uuid],
    ) -> DomainResult<Vec<Uuid>> {
        // 接收者和未读状态在 WHERE 里双重校验，RETURNING 给出实际翻转的行
        let updated = query_scalar::<_, Uuid>(
            r#"
            UPDATE messages
            SET is_read = TRUE
            WHERE id = ANY($1) AND application_id = $2 AND receiver_id = $3 AND is_read = FALSE
            RETURNING id
            "#,
        )
        .bind(message_ids)
        .bind(application_id)
        .bind(receiver_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(updated)
    }

    async fn last_activity_at(&self, user_id: Uuid) -> DomainResult<Option<DateTime<Utc>>> {
        let last_activity = query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MAX(created_at) FROM messages WHERE sender_id = $1 OR receiver_id = $1",
        )
        .bind(user_id)
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(last_activity)
    }
}
