//! 通知Repository实现

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::entities::notification::{Notification, NotificationType};
use domain::errors::DomainResult;
use domain::repositories::NotificationRepository;
use serde_json::Value as JsonValue;
use sqlx::{query, query_as, FromRow};
use uuid::Uuid;

use crate::db::{map_sqlx_err, DbPool};

/// 数据库通知模型
#[derive(Debug, FromRow)]
struct DbNotification {
    id: Uuid,
    user_id: Uuid,
    notification_type: String,
    title: String,
    message: String,
    data: JsonValue,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl From<DbNotification> for Notification {
    fn from(record: DbNotification) -> Self {
        let notification_type = match record.notification_type.as_str() {
            "MESSAGE" => NotificationType::Message,
            "APPLICATION_STATUS" => NotificationType::ApplicationStatus,
            "NEW_JOB" => NotificationType::NewJob,
            _ => NotificationType::System,
        };

        Notification {
            id: record.id,
            user_id: record.user_id,
            notification_type,
            title: record.title,
            message: record.message,
            data: record.data,
            is_read: record.is_read,
            created_at: record.created_at,
        }
    }
}

/// 通知Repository实现
pub struct PgNotificationRepository {
    pool: Arc<DbPool>,
}

impl PgNotificationRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn create(&self, notification: &Notification) -> DomainResult<Notification> {
        let record = query_as::<_, DbNotification>(
            r#"
            INSERT INTO notifications (id, user_id, notification_type, title, message, data, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, notification_type, title, message, data, is_read, created_at
            "#,
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(notification.notification_type.to_string())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.data)
        .bind(notification.is_read)
        .bind(notification.created_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.into())
    }

    async fn find_unread(&self, user_id: Uuid) -> DomainResult<Vec<Notification>> {
        let records = query_as::<_, DbNotification>(
            r#"
            SELECT id, user_id, notification_type, title, message, data, is_read, created_at
            FROM notifications
            WHERE user_id = $1 AND is_read = FALSE
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(records.into_iter().map(Notification::from).collect())
    }

    async fn mark_as_read(&self, notification_id: Uuid, user_id: Uuid) -> DomainResult<bool> {
        let result = query(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2 AND is_read = FALSE",
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_as_read(&self, user_id: Uuid) -> DomainResult<u64> {
        let result = query(
            "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .execute(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(result.rows_affected())
    }
}
