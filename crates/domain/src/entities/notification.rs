//! 通知实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    /// 新聊天消息
    Message,
    /// 申请状态变化（新申请或状态更新）
    ApplicationStatus,
    /// 新职位发布
    NewJob,
    /// 系统通知
    System,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationType::Message => write!(f, "MESSAGE"),
            NotificationType::ApplicationStatus => write!(f, "APPLICATION_STATUS"),
            NotificationType::NewJob => write!(f, "NEW_JOB"),
            NotificationType::System => write!(f, "SYSTEM"),
        }
    }
}

/// 通知实体
///
/// 状态机只有 unread -> read 一条迁移，核心不提供删除路径。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// 通知ID
    pub id: Uuid,
    /// 目标用户ID
    pub user_id: Uuid,
    /// 通知类型
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    /// 通知标题
    pub title: String,
    /// 通知内容
    pub message: String,
    /// 结构化负载
    pub data: JsonValue,
    /// 是否已读
    pub is_read: bool,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// 创建未读通知
    pub fn new(
        user_id: Uuid,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        data: JsonValue,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            notification_type,
            title: title.into(),
            message: message.into(),
            data,
            is_read: false,
            created_at: Utc::now(),
        }
    }

    /// 标记为已读
    pub fn mark_as_read(&mut self) {
        self.is_read = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_notification_is_unread() {
        let notification = Notification::new(
            Uuid::new_v4(),
            NotificationType::Message,
            "New message",
            "You have a new message",
            JsonValue::Null,
        );
        assert!(!notification.is_read);
    }

    #[test]
    fn test_type_serialization() {
        let json = serde_json::to_string(&NotificationType::ApplicationStatus).unwrap();
        assert_eq!(json, "\"APPLICATION_STATUS\"");
    }
}
