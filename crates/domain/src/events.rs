//! 实时协议事件定义
//!
//! 入站/出站事件建模为封闭枚举，每个事件携带强类型负载，
//! 线上帧格式为 `{"event": <名称>, "data": {...}}`，负载字段使用 camelCase。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::entities::notification::{Notification, NotificationType};
use crate::entities::user::UserDisplay;

/// 客户端 -> 核心 的入站事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// 订阅个人通知频道
    #[serde(rename = "join-user-room", rename_all = "camelCase")]
    JoinUserRoom { user_id: Uuid },

    /// 订阅职位广播房间
    #[serde(rename = "join-job-room", rename_all = "camelCase")]
    JoinJobRoom { job_id: Uuid },

    /// 订阅公司广播房间
    #[serde(rename = "join-company-room", rename_all = "camelCase")]
    JoinCompanyRoom { company_id: Uuid },

    /// 请求加入会话房间
    #[serde(rename = "join_room", rename_all = "camelCase")]
    JoinRoom {
        application_id: Uuid,
        /// 握手身份解析失败时的回退身份
        #[serde(default)]
        user_id: Option<Uuid>,
    },

    /// 输入状态
    #[serde(rename = "typing", rename_all = "camelCase")]
    Typing {
        application_id: Uuid,
        is_typing: bool,
    },

    /// 发送消息
    #[serde(rename = "send_message", rename_all = "camelCase")]
    SendMessage {
        application_id: Uuid,
        content: String,
        #[serde(default)]
        client_message_id: Option<String>,
        /// 客户端提供的接收者会被忽略，接收方永远由服务端推导
        #[serde(default)]
        receiver_id: Option<Uuid>,
    },

    /// 标记消息已读
    #[serde(rename = "mark_read", rename_all = "camelCase")]
    MarkRead {
        application_id: Uuid,
        message_ids: Vec<Uuid>,
    },

    /// 标记单条通知已读
    #[serde(rename = "mark-notification-read", rename_all = "camelCase")]
    MarkNotificationRead { notification_id: Uuid },

    /// 标记全部通知已读
    #[serde(rename = "mark-all-notifications-read", rename_all = "camelCase")]
    MarkAllNotificationsRead { user_id: Uuid },
}

/// 广播消息负载
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: Uuid,
    /// 线上投递前已消毒的内容
    pub content: String,
    pub sender: UserDisplay,
    pub receiver: UserDisplay,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

/// 房间级通知负载（职位/公司广播）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomNotificationPayload {
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub data: JsonValue,
}

/// 核心 -> 客户端 的出站事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// 有用户加入会话房间
    #[serde(rename = "user_joined", rename_all = "camelCase")]
    UserJoined { user_id: Uuid },

    /// 有用户离开（断开连接）
    #[serde(rename = "user_left", rename_all = "camelCase")]
    UserLeft {
        user_id: Uuid,
        /// epoch 毫秒
        last_seen_at: i64,
    },

    /// 在线状态
    #[serde(rename = "presence", rename_all = "camelCase")]
    Presence {
        user_id: Uuid,
        online: bool,
        /// 离线时的最后在线时间，epoch 毫秒
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_seen_at: Option<i64>,
    },

    /// 房间内当前在线的其他用户
    #[serde(rename = "room_users", rename_all = "camelCase")]
    RoomUsers { user_ids: Vec<Uuid> },

    /// 对方输入状态
    #[serde(rename = "user_typing", rename_all = "camelCase")]
    UserTyping {
        user_id: Uuid,
        is_typing: bool,
    },

    /// 新消息（仅发给房间内其他成员）
    #[serde(rename = "new_message")]
    NewMessage(MessagePayload),

    /// 落库确认（仅发给发送者）
    #[serde(rename = "message_saved", rename_all = "camelCase")]
    MessageSaved {
        temp_id: String,
        id: Uuid,
        created_at: DateTime<Utc>,
    },

    /// 已读确认（发给整个房间）
    #[serde(rename = "messages_read", rename_all = "camelCase")]
    MessagesRead { message_ids: Vec<Uuid> },

    /// 个人通知
    #[serde(rename = "notification")]
    Notification(Notification),

    /// 通知已读确认
    #[serde(rename = "notification-marked-read", rename_all = "camelCase")]
    NotificationMarkedRead { notification_id: Uuid },

    /// 全部通知已读确认
    #[serde(rename = "all-notifications-marked-read", rename_all = "camelCase")]
    AllNotificationsMarkedRead { user_id: Uuid },

    /// 职位房间广播
    #[serde(rename = "job-notification", rename_all = "camelCase")]
    JobNotification {
        job_id: Uuid,
        #[serde(flatten)]
        payload: RoomNotificationPayload,
    },

    /// 公司房间广播
    #[serde(rename = "company-notification", rename_all = "camelCase")]
    CompanyNotification {
        company_id: Uuid,
        #[serde(flatten)]
        payload: RoomNotificationPayload,
    },
}

impl ClientEvent {
    /// 从线上 JSON 文本解析入站事件
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl ServerEvent {
    /// 序列化为线上 JSON 文本
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
