//! 聊天消息实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 聊天消息实体
///
/// content 字段为落库前已混淆的内容，排序以 created_at 为准，
/// 同一时间戳按插入顺序排列。核心不删除消息。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// 消息ID
    pub id: Uuid,
    /// 所属会话（申请）ID
    pub application_id: Uuid,
    /// 发送者ID
    pub sender_id: Uuid,
    /// 接收者ID（会话的另一方，服务端推导）
    pub receiver_id: Uuid,
    /// 消息内容（静态存储时已混淆）
    pub content: String,
    /// 是否已读
    pub is_read: bool,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

/// 新消息落库请求
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub application_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    /// 已混淆的内容
    pub content: String,
}
