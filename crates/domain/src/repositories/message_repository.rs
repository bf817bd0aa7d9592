//! 消息Repository接口定义

use crate::entities::message::{Message, NewMessage};
use crate::errors::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 消息Repository接口
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 持久化新消息，返回带持久ID和创建时间的完整记录
    ///
    /// 插入即消息身份与排序的唯一事实来源。
    async fn create(&self, message: NewMessage) -> DomainResult<Message>;

    /// 标记消息已读
    ///
    /// 只翻转给定会话中接收者为 receiver_id 且当前未读的行，
    /// 返回实际翻转的消息ID集合。数据层的双重校验防止
    /// 参与者标记自己发出的或对方已读的消息。
    async fn mark_read(
        &self,
        application_id: Uuid,
        receiver_id: Uuid,
        message_ids: &[Uuid],
    ) -> DomainResult<Vec<Uuid>>;

    /// 用户最近一次消息活动时间（作为发送者或接收者）
    ///
    /// 在线状态跟踪器的持久化回退：新进程的内存里没有
    /// 从未观测到断开事件的用户。
    async fn last_activity_at(&self, user_id: Uuid) -> DomainResult<Option<DateTime<Utc>>>;
}
