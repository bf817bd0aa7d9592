//! 通知Repository接口定义

use crate::entities::Notification;
use crate::errors::DomainResult;
use async_trait::async_trait;
use uuid::Uuid;

/// 通知Repository接口
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// 持久化通知记录
    async fn create(&self, notification: &Notification) -> DomainResult<Notification>;

    /// 用户的未读通知，按创建时间升序
    async fn find_unread(&self, user_id: Uuid) -> DomainResult<Vec<Notification>>;

    /// 标记单条通知已读
    ///
    /// 只在通知属于 user_id 时翻转，返回是否实际更新。
    async fn mark_as_read(&self, notification_id: Uuid, user_id: Uuid) -> DomainResult<bool>;

    /// 标记用户全部通知已读，返回更新条数
    async fn mark_all_as_read(&self, user_id: Uuid) -> DomainResult<u64>;
}
