//! 用户Repository接口定义

use crate::entities::user::{User, UserDisplay};
use crate::errors::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 用户Repository接口
///
/// 核心只读取身份、显示信息和推送桥标识，写路径仅有 last_seen_at。
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 按握手凭据（邮箱）解析用户
    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>>;

    /// 按ID查询用户
    async fn find_by_id(&self, user_id: Uuid) -> DomainResult<Option<User>>;

    /// 批量查询广播用的显示信息
    async fn find_display(&self, user_ids: &[Uuid]) -> DomainResult<Vec<UserDisplay>>;

    /// 更新最后在线时间（尽力而为）
    async fn update_last_seen(
        &self,
        user_id: Uuid,
        last_seen_at: DateTime<Utc>,
    ) -> DomainResult<()>;
}
