//! 会话参与者查询接口

use crate::entities::ConversationParticipants;
use crate::errors::DomainResult;
use async_trait::async_trait;
use uuid::Uuid;

/// 会话参与者Repository接口
///
/// 加入房间和发送消息前的参与者校验都走这一个查询。
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// 按会话ID查询两名参与者
    ///
    /// 会话不存在时返回 None，调用方据此静默拒绝。
    async fn get_participants(
        &self,
        application_id: Uuid,
    ) -> DomainResult<Option<ConversationParticipants>>;
}
