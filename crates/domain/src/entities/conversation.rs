//! 会话参与者投影
//!
//! 会话即一条求职申请（Application），绑定招聘方与求职方各一名用户。
//! 该实体对核心只读。

use uuid::Uuid;

/// 会话的两名合法参与者
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversationParticipants {
    /// 会话（申请）ID
    pub application_id: Uuid,
    /// 招聘方用户ID
    pub employer_user_id: Uuid,
    /// 求职方用户ID
    pub candidate_user_id: Uuid,
}

impl ConversationParticipants {
    /// 判断用户是否为会话参与者
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        user_id == self.employer_user_id || user_id == self.candidate_user_id
    }

    /// 返回相对于给定参与者的另一方
    ///
    /// 非参与者返回 None，接收方永远由服务端推导。
    pub fn other_participant(&self, user_id: Uuid) -> Option<Uuid> {
        if user_id == self.employer_user_id {
            Some(self.candidate_user_id)
        } else if user_id == self.candidate_user_id {
            Some(self.employer_user_id)
        } else {
            None
        }
    }

    /// 两名参与者的用户ID
    pub fn both(&self) -> [Uuid; 2] {
        [self.employer_user_id, self.candidate_user_id]
    }
}
