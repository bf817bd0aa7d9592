//! 连接会话实体定义
//!
//! 每个打开的连接对应一个 LiveSession，仅存在于内存，断开即销毁。

use std::collections::HashSet;
use uuid::Uuid;

use super::user::UserRole;

/// 连接的已解析身份
///
/// 握手时解析一次后视为不可变；解析失败的连接保持未认证状态，
/// 所有身份门控操作静默拒绝。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub user_id: Uuid,
    pub role: UserRole,
}

/// 一个打开连接的内存状态
#[derive(Debug, Clone)]
pub struct LiveSession {
    /// 连接ID
    pub connection_id: Uuid,
    /// 已解析身份（握手失败时为 None）
    pub identity: Option<ResolvedIdentity>,
    /// 当前加入的房间名集合
    pub rooms: HashSet<String>,
}

impl LiveSession {
    /// 创建新的连接会话
    pub fn new(connection_id: Uuid) -> Self {
        Self {
            connection_id,
            identity: None,
            rooms: HashSet::new(),
        }
    }

    /// 已解析的用户ID
    pub fn user_id(&self) -> Option<Uuid> {
        self.identity.map(|identity| identity.user_id)
    }

    /// 加入房间
    pub fn join_room(&mut self, room: String) {
        self.rooms.insert(room);
    }

    /// 是否在房间内
    pub fn is_in_room(&self, room: &str) -> bool {
        self.rooms.contains(room)
    }

    /// 当前加入的会话房间（app-*）名称列表
    pub fn conversation_rooms(&self) -> Vec<String> {
        self.rooms
            .iter()
            .filter(|room| room.starts_with(room_names::CONVERSATION_PREFIX))
            .cloned()
            .collect()
    }
}

/// 房间命名约定
pub mod room_names {
    use uuid::Uuid;

    pub const CONVERSATION_PREFIX: &str = "app-";
    pub const USER_PREFIX: &str = "user-";
    pub const JOB_PREFIX: &str = "job-";
    pub const COMPANY_PREFIX: &str = "company-";

    /// 会话房间名
    pub fn conversation(application_id: Uuid) -> String {
        format!("{}{}", CONVERSATION_PREFIX, application_id)
    }

    /// 用户个人通知频道名
    pub fn user(user_id: Uuid) -> String {
        format!("{}{}", USER_PREFIX, user_id)
    }

    /// 职位广播房间名
    pub fn job(job_id: Uuid) -> String {
        format!("{}{}", JOB_PREFIX, job_id)
    }

    /// 公司广播房间名
    pub fn company(company_id: Uuid) -> String {
        format!("{}{}", COMPANY_PREFIX, company_id)
    }
}
