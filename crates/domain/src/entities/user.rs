//! 用户实体定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 用户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// 招聘方用户
    Employer,
    /// 求职方用户
    Candidate,
    /// 其他角色（管理员等，不参与会话）
    Other,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Employer => write!(f, "EMPLOYER"),
            UserRole::Candidate => write!(f, "CANDIDATE"),
            UserRole::Other => write!(f, "OTHER"),
        }
    }
}

impl From<&str> for UserRole {
    fn from(s: &str) -> Self {
        match s {
            "EMPLOYER" => UserRole::Employer,
            "CANDIDATE" => UserRole::Candidate,
            _ => UserRole::Other,
        }
    }
}

/// 用户实体
///
/// 档案子系统拥有该实体的写权限，核心只在断开连接时更新 last_seen_at。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// 用户ID
    pub id: Uuid,
    /// 显示名称
    pub name: Option<String>,
    /// 头像引用
    pub avatar: Option<String>,
    /// 角色标签
    pub role: UserRole,
    /// 外部推送桥标识（Telegram）
    pub telegram_id: Option<String>,
    /// 最后在线时间
    pub last_seen_at: Option<DateTime<Utc>>,
}

/// 消息广播中携带的用户显示信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserDisplay {
    pub id: Uuid,
    pub name: Option<String>,
    pub avatar: Option<String>,
}

impl UserDisplay {
    /// 查不到档案时的占位显示
    pub fn placeholder(id: Uuid) -> Self {
        Self {
            id,
            name: None,
            avatar: None,
        }
    }
}

impl From<&User> for UserDisplay {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            avatar: user.avatar.clone(),
        }
    }
}
