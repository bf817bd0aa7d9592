//! 应用层错误定义

use domain::DomainError;
use thiserror::Error;

/// 应用层错误类型
#[derive(Error, Debug)]
pub enum ApplicationError {
    /// 持久化存储错误
    #[error("存储错误: {message}")]
    Repository { message: String },

    /// 外部推送桥错误
    #[error("推送桥错误: {message}")]
    Bridge { message: String },

    /// 领域错误
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl ApplicationError {
    /// 创建存储错误
    pub fn repository(message: impl Into<String>) -> Self {
        Self::Repository {
            message: message.into(),
        }
    }

    /// 创建推送桥错误
    pub fn bridge(message: impl Into<String>) -> Self {
        Self::Bridge {
            message: message.into(),
        }
    }
}

/// 应用层结果类型
pub type ApplicationResult<T> = Result<T, ApplicationError>;
