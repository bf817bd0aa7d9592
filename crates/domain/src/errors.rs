//! 领域模型错误定义

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 内容混淆错误
    #[error("内容加密错误: {message}")]
    CryptoError { message: String },

    /// 存储错误
    #[error("存储错误: {message}")]
    Storage { message: String },
}

impl DomainError {
    /// 创建内容混淆错误
    pub fn crypto_error(message: impl Into<String>) -> Self {
        Self::CryptoError {
            message: message.into(),
        }
    }

    /// 创建存储错误
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;
