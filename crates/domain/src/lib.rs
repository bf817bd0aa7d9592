//! 领域层
//!
//! 定义实时聊天核心的实体、线上协议事件、仓储接口和内容处理工具。

pub mod crypto;
pub mod entities;
pub mod errors;
pub mod events;
pub mod repositories;
pub mod sanitize;

pub use errors::{DomainError, DomainResult};
