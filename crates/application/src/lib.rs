//! 应用层
//!
//! 实时核心的进程级服务：会话注册表、推送桥抽象和实时服务本体。

pub mod bridge;
pub mod errors;
pub mod registry;
pub mod services;

pub use bridge::{BridgeMessage, PushBridge};
pub use errors::{ApplicationError, ApplicationResult};
pub use registry::{ConnectionId, SessionRegistry};
pub use services::realtime_service::{
    NotificationRequest, RealtimeService, RealtimeServiceDependencies,
};
