//! 应用层服务模块

pub mod realtime_service;

#[cfg(test)]
mod realtime_service_tests;

pub use realtime_service::{NotificationRequest, RealtimeService, RealtimeServiceDependencies};
