//! 外部推送桥抽象
//!
//! 桥接严格尽力而为：只有映射到已知模板的通知类型才会外发，
//! 未映射类型静默跳过，桥失败从不回滚已落库的通知。

use async_trait::async_trait;
use domain::entities::notification::NotificationType;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::errors::ApplicationResult;

/// 桥消息模板
///
/// 每个变体对应桥服务的一个固定模板端点。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BridgeMessage {
    /// 申请状态更新
    #[serde(rename_all = "camelCase")]
    ApplicationStatus { job_title: String, status: String },

    /// 收到新申请
    #[serde(rename_all = "camelCase")]
    NewApplication {
        job_title: String,
        applicant_name: String,
    },

    /// 职位已发布
    #[serde(rename_all = "camelCase")]
    JobPublished { job_title: String },
}

impl BridgeMessage {
    /// 模板对应的桥端点
    pub fn endpoint(&self) -> &'static str {
        match self {
            BridgeMessage::ApplicationStatus { .. } => "/notify/application-status",
            BridgeMessage::NewApplication { .. } => "/notify/new-application",
            BridgeMessage::JobPublished { .. } => "/notify/job-published",
        }
    }

    /// 按通知类型和负载选择模板
    ///
    /// 返回 None 表示该通知不做外部桥接。
    pub fn from_notification(
        notification_type: NotificationType,
        message: &str,
        data: &JsonValue,
    ) -> Option<Self> {
        let job_title = || {
            data.get("jobTitle")
                .and_then(JsonValue::as_str)
                .map(str::to_string)
                .or_else(|| extract_quoted(message))
                .unwrap_or_else(|| "vacancy".to_string())
        };

        match notification_type {
            NotificationType::ApplicationStatus => {
                if let Some(status) = data.get("newStatus").and_then(JsonValue::as_str) {
                    Some(BridgeMessage::ApplicationStatus {
                        job_title: job_title(),
                        status: status.to_string(),
                    })
                } else if let Some(name) = data.get("candidateName").and_then(JsonValue::as_str) {
                    Some(BridgeMessage::NewApplication {
                        job_title: job_title(),
                        applicant_name: name.to_string(),
                    })
                } else {
                    None
                }
            }
            NotificationType::NewJob => Some(BridgeMessage::JobPublished {
                job_title: job_title(),
            }),
            NotificationType::Message | NotificationType::System => None,
        }
    }
}

/// 通知正文里第一个引号包裹的片段（职位标题的回退来源）
fn extract_quoted(message: &str) -> Option<String> {
    let start = message.find('"')?;
    let rest = &message[start + 1..];
    let end = rest.find('"')?;
    let quoted = &rest[..end];
    if quoted.is_empty() {
        None
    } else {
        Some(quoted.to_string())
    }
}

/// 推送桥接口
///
/// 实现方负责自身的超时控制，调用方把失败当作日志事件处理。
#[async_trait]
pub trait PushBridge: Send + Sync {
    /// 向用户的外部频道投递一条模板消息
    async fn send(&self, bridge_id: &str, message: &BridgeMessage) -> ApplicationResult<()>;
}
