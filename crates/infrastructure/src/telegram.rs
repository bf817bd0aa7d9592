//! Telegram 推送桥适配器
//!
//! 把模板消息 POST 到独立的桥服务，桥服务负责实际的 Telegram 交互。
//! 客户端带硬超时，慢速外部服务不能拖住事件处理。

use std::time::Duration;

use application::{ApplicationError, ApplicationResult, BridgeMessage, PushBridge};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::debug;

/// HTTP 推送桥
pub struct TelegramBridge {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramBridge {
    /// 创建推送桥客户端
    pub fn new(base_url: impl Into<String>, timeout_ms: u64) -> ApplicationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|err| ApplicationError::bridge(err.to_string()))?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self { client, base_url })
    }

    /// 请求体：模板字段加上目标的桥标识
    fn request_body(bridge_id: &str, message: &BridgeMessage) -> ApplicationResult<JsonValue> {
        let mut body = serde_json::to_value(message)
            .map_err(|err| ApplicationError::bridge(err.to_string()))?;

        if let Some(object) = body.as_object_mut() {
            object.insert(
                "telegramId".to_string(),
                JsonValue::String(bridge_id.to_string()),
            );
        }
        Ok(body)
    }
}

#[async_trait]
impl PushBridge for TelegramBridge {
    async fn send(&self, bridge_id: &str, message: &BridgeMessage) -> ApplicationResult<()> {
        let url = format!("{}{}", self.base_url, message.endpoint());
        let body = Self::request_body(bridge_id, message)?;

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| ApplicationError::bridge(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApplicationError::bridge(format!(
                "bridge returned {} for {}",
                status, url
            )));
        }

        debug!("Bridge message delivered to {}", url);
        Ok(())
    }
}
