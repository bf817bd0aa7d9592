//! WebSocket 处理器
//!
//! 连接升级、握手身份解析、事件解码循环和断开清理。
//! 协议层面没有错误帧：格式不对的帧记日志后丢弃。

use axum::extract::ws::{Message as WsMessage, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use domain::events::ClientEvent;

use crate::state::AppState;

/// WebSocket连接查询参数
#[derive(Debug, Deserialize)]
pub struct WebSocketQuery {
    /// 握手凭据（用户邮箱），缺省时连接以未认证状态工作
    pub token: Option<String>,
}

/// 处理WebSocket连接升级
pub async fn handle_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WebSocketQuery>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.token))
}

/// 连接生命周期
async fn handle_socket(socket: WebSocket, state: AppState, token: Option<String>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // 服务端事件经无界通道汇入发送任务
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let connection_id = state.realtime.connect(tx).await;

    if let Some(credential) = token.as_deref().filter(|t| !t.is_empty()) {
        state.realtime.authenticate(connection_id, credential).await;
    }
    info!("WebSocket connection {} established", connection_id);

    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match event.to_json() {
                Ok(text) => text,
                Err(err) => {
                    warn!("Failed to serialize outbound event: {}", err);
                    continue;
                }
            };
            if ws_sender.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => match ClientEvent::from_json(&text) {
                Ok(event) => state.realtime.handle_event(connection_id, event).await,
                Err(err) => {
                    debug!(
                        "Malformed frame on connection {} dropped: {}",
                        connection_id, err
                    );
                }
            },
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!("WebSocket error on connection {}: {}", connection_id, err);
                break;
            }
        }
    }

    // 先注销再广播离线，由服务保证迟到广播不会到达这个连接
    state.realtime.disconnect(connection_id).await;
    send_task.abort();
    info!("WebSocket connection {} closed", connection_id);
}
