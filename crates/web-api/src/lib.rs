//! Web API 层。
//!
//! 提供 Axum 路由，将 WebSocket 连接委托给应用层的实时服务。

mod routes;
mod state;
mod websocket;

pub use routes::router;
pub use state::AppState;
