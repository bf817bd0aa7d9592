//! 连接/房间/在线状态注册表
//!
//! 跨连接共享的全部可变状态都集中在这里：连接表、房间成员映射、
//! 最后在线时间映射。单进程基线下只有事件处理任务访问，
//! 横向扩展时在这一层接入 pub/sub 背板。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use domain::entities::session::{LiveSession, ResolvedIdentity};
use domain::events::ServerEvent;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

/// 连接ID
pub type ConnectionId = Uuid;

/// 单个连接的注册项
struct ConnectionEntry {
    session: LiveSession,
    sender: mpsc::UnboundedSender<ServerEvent>,
}

/// 内存会话注册表
pub struct SessionRegistry {
    /// 连接存储
    connections: Arc<RwLock<HashMap<ConnectionId, ConnectionEntry>>>,
    /// 房间到连接的映射
    rooms: Arc<RwLock<HashMap<String, HashSet<ConnectionId>>>>,
    /// 用户最后在线时间（epoch 毫秒），断开时写入
    last_seen: Arc<RwLock<HashMap<Uuid, i64>>>,
}

impl SessionRegistry {
    /// 创建新的会话注册表
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            rooms: Arc::new(RwLock::new(HashMap::new())),
            last_seen: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// 注册新连接，返回连接ID
    pub async fn register(&self, sender: mpsc::UnboundedSender<ServerEvent>) -> ConnectionId {
        let connection_id = Uuid::new_v4();
        let entry = ConnectionEntry {
            session: LiveSession::new(connection_id),
            sender,
        };

        let mut connections = self.connections.write().await;
        connections.insert(connection_id, entry);
        debug!("Connection {} registered", connection_id);
        connection_id
    }

    /// 注销连接，从所有房间移除，返回其会话状态
    pub async fn unregister(&self, connection_id: ConnectionId) -> Option<LiveSession> {
        let entry = {
            let mut connections = self.connections.write().await;
            connections.remove(&connection_id)?
        };

        let mut rooms = self.rooms.write().await;
        for room in &entry.session.rooms {
            if let Some(members) = rooms.get_mut(room) {
                members.remove(&connection_id);
                if members.is_empty() {
                    rooms.remove(room);
                }
            }
        }

        debug!("Connection {} unregistered", connection_id);
        Some(entry.session)
    }

    /// 写入连接的已解析身份，后解析的身份获胜
    pub async fn set_identity(&self, connection_id: ConnectionId, identity: ResolvedIdentity) {
        let mut connections = self.connections.write().await;
        if let Some(entry) = connections.get_mut(&connection_id) {
            entry.session.identity = Some(identity);
        }
    }

    /// 连接的已解析身份
    pub async fn identity(&self, connection_id: ConnectionId) -> Option<ResolvedIdentity> {
        let connections = self.connections.read().await;
        connections
            .get(&connection_id)
            .and_then(|entry| entry.session.identity)
    }

    /// 将连接加入房间
    pub async fn join_room(&self, connection_id: ConnectionId, room: String) {
        {
            let mut connections = self.connections.write().await;
            match connections.get_mut(&connection_id) {
                Some(entry) => entry.session.join_room(room.clone()),
                None => return,
            }
        }

        let mut rooms = self.rooms.write().await;
        rooms.entry(room).or_default().insert(connection_id);
    }

    /// 连接是否在房间内
    pub async fn is_in_room(&self, connection_id: ConnectionId, room: &str) -> bool {
        let connections = self.connections.read().await;
        connections
            .get(&connection_id)
            .map(|entry| entry.session.is_in_room(room))
            .unwrap_or(false)
    }

    /// 房间内已解析的用户ID集合（去重）
    pub async fn room_user_ids(&self, room: &str) -> Vec<Uuid> {
        let connections = self.connections.read().await;
        let rooms = self.rooms.read().await;

        let mut seen = HashSet::new();
        let mut user_ids = Vec::new();
        if let Some(members) = rooms.get(room) {
            for connection_id in members {
                if let Some(user_id) = connections
                    .get(connection_id)
                    .and_then(|entry| entry.session.user_id())
                {
                    if seen.insert(user_id) {
                        user_ids.push(user_id);
                    }
                }
            }
        }
        user_ids
    }

    /// 用户是否有任一在线连接
    pub async fn is_online(&self, user_id: Uuid) -> bool {
        let connections = self.connections.read().await;
        connections
            .values()
            .any(|entry| entry.session.user_id() == Some(user_id))
    }

    /// 向单个连接投递事件
    pub async fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) {
        let connections = self.connections.read().await;
        if let Some(entry) = connections.get(&connection_id) {
            if entry.sender.send(event).is_err() {
                warn!("Failed to deliver event to connection {}", connection_id);
            }
        }
    }

    /// 向房间广播事件，可排除一个连接（通常是事件来源）
    pub async fn broadcast_room(
        &self,
        room: &str,
        event: ServerEvent,
        except: Option<ConnectionId>,
    ) {
        let connections = self.connections.read().await;
        let rooms = self.rooms.read().await;

        let Some(members) = rooms.get(room) else {
            return;
        };

        for connection_id in members {
            if Some(*connection_id) == except {
                continue;
            }
            if let Some(entry) = connections.get(connection_id) {
                if entry.sender.send(event.clone()).is_err() {
                    warn!("Failed to broadcast to connection {}", connection_id);
                }
            }
        }
    }

    /// 记录用户最后在线时间
    pub async fn record_last_seen(&self, user_id: Uuid, timestamp_ms: i64) {
        let mut last_seen = self.last_seen.write().await;
        last_seen.insert(user_id, timestamp_ms);
    }

    /// 内存中的最后在线时间
    pub async fn last_seen_ms(&self, user_id: Uuid) -> Option<i64> {
        let last_seen = self.last_seen.read().await;
        last_seen.get(&user_id).copied()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
