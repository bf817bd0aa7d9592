//! 实时服务
//!
//! 进程级唯一的实时管理器：持有会话注册表和仓储/推送桥引用，
//! 处理连接生命周期内的全部入站事件。所有失败都被限制在
//! 产生它的处理函数内，对外可见的失败行为只有"预期事件不到达"，
//! 不发协议级错误帧，也不泄露会话是否存在、对方是否为参与者。

use std::sync::Arc;

use chrono::Utc;
use domain::crypto::ContentCipher;
use domain::entities::notification::{Notification, NotificationType};
use domain::entities::session::{room_names, ResolvedIdentity};
use domain::entities::user::{UserDisplay, UserRole};
use domain::entities::message::NewMessage;
use domain::events::{ClientEvent, MessagePayload, RoomNotificationPayload, ServerEvent};
use domain::repositories::{
    ConversationRepository, MessageRepository, NotificationRepository, UserRepository,
};
use domain::sanitize;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bridge::{BridgeMessage, PushBridge};
use crate::errors::ApplicationResult;
use crate::registry::{ConnectionId, SessionRegistry};

/// 实时服务依赖
pub struct RealtimeServiceDependencies {
    pub conversation_repository: Arc<dyn ConversationRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub notification_repository: Arc<dyn NotificationRepository>,
    pub user_repository: Arc<dyn UserRepository>,
    /// 未配置时跳过外部推送
    pub bridge: Option<Arc<dyn PushBridge>>,
    pub cipher: ContentCipher,
    pub sanitize_min_run: usize,
}

/// 通知请求
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub data: JsonValue,
}

/// 实时服务
///
/// 进程启动时构造一次，显式注入连接层，便于用假仓储单元测试。
pub struct RealtimeService {
    registry: Arc<SessionRegistry>,
    conversation_repository: Arc<dyn ConversationRepository>,
    message_repository: Arc<dyn MessageRepository>,
    notification_repository: Arc<dyn NotificationRepository>,
    user_repository: Arc<dyn UserRepository>,
    bridge: Option<Arc<dyn PushBridge>>,
    cipher: ContentCipher,
    sanitize_min_run: usize,
}

impl RealtimeService {
    /// 创建实时服务
    pub fn new(deps: RealtimeServiceDependencies) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
            conversation_repository: deps.conversation_repository,
            message_repository: deps.message_repository,
            notification_repository: deps.notification_repository,
            user_repository: deps.user_repository,
            bridge: deps.bridge,
            cipher: deps.cipher,
            sanitize_min_run: deps.sanitize_min_run,
        }
    }

    /// 会话注册表
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// 注册新连接
    pub async fn connect(&self, sender: mpsc::UnboundedSender<ServerEvent>) -> ConnectionId {
        self.registry.register(sender).await
    }

    /// 握手身份解析
    ///
    /// 凭据是连接时携带的邮箱。查找失败不是致命错误：连接保持
    /// 未认证状态，后续身份门控操作静默拒绝。
    pub async fn authenticate(&self, connection_id: ConnectionId, credential: &str) {
        match self.user_repository.find_by_email(credential).await {
            Ok(Some(user)) => {
                self.registry
                    .set_identity(
                        connection_id,
                        ResolvedIdentity {
                            user_id: user.id,
                            role: user.role,
                        },
                    )
                    .await;
                info!("Connection {} authenticated as {}", connection_id, user.id);
            }
            Ok(None) => {
                debug!("Connection {} credential not found", connection_id);
            }
            Err(err) => {
                warn!("Auth lookup error for connection {}: {}", connection_id, err);
            }
        }
    }

    /// 处理入站事件
    ///
    /// 处理函数的错误在这里记录并吞掉，绝不穿透到连接层。
    pub async fn handle_event(&self, connection_id: ConnectionId, event: ClientEvent) {
        let result = match event {
            ClientEvent::JoinUserRoom { user_id } => {
                self.join_user_room(connection_id, user_id).await
            }
            ClientEvent::JoinJobRoom { job_id } => {
                self.registry
                    .join_room(connection_id, room_names::job(job_id))
                    .await;
                Ok(())
            }
            ClientEvent::JoinCompanyRoom { company_id } => {
                self.registry
                    .join_room(connection_id, room_names::company(company_id))
                    .await;
                Ok(())
            }
            ClientEvent::JoinRoom {
                application_id,
                user_id,
            } => self.join_room(connection_id, application_id, user_id).await,
            ClientEvent::Typing {
                application_id,
                is_typing,
            } => self.typing(connection_id, application_id, is_typing).await,
            ClientEvent::SendMessage {
                application_id,
                content,
                client_message_id,
                receiver_id: _,
            } => {
                self.send_message(connection_id, application_id, content, client_message_id)
                    .await
            }
            ClientEvent::MarkRead {
                application_id,
                message_ids,
            } => {
                self.mark_read(connection_id, application_id, message_ids)
                    .await
            }
            ClientEvent::MarkNotificationRead { notification_id } => {
                self.mark_notification_read(connection_id, notification_id)
                    .await
            }
            ClientEvent::MarkAllNotificationsRead { user_id } => {
                self.mark_all_notifications_read(connection_id, user_id)
                    .await
            }
        };

        if let Err(err) = result {
            warn!("Event handling failed for connection {}: {}", connection_id, err);
        }
    }

    /// 断开连接清理
    ///
    /// 从所有房间同步移除并广播离线事件，之后不可能再有
    /// 过期成员收到迟到的广播。
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let Some(session) = self.registry.unregister(connection_id).await else {
            return;
        };

        let Some(user_id) = session.user_id() else {
            info!("Connection {} disconnected (unauthenticated)", connection_id);
            return;
        };

        let now = Utc::now();
        let timestamp_ms = now.timestamp_millis();
        self.registry.record_last_seen(user_id, timestamp_ms).await;

        for room in session.conversation_rooms() {
            self.registry
                .broadcast_room(
                    &room,
                    ServerEvent::UserLeft {
                        user_id,
                        last_seen_at: timestamp_ms,
                    },
                    None,
                )
                .await;
            self.registry
                .broadcast_room(
                    &room,
                    ServerEvent::Presence {
                        user_id,
                        online: false,
                        last_seen_at: Some(timestamp_ms),
                    },
                    None,
                )
                .await;
        }

        // 持久化最后在线时间，失败只记日志
        if let Err(err) = self.user_repository.update_last_seen(user_id, now).await {
            warn!("Failed to persist last seen for {}: {}", user_id, err);
        }

        info!("Connection {} disconnected (user {})", connection_id, user_id);
    }

    /// 用户是否在线
    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.registry.is_online(user_id).await
    }

    /// 用户最后在线时间（epoch 毫秒）
    ///
    /// 内存没有记录时回退到最近一次消息活动：新进程没有
    /// 本进程生命周期内未观测到断开的用户的内存历史。
    pub async fn last_seen_ms(&self, user_id: Uuid) -> Option<i64> {
        if let Some(timestamp_ms) = self.registry.last_seen_ms(user_id).await {
            return Some(timestamp_ms);
        }

        match self.message_repository.last_activity_at(user_id).await {
            Ok(last_activity) => last_activity.map(|at| at.timestamp_millis()),
            Err(err) => {
                warn!("Last seen fallback lookup failed for {}: {}", user_id, err);
                None
            }
        }
    }

    /// 订阅个人通知频道
    ///
    /// 请求的用户ID必须与已解析身份一致，未认证连接直接拒绝。
    /// 加入后回放仍未读的通知，重连的用户据此看到挂起的提醒。
    async fn join_user_room(
        &self,
        connection_id: ConnectionId,
        user_id: Uuid,
    ) -> ApplicationResult<()> {
        let Some(identity) = self.registry.identity(connection_id).await else {
            return Ok(());
        };
        if identity.user_id != user_id {
            return Ok(());
        }

        self.registry
            .join_room(connection_id, room_names::user(user_id))
            .await;
        info!("User {} joined their personal channel", user_id);

        let pending = self.notification_repository.find_unread(user_id).await?;
        for notification in pending {
            self.registry
                .send_to(connection_id, ServerEvent::Notification(notification))
                .await;
        }

        Ok(())
    }

    /// 加入会话房间
    ///
    /// 故意的 fail-closed/无泄漏策略：会话不存在、身份未解析、
    /// 非参与者一律静默无操作，调用方无法区分三者。
    async fn join_room(
        &self,
        connection_id: ConnectionId,
        application_id: Uuid,
        fallback_user_id: Option<Uuid>,
    ) -> ApplicationResult<()> {
        let identity = match self.registry.identity(connection_id).await {
            Some(identity) => identity,
            None => {
                // 握手解析未完成时的负载回退身份
                let Some(user_id) = fallback_user_id else {
                    return Ok(());
                };
                let identity = ResolvedIdentity {
                    user_id,
                    role: UserRole::Other,
                };
                self.registry.set_identity(connection_id, identity).await;
                identity
            }
        };
        let current_user_id = identity.user_id;

        let Some(participants) = self
            .conversation_repository
            .get_participants(application_id)
            .await?
        else {
            return Ok(());
        };
        if !participants.is_participant(current_user_id) {
            return Ok(());
        }

        let room = room_names::conversation(application_id);
        self.registry.join_room(connection_id, room.clone()).await;

        self.registry
            .broadcast_room(
                &room,
                ServerEvent::UserJoined {
                    user_id: current_user_id,
                },
                Some(connection_id),
            )
            .await;
        self.registry
            .broadcast_room(
                &room,
                ServerEvent::Presence {
                    user_id: current_user_id,
                    online: true,
                    last_seen_at: None,
                },
                Some(connection_id),
            )
            .await;

        // 给新加入者播种在线状态视图
        let present: Vec<Uuid> = self
            .registry
            .room_user_ids(&room)
            .await
            .into_iter()
            .filter(|user_id| *user_id != current_user_id)
            .collect();
        self.registry
            .send_to(
                connection_id,
                ServerEvent::RoomUsers {
                    user_ids: present.clone(),
                },
            )
            .await;

        for participant_id in participants.both() {
            if participant_id == current_user_id {
                continue;
            }
            let online = present.contains(&participant_id);
            let last_seen_at = if online {
                None
            } else {
                self.last_seen_ms(participant_id).await
            };
            self.registry
                .send_to(
                    connection_id,
                    ServerEvent::Presence {
                        user_id: participant_id,
                        online,
                        last_seen_at,
                    },
                )
                .await;
        }

        info!(
            "User {} joined conversation room {}",
            current_user_id, application_id
        );
        Ok(())
    }

    /// 输入状态转发
    ///
    /// 纯瞬态：只转发给房间内其他成员，不落任何存储。
    async fn typing(
        &self,
        connection_id: ConnectionId,
        application_id: Uuid,
        is_typing: bool,
    ) -> ApplicationResult<()> {
        let Some(identity) = self.registry.identity(connection_id).await else {
            return Ok(());
        };

        let room = room_names::conversation(application_id);
        if !self.registry.is_in_room(connection_id, &room).await {
            return Ok(());
        }

        self.registry
            .broadcast_room(
                &room,
                ServerEvent::UserTyping {
                    user_id: identity.user_id,
                    is_typing,
                },
                Some(connection_id),
            )
            .await;
        Ok(())
    }

    /// 发送消息
    ///
    /// 落库成功前不广播不确认；落库失败中止整个操作并记日志，
    /// 客户端保留乐观副本和 clientMessageId，可自行重发。
    async fn send_message(
        &self,
        connection_id: ConnectionId,
        application_id: Uuid,
        content: String,
        client_message_id: Option<String>,
    ) -> ApplicationResult<()> {
        let Some(identity) = self.registry.identity(connection_id).await else {
            return Ok(());
        };
        let sender_id = identity.user_id;

        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(());
        }

        // 与加入房间相同的 fail-closed 规则，参与者按需重新推导
        let Some(participants) = self
            .conversation_repository
            .get_participants(application_id)
            .await?
        else {
            return Ok(());
        };
        let Some(receiver_id) = participants.other_participant(sender_id) else {
            return Ok(());
        };

        let encrypted = self.cipher.encrypt(trimmed)?;
        let persisted = self
            .message_repository
            .create(NewMessage {
                application_id,
                sender_id,
                receiver_id,
                content: encrypted,
            })
            .await?;

        let (sender, receiver) = self.display_pair(sender_id, receiver_id).await;
        let payload = MessagePayload {
            id: persisted.id,
            content: sanitize::sanitize_outgoing(trimmed, self.sanitize_min_run),
            sender,
            receiver,
            created_at: persisted.created_at,
            is_read: persisted.is_read,
        };

        // 双路径投递：广播给其他成员，确认只发给发送者。
        // 发送者已经渲染了乐观副本，回发会造成重复。
        let room = room_names::conversation(application_id);
        self.registry
            .broadcast_room(&room, ServerEvent::NewMessage(payload), Some(connection_id))
            .await;

        if let Some(temp_id) = client_message_id {
            self.registry
                .send_to(
                    connection_id,
                    ServerEvent::MessageSaved {
                        temp_id,
                        id: persisted.id,
                        created_at: persisted.created_at,
                    },
                )
                .await;
        }

        // 接收者无论是否在线都会收到持久化通知
        let notify_result = self
            .notify(NotificationRequest {
                user_id: receiver_id,
                notification_type: NotificationType::Message,
                title: "New message".to_string(),
                message: "New message on your application".to_string(),
                data: serde_json::json!({
                    "applicationId": application_id,
                    "messageId": persisted.id,
                }),
            })
            .await;
        if let Err(err) = notify_result {
            warn!("Message notification failed for {}: {}", receiver_id, err);
        }

        Ok(())
    }

    /// 标记消息已读
    ///
    /// 数据层双重校验：只翻转发给当前用户且未读的行，
    /// 广播的集合是实际翻转的ID，而不是调用方给的列表。
    async fn mark_read(
        &self,
        connection_id: ConnectionId,
        application_id: Uuid,
        message_ids: Vec<Uuid>,
    ) -> ApplicationResult<()> {
        let Some(identity) = self.registry.identity(connection_id).await else {
            return Ok(());
        };
        if message_ids.is_empty() {
            return Ok(());
        }

        let updated = self
            .message_repository
            .mark_read(application_id, identity.user_id, &message_ids)
            .await?;
        if updated.is_empty() {
            return Ok(());
        }

        let room = room_names::conversation(application_id);
        self.registry
            .broadcast_room(
                &room,
                ServerEvent::MessagesRead {
                    message_ids: updated,
                },
                None,
            )
            .await;
        Ok(())
    }

    /// 标记单条通知已读
    async fn mark_notification_read(
        &self,
        connection_id: ConnectionId,
        notification_id: Uuid,
    ) -> ApplicationResult<()> {
        let Some(identity) = self.registry.identity(connection_id).await else {
            return Ok(());
        };

        let updated = self
            .notification_repository
            .mark_as_read(notification_id, identity.user_id)
            .await?;
        if updated {
            self.registry
                .send_to(
                    connection_id,
                    ServerEvent::NotificationMarkedRead { notification_id },
                )
                .await;
        }
        Ok(())
    }

    /// 标记全部通知已读
    async fn mark_all_notifications_read(
        &self,
        connection_id: ConnectionId,
        user_id: Uuid,
    ) -> ApplicationResult<()> {
        let Some(identity) = self.registry.identity(connection_id).await else {
            return Ok(());
        };
        if identity.user_id != user_id {
            return Ok(());
        }

        self.notification_repository.mark_all_as_read(user_id).await?;
        self.registry
            .send_to(
                connection_id,
                ServerEvent::AllNotificationsMarkedRead { user_id },
            )
            .await;
        Ok(())
    }

    /// 派发通知
    ///
    /// 1. 无条件落库（持久性保证）；
    /// 2. 目标有在线会话时投递到个人频道；
    /// 3. 类型映射到已知模板且用户有桥标识时外发，失败不回滚。
    pub async fn notify(&self, request: NotificationRequest) -> ApplicationResult<Notification> {
        let notification = Notification::new(
            request.user_id,
            request.notification_type,
            request.title,
            request.message,
            request.data,
        );
        let persisted = self.notification_repository.create(&notification).await?;

        self.registry
            .broadcast_room(
                &room_names::user(request.user_id),
                ServerEvent::Notification(persisted.clone()),
                None,
            )
            .await;

        self.bridge_notification(&persisted).await;

        Ok(persisted)
    }

    /// 职位房间广播
    pub async fn notify_job_room(&self, job_id: Uuid, payload: RoomNotificationPayload) {
        self.registry
            .broadcast_room(
                &room_names::job(job_id),
                ServerEvent::JobNotification { job_id, payload },
                None,
            )
            .await;
    }

    /// 公司房间广播
    pub async fn notify_company_room(&self, company_id: Uuid, payload: RoomNotificationPayload) {
        self.registry
            .broadcast_room(
                &room_names::company(company_id),
                ServerEvent::CompanyNotification {
                    company_id,
                    payload,
                },
                None,
            )
            .await;
    }

    /// 外部桥投递，严格尽力而为
    async fn bridge_notification(&self, notification: &Notification) {
        let Some(bridge) = &self.bridge else {
            return;
        };

        let Some(message) = BridgeMessage::from_notification(
            notification.notification_type,
            &notification.message,
            &notification.data,
        ) else {
            debug!(
                "Notification type {} not mapped to a bridge template, skipping",
                notification.notification_type
            );
            return;
        };

        let bridge_id = match self.user_repository.find_by_id(notification.user_id).await {
            Ok(Some(user)) => user.telegram_id,
            Ok(None) => None,
            Err(err) => {
                warn!(
                    "Bridge id lookup failed for {}: {}",
                    notification.user_id, err
                );
                None
            }
        };
        let Some(bridge_id) = bridge_id else {
            return;
        };

        if let Err(err) = bridge.send(&bridge_id, &message).await {
            warn!(
                "Bridge delivery failed for notification {}: {}",
                notification.id, err
            );
        }
    }

    /// 广播用的显示信息对，查不到档案时用占位符
    async fn display_pair(&self, sender_id: Uuid, receiver_id: Uuid) -> (UserDisplay, UserDisplay) {
        let displays = match self
            .user_repository
            .find_display(&[sender_id, receiver_id])
            .await
        {
            Ok(displays) => displays,
            Err(err) => {
                warn!("Display lookup failed: {}", err);
                Vec::new()
            }
        };

        let find = |user_id: Uuid| {
            displays
                .iter()
                .find(|display| display.id == user_id)
                .cloned()
                .unwrap_or_else(|| UserDisplay::placeholder(user_id))
        };
        (find(sender_id), find(receiver_id))
    }
}
