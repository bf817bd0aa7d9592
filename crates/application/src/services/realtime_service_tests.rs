//! 实时服务单元测试
//!
//! 用内存假仓储、通道连接和记录型假桥覆盖访问控制、消息管道、
//! 已读回执、在线状态和通知派发的可测性质。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use data_encoding::BASE64;
use domain::crypto::ContentCipher;
use domain::entities::message::{Message, NewMessage};
use domain::entities::notification::{Notification, NotificationType};
use domain::entities::user::{User, UserDisplay, UserRole};
use domain::entities::ConversationParticipants;
use domain::errors::{DomainError, DomainResult};
use domain::events::{ClientEvent, ServerEvent};
use domain::repositories::{
    ConversationRepository, MessageRepository, NotificationRepository, UserRepository,
};
use domain::sanitize::EMPTY_PLACEHOLDER;
use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::bridge::{BridgeMessage, PushBridge};
use crate::registry::ConnectionId;
use crate::services::realtime_service::{
    NotificationRequest, RealtimeService, RealtimeServiceDependencies,
};
use crate::ApplicationError;

struct FakeConversationRepository {
    conversations: Mutex<HashMap<Uuid, ConversationParticipants>>,
}

#[async_trait]
impl ConversationRepository for FakeConversationRepository {
    async fn get_participants(
        &self,
        application_id: Uuid,
    ) -> DomainResult<Option<ConversationParticipants>> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .get(&application_id)
            .copied())
    }
}

struct FakeMessageRepository {
    messages: Mutex<Vec<Message>>,
    fail_create: AtomicBool,
}

#[async_trait]
impl MessageRepository for FakeMessageRepository {
    async fn create(&self, message: NewMessage) -> DomainResult<Message> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(DomainError::storage("insert failed"));
        }

        let persisted = Message {
            id: Uuid::new_v4(),
            application_id: message.application_id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            content: message.content,
            is_read: false,
            created_at: Utc::now(),
        };
        self.messages.lock().unwrap().push(persisted.clone());
        Ok(persisted)
    }

    async fn mark_read(
        &self,
        application_id: Uuid,
        receiver_id: Uuid,
        message_ids: &[Uuid],
    ) -> DomainResult<Vec<Uuid>> {
        let mut messages = self.messages.lock().unwrap();
        let mut updated = Vec::new();
        for message in messages.iter_mut() {
            if message_ids.contains(&message.id)
                && message.application_id == application_id
                && message.receiver_id == receiver_id
                && !message.is_read
            {
                message.is_read = true;
                updated.push(message.id);
            }
        }
        Ok(updated)
    }

    async fn last_activity_at(&self, user_id: Uuid) -> DomainResult<Option<DateTime<Utc>>> {
        let messages = self.messages.lock().unwrap();
        Ok(messages
            .iter()
            .filter(|m| m.sender_id == user_id || m.receiver_id == user_id)
            .map(|m| m.created_at)
            .max())
    }
}

struct FakeNotificationRepository {
    notifications: Mutex<Vec<Notification>>,
}

#[async_trait]
impl NotificationRepository for FakeNotificationRepository {
    async fn create(&self, notification: &Notification) -> DomainResult<Notification> {
        self.notifications
            .lock()
            .unwrap()
            .push(notification.clone());
        Ok(notification.clone())
    }

    async fn find_unread(&self, user_id: Uuid) -> DomainResult<Vec<Notification>> {
        let mut unread: Vec<Notification> = self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .cloned()
            .collect();
        unread.sort_by_key(|n| n.created_at);
        Ok(unread)
    }

    async fn mark_as_read(&self, notification_id: Uuid, user_id: Uuid) -> DomainResult<bool> {
        let mut notifications = self.notifications.lock().unwrap();
        for notification in notifications.iter_mut() {
            if notification.id == notification_id
                && notification.user_id == user_id
                && !notification.is_read
            {
                notification.is_read = true;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn mark_all_as_read(&self, user_id: Uuid) -> DomainResult<u64> {
        let mut notifications = self.notifications.lock().unwrap();
        let mut count = 0;
        for notification in notifications.iter_mut() {
            if notification.user_id == user_id && !notification.is_read {
                notification.is_read = true;
                count += 1;
            }
        }
        Ok(count)
    }
}

struct FakeUserRepository {
    users: Mutex<Vec<(String, User)>>,
    last_seen_writes: Mutex<Vec<(Uuid, DateTime<Utc>)>>,
}

#[async_trait]
impl UserRepository for FakeUserRepository {
    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|(stored, _)| stored == email)
            .map(|(_, user)| user.clone()))
    }

    async fn find_by_id(&self, user_id: Uuid) -> DomainResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|(_, user)| user.id == user_id)
            .map(|(_, user)| user.clone()))
    }

    async fn find_display(&self, user_ids: &[Uuid]) -> DomainResult<Vec<UserDisplay>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, user)| user_ids.contains(&user.id))
            .map(|(_, user)| UserDisplay::from(user))
            .collect())
    }

    async fn update_last_seen(
        &self,
        user_id: Uuid,
        last_seen_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.last_seen_writes
            .lock()
            .unwrap()
            .push((user_id, last_seen_at));
        Ok(())
    }
}

struct RecordingBridge {
    calls: Mutex<Vec<(String, BridgeMessage)>>,
    fail: AtomicBool,
}

#[async_trait]
impl PushBridge for RecordingBridge {
    async fn send(&self, bridge_id: &str, message: &BridgeMessage) -> crate::ApplicationResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((bridge_id.to_string(), message.clone()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(ApplicationError::bridge("bridge unreachable"));
        }
        Ok(())
    }
}

struct Harness {
    service: RealtimeService,
    conversations: Arc<FakeConversationRepository>,
    messages: Arc<FakeMessageRepository>,
    notifications: Arc<FakeNotificationRepository>,
    users: Arc<FakeUserRepository>,
    bridge: Arc<RecordingBridge>,
    cipher: ContentCipher,
}

fn cipher_key() -> String {
    BASE64.encode(&[9u8; 32])
}

impl Harness {
    fn new() -> Self {
        let conversations = Arc::new(FakeConversationRepository {
            conversations: Mutex::new(HashMap::new()),
        });
        let messages = Arc::new(FakeMessageRepository {
            messages: Mutex::new(Vec::new()),
            fail_create: AtomicBool::new(false),
        });
        let notifications = Arc::new(FakeNotificationRepository {
            notifications: Mutex::new(Vec::new()),
        });
        let users = Arc::new(FakeUserRepository {
            users: Mutex::new(Vec::new()),
            last_seen_writes: Mutex::new(Vec::new()),
        });
        let bridge = Arc::new(RecordingBridge {
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        });
        let cipher = ContentCipher::new(Some(&cipher_key()));

        let service = RealtimeService::new(RealtimeServiceDependencies {
            conversation_repository: conversations.clone(),
            message_repository: messages.clone(),
            notification_repository: notifications.clone(),
            user_repository: users.clone(),
            bridge: Some(bridge.clone()),
            cipher: cipher.clone(),
            sanitize_min_run: 32,
        });

        Self {
            service,
            conversations,
            messages,
            notifications,
            users,
            bridge,
            cipher,
        }
    }

    fn add_user(&self, email: &str, role: UserRole, telegram_id: Option<&str>) -> Uuid {
        let user = User {
            id: Uuid::new_v4(),
            name: Some(email.split('@').next().unwrap_or("user").to_string()),
            avatar: None,
            role,
            telegram_id: telegram_id.map(str::to_string),
            last_seen_at: None,
        };
        let user_id = user.id;
        self.users
            .users
            .lock()
            .unwrap()
            .push((email.to_string(), user));
        user_id
    }

    fn add_conversation(&self, employer_user_id: Uuid, candidate_user_id: Uuid) -> Uuid {
        let application_id = Uuid::new_v4();
        self.conversations.conversations.lock().unwrap().insert(
            application_id,
            ConversationParticipants {
                application_id,
                employer_user_id,
                candidate_user_id,
            },
        );
        application_id
    }

    async fn connect_as(&self, email: &str) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = self.service.connect(tx).await;
        self.service.authenticate(connection_id, email).await;
        (connection_id, rx)
    }

    async fn join(&self, connection_id: ConnectionId, application_id: Uuid) {
        self.service
            .handle_event(
                connection_id,
                ClientEvent::JoinRoom {
                    application_id,
                    user_id: None,
                },
            )
            .await;
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_join_admits_only_participants() {
    let harness = Harness::new();
    let employer = harness.add_user("employer@corp.test", UserRole::Employer, None);
    let candidate = harness.add_user("candidate@mail.test", UserRole::Candidate, None);
    let application_id = harness.add_conversation(employer, candidate);

    let (employer_conn, mut employer_rx) = harness.connect_as("employer@corp.test").await;
    harness.join(employer_conn, application_id).await;
    drain(&mut employer_rx);

    let (candidate_conn, mut candidate_rx) = harness.connect_as("candidate@mail.test").await;
    harness.join(candidate_conn, application_id).await;

    let employer_events = drain(&mut employer_rx);
    assert!(employer_events.contains(&ServerEvent::UserJoined { user_id: candidate }));
    assert!(employer_events.contains(&ServerEvent::Presence {
        user_id: candidate,
        online: true,
        last_seen_at: None,
    }));

    let candidate_events = drain(&mut candidate_rx);
    assert!(candidate_events.contains(&ServerEvent::RoomUsers {
        user_ids: vec![employer],
    }));

    // 非参与者的加入请求是静默无操作
    harness.add_user("outsider@mail.test", UserRole::Candidate, None);
    let (outsider_conn, mut outsider_rx) = harness.connect_as("outsider@mail.test").await;
    harness.join(outsider_conn, application_id).await;

    assert!(drain(&mut outsider_rx).is_empty());
    assert!(drain(&mut employer_rx).is_empty());
    assert!(
        !harness
            .service
            .registry()
            .is_in_room(outsider_conn, &format!("app-{}", application_id))
            .await
    );
}

#[tokio::test]
async fn test_join_nonexistent_conversation_is_noop() {
    let harness = Harness::new();
    harness.add_user("employer@corp.test", UserRole::Employer, None);
    let (conn, mut rx) = harness.connect_as("employer@corp.test").await;

    harness.join(conn, Uuid::new_v4()).await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_send_message_flow() {
    let harness = Harness::new();
    let employer = harness.add_user("employer@corp.test", UserRole::Employer, None);
    let candidate = harness.add_user("candidate@mail.test", UserRole::Candidate, None);
    let application_id = harness.add_conversation(employer, candidate);

    let (employer_conn, mut employer_rx) = harness.connect_as("employer@corp.test").await;
    harness.join(employer_conn, application_id).await;
    let (candidate_conn, mut candidate_rx) = harness.connect_as("candidate@mail.test").await;
    harness.join(candidate_conn, application_id).await;
    drain(&mut employer_rx);
    drain(&mut candidate_rx);

    harness
        .service
        .handle_event(
            employer_conn,
            ClientEvent::SendMessage {
                application_id,
                content: "Hello".to_string(),
                client_message_id: Some("t1".to_string()),
                // 客户端伪造的接收者必须被忽略
                receiver_id: Some(employer),
            },
        )
        .await;

    // 其他成员收到明文广播
    let candidate_events = drain(&mut candidate_rx);
    let new_message = candidate_events
        .iter()
        .find_map(|event| match event {
            ServerEvent::NewMessage(payload) => Some(payload.clone()),
            _ => None,
        })
        .expect("candidate should receive new_message");
    assert_eq!(new_message.content, "Hello");
    assert_eq!(new_message.sender.id, employer);
    assert_eq!(new_message.receiver.id, candidate);
    assert!(!new_message.is_read);

    // 发送者只收到落库确认，绝不回声
    let employer_events = drain(&mut employer_rx);
    assert_eq!(employer_events.len(), 1);
    match &employer_events[0] {
        ServerEvent::MessageSaved { temp_id, id, .. } => {
            assert_eq!(temp_id, "t1");
            assert_eq!(*id, new_message.id);
        }
        other => panic!("expected message_saved, got {:?}", other),
    }

    // 落库内容是混淆过的，接收者由服务端推导
    let stored = harness.messages.messages.lock().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].receiver_id, candidate);
    assert!(stored[0].content.starts_with("ENC:"));
    assert_eq!(harness.cipher.decrypt(&stored[0].content), "Hello");
    drop(stored);

    // 接收者拿到一条持久化通知；MESSAGE 类型不走外部桥
    let notifications = harness.notifications.notifications.lock().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].user_id, candidate);
    assert_eq!(
        notifications[0].notification_type,
        NotificationType::Message
    );
    drop(notifications);
    assert!(harness.bridge.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_send_message_sanitizes_wire_copy() {
    let harness = Harness::new();
    let employer = harness.add_user("employer@corp.test", UserRole::Employer, None);
    let candidate = harness.add_user("candidate@mail.test", UserRole::Candidate, None);
    let application_id = harness.add_conversation(employer, candidate);

    let (employer_conn, _employer_rx) = harness.connect_as("employer@corp.test").await;
    harness.join(employer_conn, application_id).await;
    let (candidate_conn, mut candidate_rx) = harness.connect_as("candidate@mail.test").await;
    harness.join(candidate_conn, application_id).await;
    drain(&mut candidate_rx);

    let blob = "Q".repeat(64);
    harness
        .service
        .handle_event(
            employer_conn,
            ClientEvent::SendMessage {
                application_id,
                content: blob.clone(),
                client_message_id: None,
                receiver_id: None,
            },
        )
        .await;

    let events = drain(&mut candidate_rx);
    let new_message = events
        .iter()
        .find_map(|event| match event {
            ServerEvent::NewMessage(payload) => Some(payload.clone()),
            _ => None,
        })
        .expect("candidate should receive new_message");
    // 消毒后为空的内容以显式占位符投递
    assert_eq!(new_message.content, EMPTY_PLACEHOLDER);

    // 落库副本保留原始内容
    let stored = harness.messages.messages.lock().unwrap();
    assert_eq!(harness.cipher.decrypt(&stored[0].content), blob);
}

#[tokio::test]
async fn test_nonparticipant_send_is_noop() {
    let harness = Harness::new();
    let employer = harness.add_user("employer@corp.test", UserRole::Employer, None);
    let candidate = harness.add_user("candidate@mail.test", UserRole::Candidate, None);
    let application_id = harness.add_conversation(employer, candidate);

    let (employer_conn, mut employer_rx) = harness.connect_as("employer@corp.test").await;
    harness.join(employer_conn, application_id).await;
    drain(&mut employer_rx);

    harness.add_user("outsider@mail.test", UserRole::Candidate, None);
    let (outsider_conn, mut outsider_rx) = harness.connect_as("outsider@mail.test").await;
    harness
        .service
        .handle_event(
            outsider_conn,
            ClientEvent::SendMessage {
                application_id,
                content: "sneaky".to_string(),
                client_message_id: Some("t9".to_string()),
                receiver_id: None,
            },
        )
        .await;

    assert!(drain(&mut employer_rx).is_empty());
    assert!(drain(&mut outsider_rx).is_empty());
    assert!(harness.messages.messages.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_persistence_failure_aborts_before_broadcast_and_ack() {
    let harness = Harness::new();
    let employer = harness.add_user("employer@corp.test", UserRole::Employer, None);
    let candidate = harness.add_user("candidate@mail.test", UserRole::Candidate, None);
    let application_id = harness.add_conversation(employer, candidate);

    let (employer_conn, mut employer_rx) = harness.connect_as("employer@corp.test").await;
    harness.join(employer_conn, application_id).await;
    let (candidate_conn, mut candidate_rx) = harness.connect_as("candidate@mail.test").await;
    harness.join(candidate_conn, application_id).await;
    drain(&mut employer_rx);
    drain(&mut candidate_rx);

    harness.messages.fail_create.store(true, Ordering::SeqCst);
    harness
        .service
        .handle_event(
            employer_conn,
            ClientEvent::SendMessage {
                application_id,
                content: "Hello".to_string(),
                client_message_id: Some("t1".to_string()),
                receiver_id: None,
            },
        )
        .await;

    // 没有广播、没有确认、没有通知
    assert!(drain(&mut employer_rx).is_empty());
    assert!(drain(&mut candidate_rx).is_empty());
    assert!(harness.notifications.notifications.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_mark_read_only_flips_own_unread_messages() {
    let harness = Harness::new();
    let employer = harness.add_user("employer@corp.test", UserRole::Employer, None);
    let candidate = harness.add_user("candidate@mail.test", UserRole::Candidate, None);
    let application_id = harness.add_conversation(employer, candidate);

    // employer -> candidate 未读；candidate -> employer 未读
    let to_candidate = Message {
        id: Uuid::new_v4(),
        application_id,
        sender_id: employer,
        receiver_id: candidate,
        content: "x".to_string(),
        is_read: false,
        created_at: Utc::now(),
    };
    let to_employer = Message {
        id: Uuid::new_v4(),
        application_id,
        sender_id: candidate,
        receiver_id: employer,
        content: "y".to_string(),
        is_read: false,
        created_at: Utc::now(),
    };
    harness
        .messages
        .messages
        .lock()
        .unwrap()
        .extend([to_candidate.clone(), to_employer.clone()]);

    let (employer_conn, mut employer_rx) = harness.connect_as("employer@corp.test").await;
    harness.join(employer_conn, application_id).await;
    let (candidate_conn, mut candidate_rx) = harness.connect_as("candidate@mail.test").await;
    harness.join(candidate_conn, application_id).await;
    drain(&mut employer_rx);
    drain(&mut candidate_rx);

    // 自己发出的消息不能被自己标记，无广播
    harness
        .service
        .handle_event(
            employer_conn,
            ClientEvent::MarkRead {
                application_id,
                message_ids: vec![to_candidate.id],
            },
        )
        .await;
    assert!(drain(&mut employer_rx).is_empty());
    assert!(drain(&mut candidate_rx).is_empty());

    // 接收者标记：两个ID里只有发给自己的那条被翻转并广播
    harness
        .service
        .handle_event(
            candidate_conn,
            ClientEvent::MarkRead {
                application_id,
                message_ids: vec![to_candidate.id, to_employer.id],
            },
        )
        .await;

    let expected = ServerEvent::MessagesRead {
        message_ids: vec![to_candidate.id],
    };
    assert!(drain(&mut employer_rx).contains(&expected));
    assert!(drain(&mut candidate_rx).contains(&expected));

    let stored = harness.messages.messages.lock().unwrap();
    assert!(stored.iter().find(|m| m.id == to_candidate.id).unwrap().is_read);
    assert!(!stored.iter().find(|m| m.id == to_employer.id).unwrap().is_read);
}

#[tokio::test]
async fn test_notify_always_persists_exactly_one_record() {
    let harness = Harness::new();
    let candidate = harness.add_user("candidate@mail.test", UserRole::Candidate, None);

    // 目标离线、类型未映射到桥模板
    harness
        .service
        .notify(NotificationRequest {
            user_id: candidate,
            notification_type: NotificationType::Message,
            title: "New message".to_string(),
            message: "New message on your application".to_string(),
            data: json!({"applicationId": Uuid::new_v4()}),
        })
        .await
        .unwrap();

    let notifications = harness.notifications.notifications.lock().unwrap();
    assert_eq!(notifications.len(), 1);
    assert!(!notifications[0].is_read);
    drop(notifications);
    assert!(harness.bridge.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_notify_bridges_mapped_types_and_survives_bridge_failure() {
    let harness = Harness::new();
    let employer = harness.add_user("employer@corp.test", UserRole::Employer, Some("tg-42"));

    harness.bridge.fail.store(true, Ordering::SeqCst);
    let persisted = harness
        .service
        .notify(NotificationRequest {
            user_id: employer,
            notification_type: NotificationType::ApplicationStatus,
            title: "Application update".to_string(),
            message: "Status changed".to_string(),
            data: json!({"jobTitle": "Rust Engineer", "newStatus": "SHORTLISTED"}),
        })
        .await
        .unwrap();

    // 桥失败不回滚落库
    assert_eq!(
        harness.notifications.notifications.lock().unwrap().len(),
        1
    );
    assert!(!persisted.is_read);

    let calls = harness.bridge.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "tg-42");
    assert_eq!(
        calls[0].1,
        BridgeMessage::ApplicationStatus {
            job_title: "Rust Engineer".to_string(),
            status: "SHORTLISTED".to_string(),
        }
    );
}

#[tokio::test]
async fn test_notify_skips_bridge_without_bridge_id() {
    let harness = Harness::new();
    let employer = harness.add_user("employer@corp.test", UserRole::Employer, None);

    harness
        .service
        .notify(NotificationRequest {
            user_id: employer,
            notification_type: NotificationType::NewJob,
            title: "New job".to_string(),
            message: "Published \"Backend Developer\"".to_string(),
            data: serde_json::Value::Null,
        })
        .await
        .unwrap();

    assert!(harness.bridge.calls.lock().unwrap().is_empty());
    assert_eq!(
        harness.notifications.notifications.lock().unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_disconnect_broadcasts_offline_presence() {
    let harness = Harness::new();
    let employer = harness.add_user("employer@corp.test", UserRole::Employer, None);
    let candidate = harness.add_user("candidate@mail.test", UserRole::Candidate, None);
    let application_id = harness.add_conversation(employer, candidate);

    let (employer_conn, mut employer_rx) = harness.connect_as("employer@corp.test").await;
    harness.join(employer_conn, application_id).await;
    let (candidate_conn, mut candidate_rx) = harness.connect_as("candidate@mail.test").await;
    harness.join(candidate_conn, application_id).await;
    drain(&mut employer_rx);
    drain(&mut candidate_rx);

    harness.service.disconnect(candidate_conn).await;

    let events = drain(&mut employer_rx);
    let last_seen_at = events
        .iter()
        .find_map(|event| match event {
            ServerEvent::UserLeft {
                user_id,
                last_seen_at,
            } if *user_id == candidate => Some(*last_seen_at),
            _ => None,
        })
        .expect("employer should receive user_left");
    assert!(events.contains(&ServerEvent::Presence {
        user_id: candidate,
        online: false,
        last_seen_at: Some(last_seen_at),
    }));

    // 断开后立即可见：离线且 lastSeen 等于断开时刻
    assert!(!harness.service.is_online(candidate).await);
    assert_eq!(
        harness.service.last_seen_ms(candidate).await,
        Some(last_seen_at)
    );

    // 最后在线时间尽力而为地持久化
    let writes = harness.users.last_seen_writes.lock().unwrap();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0, candidate);
}

#[tokio::test]
async fn test_last_seen_falls_back_to_message_activity() {
    let harness = Harness::new();
    let employer = harness.add_user("employer@corp.test", UserRole::Employer, None);
    let candidate = harness.add_user("candidate@mail.test", UserRole::Candidate, None);
    let application_id = harness.add_conversation(employer, candidate);

    let created_at = Utc::now();
    harness.messages.messages.lock().unwrap().push(Message {
        id: Uuid::new_v4(),
        application_id,
        sender_id: candidate,
        receiver_id: employer,
        content: "x".to_string(),
        is_read: false,
        created_at,
    });

    // 本进程从未观测到该用户断开，回退到最近消息活动
    assert_eq!(
        harness.service.last_seen_ms(candidate).await,
        Some(created_at.timestamp_millis())
    );
    assert_eq!(harness.service.last_seen_ms(Uuid::new_v4()).await, None);
}

#[tokio::test]
async fn test_join_user_room_replays_unread_notifications() {
    let harness = Harness::new();
    let candidate = harness.add_user("candidate@mail.test", UserRole::Candidate, None);

    let mut read_notification = Notification::new(
        candidate,
        NotificationType::System,
        "Old",
        "Already read",
        serde_json::Value::Null,
    );
    read_notification.mark_as_read();
    let unread_notification = Notification::new(
        candidate,
        NotificationType::Message,
        "New message",
        "Pending",
        serde_json::Value::Null,
    );
    harness
        .notifications
        .notifications
        .lock()
        .unwrap()
        .extend([read_notification, unread_notification.clone()]);

    let (conn, mut rx) = harness.connect_as("candidate@mail.test").await;
    harness
        .service
        .handle_event(conn, ClientEvent::JoinUserRoom { user_id: candidate })
        .await;

    // 只回放仍未读的通知
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0],
        ServerEvent::Notification(unread_notification.clone())
    );

    // 已订阅后，新通知实时到达
    harness
        .service
        .notify(NotificationRequest {
            user_id: candidate,
            notification_type: NotificationType::Message,
            title: "Another".to_string(),
            message: "Live".to_string(),
            data: serde_json::Value::Null,
        })
        .await
        .unwrap();
    assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test]
async fn test_join_user_room_requires_matching_identity() {
    let harness = Harness::new();
    let employer = harness.add_user("employer@corp.test", UserRole::Employer, None);
    harness.add_user("candidate@mail.test", UserRole::Candidate, None);

    let (conn, mut rx) = harness.connect_as("candidate@mail.test").await;
    harness
        .service
        .handle_event(conn, ClientEvent::JoinUserRoom { user_id: employer })
        .await;

    assert!(
        !harness
            .service
            .registry()
            .is_in_room(conn, &format!("user-{}", employer))
            .await
    );

    // 发给 employer 的通知不会流向这个连接
    harness
        .service
        .notify(NotificationRequest {
            user_id: employer,
            notification_type: NotificationType::System,
            title: "t".to_string(),
            message: "m".to_string(),
            data: serde_json::Value::Null,
        })
        .await
        .unwrap();
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_typing_relayed_to_other_members_only() {
    let harness = Harness::new();
    let employer = harness.add_user("employer@corp.test", UserRole::Employer, None);
    let candidate = harness.add_user("candidate@mail.test", UserRole::Candidate, None);
    let application_id = harness.add_conversation(employer, candidate);

    let (employer_conn, mut employer_rx) = harness.connect_as("employer@corp.test").await;
    let (candidate_conn, mut candidate_rx) = harness.connect_as("candidate@mail.test").await;

    // 加入前的输入状态被忽略
    harness
        .service
        .handle_event(
            employer_conn,
            ClientEvent::Typing {
                application_id,
                is_typing: true,
            },
        )
        .await;
    assert!(drain(&mut candidate_rx).is_empty());

    harness.join(employer_conn, application_id).await;
    harness.join(candidate_conn, application_id).await;
    drain(&mut employer_rx);
    drain(&mut candidate_rx);

    harness
        .service
        .handle_event(
            employer_conn,
            ClientEvent::Typing {
                application_id,
                is_typing: true,
            },
        )
        .await;

    assert_eq!(
        drain(&mut candidate_rx),
        vec![ServerEvent::UserTyping {
            user_id: employer,
            is_typing: true,
        }]
    );
    // 不回发给来源连接
    assert!(drain(&mut employer_rx).is_empty());
}

#[tokio::test]
async fn test_payload_fallback_identity_admits_participant() {
    let harness = Harness::new();
    let employer = harness.add_user("employer@corp.test", UserRole::Employer, None);
    let candidate = harness.add_user("candidate@mail.test", UserRole::Candidate, None);
    let application_id = harness.add_conversation(employer, candidate);

    // 握手身份解析失败（未知凭据）
    let (conn, mut rx) = harness.connect_as("unknown@mail.test").await;
    harness
        .service
        .handle_event(
            conn,
            ClientEvent::JoinRoom {
                application_id,
                user_id: Some(candidate),
            },
        )
        .await;

    assert!(
        harness
            .service
            .registry()
            .is_in_room(conn, &format!("app-{}", application_id))
            .await
    );
    assert!(!drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_unauthenticated_operations_silently_decline() {
    let harness = Harness::new();
    let employer = harness.add_user("employer@corp.test", UserRole::Employer, None);
    let candidate = harness.add_user("candidate@mail.test", UserRole::Candidate, None);
    let application_id = harness.add_conversation(employer, candidate);

    let (conn, mut rx) = harness.connect_as("unknown@mail.test").await;

    harness
        .service
        .handle_event(
            conn,
            ClientEvent::SendMessage {
                application_id,
                content: "anonymous".to_string(),
                client_message_id: None,
                receiver_id: None,
            },
        )
        .await;
    harness
        .service
        .handle_event(
            conn,
            ClientEvent::MarkRead {
                application_id,
                message_ids: vec![Uuid::new_v4()],
            },
        )
        .await;

    assert!(drain(&mut rx).is_empty());
    assert!(harness.messages.messages.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_notification_acknowledgement() {
    let harness = Harness::new();
    let candidate = harness.add_user("candidate@mail.test", UserRole::Candidate, None);
    let employer = harness.add_user("employer@corp.test", UserRole::Employer, None);

    let own = Notification::new(
        candidate,
        NotificationType::Message,
        "t",
        "m",
        serde_json::Value::Null,
    );
    let foreign = Notification::new(
        employer,
        NotificationType::Message,
        "t",
        "m",
        serde_json::Value::Null,
    );
    harness
        .notifications
        .notifications
        .lock()
        .unwrap()
        .extend([own.clone(), foreign.clone()]);

    let (conn, mut rx) = harness.connect_as("candidate@mail.test").await;

    // 别人的通知标不动，无确认
    harness
        .service
        .handle_event(
            conn,
            ClientEvent::MarkNotificationRead {
                notification_id: foreign.id,
            },
        )
        .await;
    assert!(drain(&mut rx).is_empty());

    // 自己的通知翻转并确认
    harness
        .service
        .handle_event(
            conn,
            ClientEvent::MarkNotificationRead {
                notification_id: own.id,
            },
        )
        .await;
    assert_eq!(
        drain(&mut rx),
        vec![ServerEvent::NotificationMarkedRead {
            notification_id: own.id,
        }]
    );

    // 全部已读只对自己的ID生效
    harness
        .service
        .handle_event(
            conn,
            ClientEvent::MarkAllNotificationsRead { user_id: employer },
        )
        .await;
    assert!(drain(&mut rx).is_empty());

    harness
        .service
        .handle_event(
            conn,
            ClientEvent::MarkAllNotificationsRead { user_id: candidate },
        )
        .await;
    assert_eq!(
        drain(&mut rx),
        vec![ServerEvent::AllNotificationsMarkedRead { user_id: candidate }]
    );

    let stored = harness.notifications.notifications.lock().unwrap();
    assert!(stored.iter().find(|n| n.id == own.id).unwrap().is_read);
    assert!(!stored.iter().find(|n| n.id == foreign.id).unwrap().is_read);
}

#[tokio::test]
async fn test_room_broadcasts_reach_subscribers() {
    let harness = Harness::new();
    harness.add_user("candidate@mail.test", UserRole::Candidate, None);
    let (conn, mut rx) = harness.connect_as("candidate@mail.test").await;

    let job_id = Uuid::new_v4();
    harness
        .service
        .handle_event(conn, ClientEvent::JoinJobRoom { job_id })
        .await;

    harness
        .service
        .notify_job_room(
            job_id,
            domain::events::RoomNotificationPayload {
                notification_type: NotificationType::NewJob,
                title: "New job".to_string(),
                message: "Published".to_string(),
                data: serde_json::Value::Null,
            },
        )
        .await;

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        ServerEvent::JobNotification { job_id: id, .. } if *id == job_id
    ));

    // 未订阅的房间收不到
    harness
        .service
        .notify_company_room(
            Uuid::new_v4(),
            domain::events::RoomNotificationPayload {
                notification_type: NotificationType::System,
                title: "t".to_string(),
                message: "m".to_string(),
                data: serde_json::Value::Null,
            },
        )
        .await;
    assert!(drain(&mut rx).is_empty());
}
