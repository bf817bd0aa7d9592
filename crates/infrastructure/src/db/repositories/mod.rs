//! Postgres 仓储实现

pub mod conversation_repository_impl;
pub mod message_repository_impl;
pub mod notification_repository_impl;
pub mod user_repository_impl;

pub use conversation_repository_impl::PgConversationRepository;
pub use message_repository_impl::PgMessageRepository;
pub use notification_repository_impl::PgNotificationRepository;
pub use user_repository_impl::PgUserRepository;
