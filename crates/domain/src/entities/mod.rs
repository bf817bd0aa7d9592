//! 实体模块

pub mod conversation;
pub mod message;
pub mod notification;
pub mod session;
pub mod user;

pub use conversation::ConversationParticipants;
pub use message::Message;
pub use notification::{Notification, NotificationType};
pub use session::LiveSession;
pub use user::{User, UserDisplay, UserRole};
