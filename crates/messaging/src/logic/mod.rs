//! Logic layer for the messaging crate
//! Contains domain models and business logic for messages, conversations,
//! threads, events, and inbox sessions

pub mod conversation;
pub mod event;
pub mod message;
pub mod profile;
pub mod session;
pub mod thread;

// Re-export commonly used types
pub use conversation::Conversation;
pub use event::{EventBus, EventRx, EventTx, MessageEvent, MessageEventKind, create_event_channel};
pub use message::Message;
pub use session::{InboxSession, SessionState};
