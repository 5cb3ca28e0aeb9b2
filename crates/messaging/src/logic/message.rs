//! Message domain model and logic
//!
//! A message is one row of the append-mostly log: content exchanged between
//! exactly two users, optionally tied to a trip. After insert only the read
//! flag changes, and only through `mark_thread_read`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shared::error::CommonError;
use shared::identity::Identity;
use shared::primitives::{WrappedChronoDateTime, WrappedUuidV4, WrappedUuidV7};
use tracing::debug;
use utoipa::ToSchema;

use super::event::{EventBus, MessageEvent};
use crate::repository::{CreateMessage, MessageRepositoryLike};

/// A message between two users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Message {
    pub id: WrappedUuidV7,
    pub sender_id: WrappedUuidV4,
    pub receiver_id: WrappedUuidV4,
    pub content: String,
    /// Booking context this message relates to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<WrappedUuidV4>,
    pub is_read: bool,
    pub created_at: WrappedChronoDateTime,
}

/// Request to send a message to another user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct SendMessageRequest {
    pub receiver_id: WrappedUuidV4,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<WrappedUuidV4>,
}

pub type SendMessageResponse = Message;

/// Response for marking a thread read
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct MarkThreadReadResponse {
    /// Number of messages flipped to read
    pub updated: u64,
}

// --- Logic Functions ---

/// Validate and append a new message to the store.
///
/// Validation happens before any store call; a store failure after
/// validation surfaces as a retryable delivery error so callers keep their
/// input. On success the persisted message is broadcast on the event bus.
pub async fn send_message<R: MessageRepositoryLike>(
    repository: &R,
    event_bus: &EventBus,
    identity: &Identity,
    request: SendMessageRequest,
) -> Result<SendMessageResponse, CommonError> {
    let content = request.content.trim();
    if content.is_empty() {
        return Err(CommonError::Validation {
            msg: "message content must not be empty".to_string(),
            source: None,
        });
    }
    if request.receiver_id == identity.user_id {
        return Err(CommonError::Validation {
            msg: "sender and receiver must differ".to_string(),
            source: None,
        });
    }

    let message = Message {
        id: WrappedUuidV7::new(),
        sender_id: identity.user_id,
        receiver_id: request.receiver_id,
        content: content.to_string(),
        trip_id: request.trip_id,
        is_read: false,
        created_at: WrappedChronoDateTime::now(),
    };

    let create_params = CreateMessage {
        id: message.id,
        sender_id: message.sender_id,
        receiver_id: message.receiver_id,
        content: message.content.clone(),
        trip_id: message.trip_id,
        is_read: message.is_read,
        created_at: message.created_at,
    };

    repository
        .insert_message(&create_params)
        .await
        .map_err(|e| CommonError::Delivery {
            msg: "failed to persist message".to_string(),
            source: Some(anyhow::Error::new(e)),
        })?;

    debug!(message_id = %message.id, receiver_id = %message.receiver_id, "Message sent");

    // Publish event; a bus with no subscribers is not an error
    let _ = event_bus.publish(MessageEvent::message_inserted(message.clone()));

    Ok(message)
}

/// Mark every unread message the counterpart sent to the caller as read.
pub async fn mark_thread_read<R: MessageRepositoryLike>(
    repository: &R,
    event_bus: &EventBus,
    identity: &Identity,
    counterpart_id: WrappedUuidV4,
) -> Result<MarkThreadReadResponse, CommonError> {
    let updated = repository
        .mark_messages_read(&identity.user_id, &counterpart_id)
        .await?;

    if updated > 0 {
        debug!(reader_id = %identity.user_id, counterpart_id = %counterpart_id, updated, "Thread marked read");
        let _ = event_bus.publish(MessageEvent::thread_read(identity.user_id, counterpart_id));
    }

    Ok(MarkThreadReadResponse { updated })
}
