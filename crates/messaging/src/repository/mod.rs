//! Repository layer for the messaging crate
//! Contains trait definitions and implementations for message and profile storage

pub mod sqlite;

use async_trait::async_trait;
use shared::{
    error::CommonError,
    primitives::{WrappedChronoDateTime, WrappedUuidV4, WrappedUuidV7},
};

pub use sqlite::Repository;

use crate::logic::{message::Message, profile::Profile};

// --- Message Repository Types ---

/// Parameters for inserting a new message
#[derive(Debug, Clone)]
pub struct CreateMessage {
    pub id: WrappedUuidV7,
    pub sender_id: WrappedUuidV4,
    pub receiver_id: WrappedUuidV4,
    pub content: String,
    pub trip_id: Option<WrappedUuidV4>,
    pub is_read: bool,
    pub created_at: WrappedChronoDateTime,
}

// --- Profile Repository Types ---

/// Parameters for upserting a profile
#[derive(Debug, Clone)]
pub struct UpsertProfile {
    pub id: WrappedUuidV4,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: WrappedChronoDateTime,
    pub updated_at: WrappedChronoDateTime,
}

// --- Repository Traits ---

/// Repository trait for message operations
#[async_trait]
pub trait MessageRepositoryLike: Send + Sync {
    /// Insert a new message (single durable write)
    async fn insert_message(&self, params: &CreateMessage) -> Result<(), CommonError>;

    /// Get a message by ID
    async fn get_message_by_id(&self, id: &WrappedUuidV7)
    -> Result<Option<Message>, CommonError>;

    /// Get every message where the user is sender or receiver, newest first
    /// (descending `(created_at, id)`)
    async fn get_messages_for_user(
        &self,
        user_id: &WrappedUuidV4,
    ) -> Result<Vec<Message>, CommonError>;

    /// Get every message exchanged between the pair, oldest first
    /// (ascending `(created_at, id)`)
    async fn get_messages_between(
        &self,
        user_id: &WrappedUuidV4,
        counterpart_id: &WrappedUuidV4,
    ) -> Result<Vec<Message>, CommonError>;

    /// Flip the read flag on every unread message the counterpart sent to the
    /// reader. Returns the number of rows updated.
    async fn mark_messages_read(
        &self,
        reader_id: &WrappedUuidV4,
        counterpart_id: &WrappedUuidV4,
    ) -> Result<u64, CommonError>;
}

/// Repository trait for profile operations
#[async_trait]
pub trait ProfileRepositoryLike: Send + Sync {
    /// Insert or update a profile
    async fn upsert_profile(&self, params: &UpsertProfile) -> Result<(), CommonError>;

    /// Get a profile by user ID
    async fn get_profile_by_id(
        &self,
        id: &WrappedUuidV4,
    ) -> Result<Option<Profile>, CommonError>;
}

/// Combined repository trait for all messaging operations
#[async_trait]
pub trait MessagingRepositoryLike: MessageRepositoryLike + ProfileRepositoryLike {}

// Blanket implementation for any type that implements all traits
impl<T> MessagingRepositoryLike for T where T: MessageRepositoryLike + ProfileRepositoryLike {}
