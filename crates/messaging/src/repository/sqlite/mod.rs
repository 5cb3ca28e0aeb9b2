//! SQLite repository implementation for the messaging crate

use std::collections::BTreeMap;

use anyhow::Context;
use shared::{
    error::CommonError,
    libsql::Migrations,
    primitives::{WrappedChronoDateTime, WrappedUuidV4, WrappedUuidV7},
};
use tracing::trace;

use crate::logic::{message::Message, profile::Profile};
use crate::repository::{
    CreateMessage, MessageRepositoryLike, ProfileRepositoryLike, UpsertProfile,
};

/// Embedded schema migrations, applied in filename order.
pub fn migrations() -> Migrations {
    BTreeMap::from([
        (
            "0001_messaging.up.sql",
            include_str!("../../../migrations/0001_messaging.up.sql"),
        ),
        (
            "0001_messaging.down.sql",
            include_str!("../../../migrations/0001_messaging.down.sql"),
        ),
    ])
}

/// SQLite repository for messaging data
#[derive(Clone)]
pub struct Repository {
    conn: shared::libsql::Connection,
}

impl Repository {
    /// Create a new repository instance
    pub fn new(conn: shared::libsql::Connection) -> Self {
        Self { conn }
    }

    /// Get the underlying connection
    pub fn connection(&self) -> &shared::libsql::Connection {
        &self.conn
    }
}

// --- Row Conversions ---

const MESSAGE_COLUMNS: &str = "id, sender_id, receiver_id, content, trip_id, is_read, created_at";

fn message_from_row(row: &libsql::Row) -> Result<Message, CommonError> {
    let trip_id = match row.get_value(4)? {
        libsql::Value::Null => None,
        libsql::Value::Text(s) => Some(WrappedUuidV4::try_from(s)?),
        _ => {
            return Err(CommonError::Repository {
                msg: "unexpected column type for trip_id".to_string(),
                source: None,
            });
        }
    };

    Ok(Message {
        id: row.get::<WrappedUuidV7>(0)?,
        sender_id: row.get::<WrappedUuidV4>(1)?,
        receiver_id: row.get::<WrappedUuidV4>(2)?,
        content: row.get::<String>(3)?,
        trip_id,
        is_read: row.get::<i64>(5)? != 0,
        created_at: row.get::<WrappedChronoDateTime>(6)?,
    })
}

fn profile_from_row(row: &libsql::Row) -> Result<Profile, CommonError> {
    Ok(Profile {
        id: row.get::<WrappedUuidV4>(0)?,
        full_name: row.get::<Option<String>>(1)?,
        avatar_url: row.get::<Option<String>>(2)?,
        created_at: row.get::<WrappedChronoDateTime>(3)?,
        updated_at: row.get::<WrappedChronoDateTime>(4)?,
    })
}

async fn collect_messages(mut rows: libsql::Rows) -> Result<Vec<Message>, CommonError> {
    let mut items = Vec::new();
    while let Some(row) = rows.next().await? {
        items.push(message_from_row(&row)?);
    }
    Ok(items)
}

// --- Message Repository Implementation ---

#[async_trait::async_trait]
impl MessageRepositoryLike for Repository {
    async fn insert_message(&self, params: &CreateMessage) -> Result<(), CommonError> {
        trace!(message_id = %params.id, sender_id = %params.sender_id, receiver_id = %params.receiver_id, "Inserting message");
        let trip_id: libsql::Value = match params.trip_id {
            Some(trip_id) => trip_id.into(),
            None => libsql::Value::Null,
        };

        self.conn
            .execute(
                "INSERT INTO messages (id, sender_id, receiver_id, content, trip_id, is_read, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                libsql::params![
                    params.id,
                    params.sender_id,
                    params.receiver_id,
                    params.content.clone(),
                    trip_id,
                    params.is_read as i64,
                    params.created_at,
                ],
            )
            .await
            .context("Failed to insert message")
            .map_err(|e| CommonError::Repository {
                msg: e.to_string(),
                source: Some(e),
            })?;
        trace!(message_id = %params.id, "Message inserted");
        Ok(())
    }

    async fn get_message_by_id(
        &self,
        id: &WrappedUuidV7,
    ) -> Result<Option<Message>, CommonError> {
        trace!(message_id = %id, "Getting message by ID");
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1 LIMIT 1"),
                libsql::params![*id],
            )
            .await
            .context("Failed to get message by id")
            .map_err(|e| CommonError::Repository {
                msg: e.to_string(),
                source: Some(e),
            })?;

        let message = match rows.next().await? {
            Some(row) => Some(message_from_row(&row)?),
            None => None,
        };
        trace!(message_id = %id, found = message.is_some(), "Got message by ID");
        Ok(message)
    }

    async fn get_messages_for_user(
        &self,
        user_id: &WrappedUuidV4,
    ) -> Result<Vec<Message>, CommonError> {
        trace!(user_id = %user_id, "Listing messages for user");
        let rows = self
            .conn
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages \
                     WHERE sender_id = ?1 OR receiver_id = ?1 \
                     ORDER BY created_at DESC, id DESC"
                ),
                libsql::params![*user_id],
            )
            .await
            .context("Failed to get messages for user")
            .map_err(|e| CommonError::Repository {
                msg: e.to_string(),
                source: Some(e),
            })?;

        let items = collect_messages(rows).await?;
        trace!(user_id = %user_id, count = items.len(), "Listed messages for user");
        Ok(items)
    }

    async fn get_messages_between(
        &self,
        user_id: &WrappedUuidV4,
        counterpart_id: &WrappedUuidV4,
    ) -> Result<Vec<Message>, CommonError> {
        trace!(user_id = %user_id, counterpart_id = %counterpart_id, "Listing messages between pair");
        let rows = self
            .conn
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages \
                     WHERE (sender_id = ?1 AND receiver_id = ?2) \
                        OR (sender_id = ?2 AND receiver_id = ?1) \
                     ORDER BY created_at ASC, id ASC"
                ),
                libsql::params![*user_id, *counterpart_id],
            )
            .await
            .context("Failed to get messages between pair")
            .map_err(|e| CommonError::Repository {
                msg: e.to_string(),
                source: Some(e),
            })?;

        let items = collect_messages(rows).await?;
        trace!(user_id = %user_id, counterpart_id = %counterpart_id, count = items.len(), "Listed messages between pair");
        Ok(items)
    }

    async fn mark_messages_read(
        &self,
        reader_id: &WrappedUuidV4,
        counterpart_id: &WrappedUuidV4,
    ) -> Result<u64, CommonError> {
        trace!(reader_id = %reader_id, counterpart_id = %counterpart_id, "Marking thread read");
        let updated = self
            .conn
            .execute(
                "UPDATE messages SET is_read = 1 \
                 WHERE receiver_id = ?1 AND sender_id = ?2 AND is_read = 0",
                libsql::params![*reader_id, *counterpart_id],
            )
            .await
            .context("Failed to mark messages read")
            .map_err(|e| CommonError::Repository {
                msg: e.to_string(),
                source: Some(e),
            })?;
        trace!(reader_id = %reader_id, counterpart_id = %counterpart_id, updated, "Marked thread read");
        Ok(updated)
    }
}

// --- Profile Repository Implementation ---

#[async_trait::async_trait]
impl ProfileRepositoryLike for Repository {
    async fn upsert_profile(&self, params: &UpsertProfile) -> Result<(), CommonError> {
        trace!(profile_id = %params.id, "Upserting profile");
        let full_name: libsql::Value = match params.full_name.clone() {
            Some(value) => value.into(),
            None => libsql::Value::Null,
        };
        let avatar_url: libsql::Value = match params.avatar_url.clone() {
            Some(value) => value.into(),
            None => libsql::Value::Null,
        };
        self.conn
            .execute(
                "INSERT INTO profiles (id, full_name, avatar_url, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(id) DO UPDATE SET \
                   full_name = excluded.full_name, \
                   avatar_url = excluded.avatar_url, \
                   updated_at = excluded.updated_at",
                libsql::params![
                    params.id,
                    full_name,
                    avatar_url,
                    params.created_at,
                    params.updated_at,
                ],
            )
            .await
            .context("Failed to upsert profile")
            .map_err(|e| CommonError::Repository {
                msg: e.to_string(),
                source: Some(e),
            })?;
        trace!(profile_id = %params.id, "Profile upserted");
        Ok(())
    }

    async fn get_profile_by_id(
        &self,
        id: &WrappedUuidV4,
    ) -> Result<Option<Profile>, CommonError> {
        trace!(profile_id = %id, "Getting profile by ID");
        let mut rows = self
            .conn
            .query(
                "SELECT id, full_name, avatar_url, created_at, updated_at \
                 FROM profiles WHERE id = ?1 LIMIT 1",
                libsql::params![*id],
            )
            .await
            .context("Failed to get profile by id")
            .map_err(|e| CommonError::Repository {
                msg: e.to_string(),
                source: Some(e),
            })?;

        let profile = match rows.next().await? {
            Some(row) => Some(profile_from_row(&row)?),
            None => None,
        };
        trace!(profile_id = %id, found = profile.is_some(), "Got profile by ID");
        Ok(profile)
    }
}

// --- Test Fixtures ---

/// Open a repository over a fresh in-memory database with migrations applied.
#[cfg(test)]
pub async fn repository_fixture() -> (libsql::Database, Repository) {
    let (db, conn) = shared::test_utils::setup_in_memory_database(&migrations())
        .await
        .unwrap();
    (db, Repository::new(conn))
}
