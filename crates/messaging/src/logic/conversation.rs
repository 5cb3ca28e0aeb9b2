//! Conversation aggregation
//!
//! A conversation is a derived summary of one thread: who the counterpart
//! is, the newest message as a preview, and how many of their messages are
//! still unread. Conversations are never stored; every pass recomputes them
//! from the message log, which keeps the view trivially consistent with the
//! store.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shared::error::CommonError;
use shared::identity::Identity;
use shared::primitives::{WrappedChronoDateTime, WrappedUuidV4};
use std::collections::HashMap;
use tracing::warn;
use utoipa::ToSchema;

use super::message::Message;
use crate::repository::{MessageRepositoryLike, ProfileRepositoryLike};

/// Fallback display name when a counterpart has no resolvable profile
pub const UNKNOWN_USER: &str = "Unknown User";

/// A derived summary of one thread, relative to the current user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Conversation {
    pub counterpart_id: WrappedUuidV4,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub last_message: String,
    pub last_message_time: WrappedChronoDateTime,
    pub unread_count: u32,
}

/// Response for listing conversations
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct ListConversationsResponse {
    pub conversations: Vec<Conversation>,
}

/// Group a user's messages into per-counterpart conversation summaries.
///
/// `messages` must hold every message involving `current_user`, sorted
/// newest-first by `(created_at, id)`. The first message seen for a
/// counterpart is therefore the newest of that thread and fixes the preview
/// fields; older sightings only accumulate the unread count. Output order
/// follows first sighting, which is `last_message_time` descending.
///
/// Display names are resolved separately; this fold fills in the
/// placeholder.
pub fn fold_conversations(
    current_user: &WrappedUuidV4,
    messages: &[Message],
) -> Vec<Conversation> {
    let mut conversations: Vec<Conversation> = Vec::new();
    let mut index_by_counterpart: HashMap<WrappedUuidV4, usize> = HashMap::new();

    for message in messages {
        let counterpart_id = if &message.sender_id == current_user {
            message.receiver_id
        } else {
            message.sender_id
        };
        let from_counterpart_unread = message.sender_id == counterpart_id && !message.is_read;

        match index_by_counterpart.get(&counterpart_id) {
            None => {
                index_by_counterpart.insert(counterpart_id, conversations.len());
                conversations.push(Conversation {
                    counterpart_id,
                    display_name: UNKNOWN_USER.to_string(),
                    avatar_url: None,
                    last_message: message.content.clone(),
                    last_message_time: message.created_at,
                    unread_count: if from_counterpart_unread { 1 } else { 0 },
                });
            }
            Some(&index) => {
                // Preview fields are write-once: an earlier, newer message
                // already set them. Unread spans the whole thread.
                if from_counterpart_unread {
                    conversations[index].unread_count += 1;
                }
            }
        }
    }

    conversations
}

// --- Logic Functions ---

/// Derive the conversation list for the current user.
///
/// A failed bulk fetch surfaces as a retryable aggregation error; a failed
/// or empty display-name lookup degrades that one conversation to the
/// placeholder rather than failing the pass.
pub async fn list_conversations<R: MessageRepositoryLike + ProfileRepositoryLike>(
    repository: &R,
    identity: &Identity,
) -> Result<ListConversationsResponse, CommonError> {
    let messages = repository
        .get_messages_for_user(&identity.user_id)
        .await
        .map_err(|e| CommonError::AggregationFetch {
            msg: "failed to fetch messages for conversation aggregation".to_string(),
            source: Some(anyhow::Error::new(e)),
        })?;

    let mut conversations = fold_conversations(&identity.user_id, &messages);

    for conversation in &mut conversations {
        match repository.get_profile_by_id(&conversation.counterpart_id).await {
            Ok(Some(profile)) => {
                if let Some(name) = profile.full_name.filter(|n| !n.trim().is_empty()) {
                    conversation.display_name = name;
                }
                conversation.avatar_url = profile.avatar_url;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(counterpart_id = %conversation.counterpart_id, error = %e, "Display name resolution failed");
            }
        }
    }

    Ok(ListConversationsResponse { conversations })
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;
        use shared::primitives::WrappedUuidV7;

        fn message_at(
            seconds: i64,
            sender_id: WrappedUuidV4,
            receiver_id: WrappedUuidV4,
            is_read: bool,
            content: &str,
        ) -> Message {
            let base = chrono::DateTime::parse_from_rfc3339("2026-01-10T08:00:00Z")
                .unwrap()
                .to_utc();
            Message {
                id: WrappedUuidV7::new(),
                sender_id,
                receiver_id,
                content: content.to_string(),
                trip_id: None,
                is_read,
                created_at: WrappedChronoDateTime::new(base + chrono::Duration::seconds(seconds)),
            }
        }

        fn sort_newest_first(messages: &mut [Message]) {
            messages.sort_by(|a, b| {
                (b.created_at, b.id).cmp(&(a.created_at, a.id))
            });
        }

        #[test]
        fn test_fold_groups_one_conversation_per_counterpart() {
            let u1 = WrappedUuidV4::new();
            let u2 = WrappedUuidV4::new();
            let u3 = WrappedUuidV4::new();

            // Example: three messages with u2, one with u3
            let mut messages = vec![
                message_at(1, u2, u1, false, "hi"),
                message_at(2, u1, u2, true, "hello"),
                message_at(3, u2, u1, false, "you there?"),
                message_at(0, u3, u1, false, "ping"),
            ];
            sort_newest_first(&mut messages);

            let conversations = fold_conversations(&u1, &messages);
            assert_eq!(conversations.len(), 2);

            // Ordered by last_message_time descending: u2 first
            assert_eq!(conversations[0].counterpart_id, u2);
            assert_eq!(conversations[0].last_message, "you there?");
            assert_eq!(conversations[0].unread_count, 2);

            assert_eq!(conversations[1].counterpart_id, u3);
            assert_eq!(conversations[1].last_message, "ping");
            assert_eq!(conversations[1].unread_count, 1);
        }

        #[test]
        fn test_fold_preview_is_newest_message() {
            let me = WrappedUuidV4::new();
            let other = WrappedUuidV4::new();

            let mut messages = vec![
                message_at(10, other, me, true, "older"),
                message_at(20, me, other, true, "i sent the newest"),
            ];
            sort_newest_first(&mut messages);

            let conversations = fold_conversations(&me, &messages);
            assert_eq!(conversations.len(), 1);
            assert_eq!(conversations[0].last_message, "i sent the newest");
            // Newest message is mine, so nothing unread
            assert_eq!(conversations[0].unread_count, 0);
        }

        #[test]
        fn test_fold_unread_counts_whole_thread_not_just_newest() {
            let me = WrappedUuidV4::new();
            let other = WrappedUuidV4::new();

            let mut messages = vec![
                message_at(1, other, me, false, "first unread"),
                message_at(2, other, me, false, "second unread"),
                message_at(3, me, other, true, "my reply is newest"),
            ];
            sort_newest_first(&mut messages);

            let conversations = fold_conversations(&me, &messages);
            assert_eq!(conversations[0].unread_count, 2);
        }

        #[test]
        fn test_fold_own_unread_messages_do_not_count() {
            let me = WrappedUuidV4::new();
            let other = WrappedUuidV4::new();

            // My own messages are unread from the counterpart's perspective,
            // never from mine
            let mut messages = vec![message_at(1, me, other, false, "sent, not yet read")];
            sort_newest_first(&mut messages);

            let conversations = fold_conversations(&me, &messages);
            assert_eq!(conversations[0].unread_count, 0);
        }

        #[test]
        fn test_fold_tie_break_on_equal_timestamps() {
            let me = WrappedUuidV4::new();
            let other = WrappedUuidV4::new();

            let older = message_at(5, other, me, true, "older by id");
            std::thread::sleep(std::time::Duration::from_millis(2));
            let newer = message_at(5, other, me, true, "newer by id");
            assert!(older.id < newer.id);

            let mut messages = vec![older, newer];
            sort_newest_first(&mut messages);

            let conversations = fold_conversations(&me, &messages);
            assert_eq!(conversations[0].last_message, "newer by id");
        }

        #[test]
        fn test_fold_no_messages_no_conversations() {
            let me = WrappedUuidV4::new();
            let conversations = fold_conversations(&me, &[]);
            assert!(conversations.is_empty());
        }

        #[test]
        fn test_fold_is_deterministic() {
            let me = WrappedUuidV4::new();
            let a = WrappedUuidV4::new();
            let b = WrappedUuidV4::new();

            let mut messages = vec![
                message_at(1, a, me, false, "from a"),
                message_at(2, me, b, true, "to b"),
                message_at(3, b, me, false, "from b"),
            ];
            sort_newest_first(&mut messages);

            let first = fold_conversations(&me, &messages);
            let second = fold_conversations(&me, &messages);
            assert_eq!(first, second);
        }
    }

    mod integration {
        use super::super::*;
        use crate::logic::event::EventBus;
        use crate::logic::message::{SendMessageRequest, send_message};
        use crate::repository::UpsertProfile;
        use crate::repository::sqlite::repository_fixture;

        #[tokio::test]
        async fn test_list_conversations_resolves_names_with_placeholder() {
            let (_db, repository) = repository_fixture().await;
            let event_bus = EventBus::default();
            let me = Identity::new(WrappedUuidV4::new());
            let named = Identity::new(WrappedUuidV4::new());
            let nameless = Identity::new(WrappedUuidV4::new());

            let now = WrappedChronoDateTime::now();
            repository
                .upsert_profile(&UpsertProfile {
                    id: named.user_id,
                    full_name: Some("Jordan Avery".to_string()),
                    avatar_url: Some("https://cdn.example/jordan.png".to_string()),
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap();

            send_message(
                &repository,
                &event_bus,
                &named,
                SendMessageRequest {
                    receiver_id: me.user_id,
                    content: "when can I pick up the car?".to_string(),
                    trip_id: None,
                },
            )
            .await
            .unwrap();
            send_message(
                &repository,
                &event_bus,
                &nameless,
                SendMessageRequest {
                    receiver_id: me.user_id,
                    content: "hello".to_string(),
                    trip_id: None,
                },
            )
            .await
            .unwrap();

            let response = list_conversations(&repository, &me).await.unwrap();
            assert_eq!(response.conversations.len(), 2);

            let by_counterpart = |id: WrappedUuidV4| {
                response
                    .conversations
                    .iter()
                    .find(|c| c.counterpart_id == id)
                    .unwrap()
                    .clone()
            };
            let named_conversation = by_counterpart(named.user_id);
            assert_eq!(named_conversation.display_name, "Jordan Avery");
            assert_eq!(
                named_conversation.avatar_url.as_deref(),
                Some("https://cdn.example/jordan.png")
            );

            let nameless_conversation = by_counterpart(nameless.user_id);
            assert_eq!(nameless_conversation.display_name, UNKNOWN_USER);
        }

        #[tokio::test]
        async fn test_list_conversations_empty_for_new_user() {
            let (_db, repository) = repository_fixture().await;
            let me = Identity::new(WrappedUuidV4::new());

            let response = list_conversations(&repository, &me).await.unwrap();
            assert!(response.conversations.is_empty());
        }
    }
}
