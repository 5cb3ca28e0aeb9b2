//! Thread retrieval
//!
//! A thread is the full set of messages exchanged between the current user
//! and one counterpart, ordered for display as a transcript.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shared::error::CommonError;
use shared::identity::Identity;
use shared::primitives::WrappedUuidV4;
use utoipa::ToSchema;

use super::message::Message;
use crate::repository::MessageRepositoryLike;

/// Response for reading a thread
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct GetThreadResponse {
    pub messages: Vec<Message>,
}

// --- Logic Functions ---

/// Return the transcript between the current user and the counterpart,
/// oldest first. A pair with no history yields an empty transcript, not an
/// error.
pub async fn read_thread<R: MessageRepositoryLike>(
    repository: &R,
    identity: &Identity,
    counterpart_id: WrappedUuidV4,
) -> Result<GetThreadResponse, CommonError> {
    let messages = repository
        .get_messages_between(&identity.user_id, &counterpart_id)
        .await?;
    Ok(GetThreadResponse { messages })
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;
        use crate::logic::event::EventBus;
        use crate::logic::message::{SendMessageRequest, send_message};
        use crate::repository::sqlite::repository_fixture;

        #[tokio::test]
        async fn test_read_thread_is_transcript_ordered() {
            let (_db, repository) = repository_fixture().await;
            let event_bus = EventBus::default();
            let renter = Identity::new(WrappedUuidV4::new());
            let host = Identity::new(WrappedUuidV4::new());

            for (who, to, content) in [
                (&renter, host.user_id, "hi"),
                (&host, renter.user_id, "hello"),
                (&renter, host.user_id, "you there?"),
            ] {
                send_message(
                    &repository,
                    &event_bus,
                    who,
                    SendMessageRequest {
                        receiver_id: to,
                        content: content.to_string(),
                        trip_id: None,
                    },
                )
                .await
                .unwrap();
            }

            let thread = read_thread(&repository, &renter, host.user_id)
                .await
                .unwrap();
            let contents: Vec<_> = thread.messages.iter().map(|m| m.content.as_str()).collect();
            assert_eq!(contents, vec!["hi", "hello", "you there?"]);

            // Both participants see the same transcript
            let mirrored = read_thread(&repository, &host, renter.user_id)
                .await
                .unwrap();
            assert_eq!(mirrored.messages, thread.messages);
        }

        #[tokio::test]
        async fn test_read_thread_empty_pair() {
            let (_db, repository) = repository_fixture().await;
            let me = Identity::new(WrappedUuidV4::new());

            let thread = read_thread(&repository, &me, WrappedUuidV4::new())
                .await
                .unwrap();
            assert!(thread.messages.is_empty());
        }

        #[tokio::test]
        async fn test_read_thread_excludes_third_parties() {
            let (_db, repository) = repository_fixture().await;
            let event_bus = EventBus::default();
            let me = Identity::new(WrappedUuidV4::new());
            let counterpart = Identity::new(WrappedUuidV4::new());
            let stranger = Identity::new(WrappedUuidV4::new());

            send_message(
                &repository,
                &event_bus,
                &me,
                SendMessageRequest {
                    receiver_id: counterpart.user_id,
                    content: "ours".to_string(),
                    trip_id: None,
                },
            )
            .await
            .unwrap();
            send_message(
                &repository,
                &event_bus,
                &stranger,
                SendMessageRequest {
                    receiver_id: counterpart.user_id,
                    content: "someone else's thread".to_string(),
                    trip_id: None,
                },
            )
            .await
            .unwrap();

            let thread = read_thread(&repository, &me, counterpart.user_id)
                .await
                .unwrap();
            assert_eq!(thread.messages.len(), 1);
            assert_eq!(thread.messages[0].content, "ours");
        }
    }
}
