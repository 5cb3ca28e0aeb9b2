//! Inbox session orchestration
//!
//! An `InboxSession` is what one connected client holds open: the current
//! user, the selected counterpart, and the derived views (conversation list
//! and open thread). It processes user actions and bus events one at a time
//! and re-derives its views from the store rather than patching them, so the
//! store stays the single source of truth.
//!
//! Re-derivations are ticketed against a monotonically increasing epoch: a
//! derivation that was overtaken by a newer one is dropped instead of
//! overwriting fresher state (last-write-wins on the visible state).
//!
//! Every error is absorbed at this boundary. A failed aggregation leaves an
//! empty list and a recorded error; a failed send leaves the compose buffer
//! intact for retry; nothing tears the session down.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use shared::error::CommonError;
use shared::identity::Identity;
use shared::primitives::WrappedUuidV4;
use tracing::{debug, warn};

use super::conversation::{Conversation, list_conversations};
use super::event::{EventBus, MessageEvent};
use super::message::{Message, SendMessageRequest, mark_thread_read, send_message};
use super::thread::read_thread;
use crate::repository::{MessageRepositoryLike, ProfileRepositoryLike};

/// Which conversation, if any, the session has open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    NoConversationSelected,
    ConversationSelected { counterpart_id: WrappedUuidV4 },
}

/// One client's open inbox
pub struct InboxSession<R: MessageRepositoryLike + ProfileRepositoryLike> {
    repository: Arc<R>,
    event_bus: EventBus,
    identity: Identity,
    state: SessionState,
    conversations: Vec<Conversation>,
    thread: Vec<Message>,
    compose: String,
    last_error: Option<String>,
    refresh_epoch: Arc<AtomicU64>,
}

impl<R: MessageRepositoryLike + ProfileRepositoryLike> InboxSession<R> {
    /// Open a session for an authenticated user and load the conversation
    /// list.
    pub async fn open(repository: Arc<R>, event_bus: EventBus, identity: Identity) -> Self {
        let mut session = Self {
            repository,
            event_bus,
            identity,
            state: SessionState::NoConversationSelected,
            conversations: Vec::new(),
            thread: Vec::new(),
            compose: String::new(),
            last_error: None,
            refresh_epoch: Arc::new(AtomicU64::new(0)),
        };
        session.refresh().await;
        session
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn thread(&self) -> &[Message] {
        &self.thread
    }

    pub fn compose(&self) -> &str {
        &self.compose
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Select a counterpart, load the thread, and mark it read.
    pub async fn select_conversation(&mut self, counterpart_id: WrappedUuidV4) {
        debug!(counterpart_id = %counterpart_id, "Selecting conversation");
        self.state = SessionState::ConversationSelected { counterpart_id };

        match read_thread(self.repository.as_ref(), &self.identity, counterpart_id).await {
            Ok(response) => {
                self.thread = response.messages;
                self.last_error = None;
            }
            Err(e) => {
                warn!(counterpart_id = %counterpart_id, error = %e, "Thread load failed");
                self.thread.clear();
                self.last_error = Some(e.to_string());
                return;
            }
        }

        // Opening a thread is what flips its unread messages; the published
        // event refreshes this user's other sessions too.
        if let Err(e) = mark_thread_read(
            self.repository.as_ref(),
            &self.event_bus,
            &self.identity,
            counterpart_id,
        )
        .await
        {
            warn!(counterpart_id = %counterpart_id, error = %e, "Mark thread read failed");
        }
    }

    /// Send the given content to the selected counterpart.
    ///
    /// The content is held in the compose buffer while in flight: cleared on
    /// success, retained on failure so the user can resubmit without
    /// retyping.
    pub async fn send_message(&mut self, content: &str) -> Result<Message, CommonError> {
        let counterpart_id = match &self.state {
            SessionState::ConversationSelected { counterpart_id } => *counterpart_id,
            SessionState::NoConversationSelected => {
                return Err(CommonError::Validation {
                    msg: "no conversation selected".to_string(),
                    source: None,
                });
            }
        };

        self.compose = content.to_string();
        let result = send_message(
            self.repository.as_ref(),
            &self.event_bus,
            &self.identity,
            SendMessageRequest {
                receiver_id: counterpart_id,
                content: content.to_string(),
                trip_id: None,
            },
        )
        .await;

        match result {
            Ok(message) => {
                self.compose.clear();
                self.last_error = None;
                Ok(message)
            }
            Err(e) => {
                // Compose buffer keeps the content for retry
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// React to a bus event: re-derive the conversation list and, when a
    /// thread is open, its transcript. Events that do not involve this
    /// session's user are ignored.
    pub async fn handle_event(&mut self, event: &MessageEvent) {
        if !event.concerns(&self.identity.user_id) {
            return;
        }
        debug!(event_id = %event.id, "Re-deriving after message event");
        self.refresh().await;
    }

    /// Full re-derivation of the visible state from the store.
    pub async fn refresh(&mut self) {
        let ticket = self.issue_ticket();

        let conversations = list_conversations(self.repository.as_ref(), &self.identity).await;
        let thread = match &self.state {
            SessionState::ConversationSelected { counterpart_id } => Some(
                read_thread(self.repository.as_ref(), &self.identity, *counterpart_id).await,
            ),
            SessionState::NoConversationSelected => None,
        };

        if !self.is_current(ticket) {
            debug!(ticket, "Dropping superseded re-derivation");
            return;
        }

        match conversations {
            Ok(response) => {
                self.conversations = response.conversations;
                self.last_error = None;
            }
            Err(e) => {
                warn!(error = %e, "Conversation aggregation failed");
                self.conversations.clear();
                self.last_error = Some(e.to_string());
            }
        }

        if let Some(result) = thread {
            match result {
                Ok(response) => self.thread = response.messages,
                Err(e) => {
                    warn!(error = %e, "Thread re-derivation failed");
                    self.thread.clear();
                    self.last_error = Some(e.to_string());
                }
            }
        }
    }

    fn issue_ticket(&self) -> u64 {
        self.refresh_epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.refresh_epoch.load(Ordering::SeqCst) == ticket
    }
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;
        use crate::logic::event::MessageEventKind;
        use crate::repository::sqlite::{Repository, repository_fixture};
        use crate::repository::{CreateMessage, UpsertProfile};
        use async_trait::async_trait;
        use shared::primitives::{WrappedChronoDateTime, WrappedUuidV7};
        use std::sync::atomic::AtomicBool;

        /// Repository double that can be switched into a failing mode, for
        /// exercising delivery and aggregation failure paths.
        struct FlakyRepository {
            inner: Repository,
            failing: Arc<AtomicBool>,
        }

        impl FlakyRepository {
            fn failure(&self) -> CommonError {
                CommonError::Repository {
                    msg: "connection lost".to_string(),
                    source: None,
                }
            }
        }

        #[async_trait]
        impl MessageRepositoryLike for FlakyRepository {
            async fn insert_message(&self, params: &CreateMessage) -> Result<(), CommonError> {
                if self.failing.load(Ordering::SeqCst) {
                    return Err(self.failure());
                }
                self.inner.insert_message(params).await
            }

            async fn get_message_by_id(
                &self,
                id: &WrappedUuidV7,
            ) -> Result<Option<Message>, CommonError> {
                self.inner.get_message_by_id(id).await
            }

            async fn get_messages_for_user(
                &self,
                user_id: &WrappedUuidV4,
            ) -> Result<Vec<Message>, CommonError> {
                if self.failing.load(Ordering::SeqCst) {
                    return Err(self.failure());
                }
                self.inner.get_messages_for_user(user_id).await
            }

            async fn get_messages_between(
                &self,
                user_id: &WrappedUuidV4,
                counterpart_id: &WrappedUuidV4,
            ) -> Result<Vec<Message>, CommonError> {
                if self.failing.load(Ordering::SeqCst) {
                    return Err(self.failure());
                }
                self.inner.get_messages_between(user_id, counterpart_id).await
            }

            async fn mark_messages_read(
                &self,
                reader_id: &WrappedUuidV4,
                counterpart_id: &WrappedUuidV4,
            ) -> Result<u64, CommonError> {
                self.inner.mark_messages_read(reader_id, counterpart_id).await
            }
        }

        #[async_trait]
        impl crate::repository::ProfileRepositoryLike for FlakyRepository {
            async fn upsert_profile(&self, params: &UpsertProfile) -> Result<(), CommonError> {
                self.inner.upsert_profile(params).await
            }

            async fn get_profile_by_id(
                &self,
                id: &WrappedUuidV4,
            ) -> Result<Option<crate::logic::profile::Profile>, CommonError> {
                self.inner.get_profile_by_id(id).await
            }
        }

        async fn seed_message(
            repository: &Repository,
            sender_id: WrappedUuidV4,
            receiver_id: WrappedUuidV4,
            content: &str,
        ) {
            repository
                .insert_message(&CreateMessage {
                    id: WrappedUuidV7::new(),
                    sender_id,
                    receiver_id,
                    content: content.to_string(),
                    trip_id: None,
                    is_read: false,
                    created_at: WrappedChronoDateTime::now(),
                })
                .await
                .unwrap();
        }

        #[tokio::test]
        async fn test_open_loads_conversations() {
            let (_db, repository) = repository_fixture().await;
            let me = Identity::new(WrappedUuidV4::new());
            let host = WrappedUuidV4::new();
            seed_message(&repository, host, me.user_id, "welcome").await;

            let session =
                InboxSession::open(Arc::new(repository), EventBus::default(), me).await;
            assert_eq!(*session.state(), SessionState::NoConversationSelected);
            assert_eq!(session.conversations().len(), 1);
            assert_eq!(session.conversations()[0].counterpart_id, host);
            assert_eq!(session.conversations()[0].unread_count, 1);
        }

        #[tokio::test]
        async fn test_select_conversation_loads_thread_and_marks_read() {
            let (_db, repository) = repository_fixture().await;
            let me = Identity::new(WrappedUuidV4::new());
            let host = WrappedUuidV4::new();
            seed_message(&repository, host, me.user_id, "first").await;
            seed_message(&repository, host, me.user_id, "second").await;

            let event_bus = EventBus::default();
            let mut rx = event_bus.subscribe();
            let mut session =
                InboxSession::open(Arc::new(repository), event_bus, me).await;

            session.select_conversation(host).await;
            assert_eq!(
                *session.state(),
                SessionState::ConversationSelected { counterpart_id: host }
            );
            assert_eq!(session.thread().len(), 2);

            // Opening the thread flips the unread messages and announces it
            let event = rx.recv().await.unwrap();
            match event.kind {
                MessageEventKind::ThreadRead { counterpart_id, .. } => {
                    assert_eq!(counterpart_id, host);
                }
                _ => panic!("Expected ThreadRead event"),
            }

            session.refresh().await;
            assert_eq!(session.conversations()[0].unread_count, 0);
        }

        #[tokio::test]
        async fn test_send_requires_selected_conversation() {
            let (_db, repository) = repository_fixture().await;
            let me = Identity::new(WrappedUuidV4::new());
            let mut session =
                InboxSession::open(Arc::new(repository), EventBus::default(), me).await;

            let err = session.send_message("hello").await.unwrap_err();
            assert!(matches!(err, CommonError::Validation { .. }));
        }

        #[tokio::test]
        async fn test_send_clears_compose_on_success() {
            let (_db, repository) = repository_fixture().await;
            let me = Identity::new(WrappedUuidV4::new());
            let host = WrappedUuidV4::new();
            let mut session =
                InboxSession::open(Arc::new(repository), EventBus::default(), me).await;

            session.select_conversation(host).await;
            let sent = session.send_message("is the car still free?").await.unwrap();
            assert_eq!(sent.receiver_id, host);
            assert_eq!(session.compose(), "");
        }

        #[tokio::test]
        async fn test_send_failure_retains_compose_for_retry() {
            let (_db, repository) = repository_fixture().await;
            let failing = Arc::new(AtomicBool::new(false));
            let flaky = Arc::new(FlakyRepository {
                inner: repository,
                failing: failing.clone(),
            });
            let me = Identity::new(WrappedUuidV4::new());
            let host = WrappedUuidV4::new();
            let mut session =
                InboxSession::open(flaky, EventBus::default(), me).await;
            session.select_conversation(host).await;

            failing.store(true, Ordering::SeqCst);
            let err = session.send_message("please hold the booking").await.unwrap_err();
            assert!(matches!(err, CommonError::Delivery { .. }));
            assert_eq!(session.compose(), "please hold the booking");

            // Store recovers; resubmitting the retained input succeeds
            failing.store(false, Ordering::SeqCst);
            let retained = session.compose().to_string();
            session.send_message(&retained).await.unwrap();
            assert_eq!(session.compose(), "");
        }

        #[tokio::test]
        async fn test_event_triggers_rederivation() {
            let (_db, repository) = repository_fixture().await;
            let me = Identity::new(WrappedUuidV4::new());
            let host = WrappedUuidV4::new();
            let repository = Arc::new(repository);
            let event_bus = EventBus::default();
            let mut session =
                InboxSession::open(repository.clone(), event_bus.clone(), me.clone()).await;
            assert!(session.conversations().is_empty());

            // Another party inserts a message and the bus announces it
            let host_identity = Identity::new(host);
            let sent = send_message(
                repository.as_ref(),
                &event_bus,
                &host_identity,
                SendMessageRequest {
                    receiver_id: me.user_id,
                    content: "your booking is confirmed".to_string(),
                    trip_id: None,
                },
            )
            .await
            .unwrap();

            session
                .handle_event(&MessageEvent::message_inserted(sent))
                .await;
            assert_eq!(session.conversations().len(), 1);
            assert_eq!(session.conversations()[0].last_message, "your booking is confirmed");
        }

        #[tokio::test]
        async fn test_irrelevant_event_is_ignored() {
            let (_db, repository) = repository_fixture().await;
            let me = Identity::new(WrappedUuidV4::new());
            let repository = Arc::new(repository);
            let mut session =
                InboxSession::open(repository.clone(), EventBus::default(), me).await;

            // A message between two strangers still lands on every
            // subscriber; the session filters it out locally
            let stranger_message = Message {
                id: WrappedUuidV7::new(),
                sender_id: WrappedUuidV4::new(),
                receiver_id: WrappedUuidV4::new(),
                content: "unrelated".to_string(),
                trip_id: None,
                is_read: false,
                created_at: WrappedChronoDateTime::now(),
            };
            session
                .handle_event(&MessageEvent::message_inserted(stranger_message))
                .await;
            assert!(session.conversations().is_empty());
        }

        #[tokio::test]
        async fn test_aggregation_failure_degrades_without_crashing() {
            let (_db, repository) = repository_fixture().await;
            let failing = Arc::new(AtomicBool::new(false));
            let flaky = Arc::new(FlakyRepository {
                inner: repository,
                failing: failing.clone(),
            });
            let me = Identity::new(WrappedUuidV4::new());
            let host = WrappedUuidV4::new();
            let mut session = InboxSession::open(flaky, EventBus::default(), me).await;

            failing.store(true, Ordering::SeqCst);
            session.refresh().await;
            assert!(session.conversations().is_empty());
            assert!(session.last_error().is_some());

            // Retry after the store recovers
            failing.store(false, Ordering::SeqCst);
            session.select_conversation(host).await;
            session.send_message("retry works").await.unwrap();
            session.refresh().await;
            assert!(session.last_error().is_none());
        }

        #[tokio::test]
        async fn test_superseded_ticket_is_stale() {
            let (_db, repository) = repository_fixture().await;
            let me = Identity::new(WrappedUuidV4::new());
            let session =
                InboxSession::open(Arc::new(repository), EventBus::default(), me).await;

            let first = session.issue_ticket();
            let second = session.issue_ticket();
            assert!(!session.is_current(first));
            assert!(session.is_current(second));
        }
    }
}
