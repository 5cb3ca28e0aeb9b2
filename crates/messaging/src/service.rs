//! Service layer for the messaging crate
//! Provides the main service struct that holds all dependencies for
//! messaging operations

use std::sync::Arc;

use shared::identity::Identity;

use crate::{
    logic::{event::EventBus, session::InboxSession},
    repository::Repository,
};

/// Main service struct for messaging operations
/// Holds the repository and the event bus shared by every session
#[derive(Clone)]
pub struct MessagingService {
    pub repository: Repository,
    pub event_bus: EventBus,
}

/// Parameters for creating a MessagingService
pub struct MessagingServiceParams {
    pub repository: Repository,
    pub event_bus: EventBus,
}

impl MessagingService {
    /// Create a new MessagingService instance
    pub fn new(params: MessagingServiceParams) -> Self {
        Self {
            repository: params.repository,
            event_bus: params.event_bus,
        }
    }

    /// Open an inbox session for an authenticated user.
    ///
    /// The session shares this service's repository and event bus, so a
    /// message sent through any session reaches every other session's
    /// subscription.
    pub async fn open_session(&self, identity: Identity) -> InboxSession<Repository> {
        InboxSession::open(
            Arc::new(self.repository.clone()),
            self.event_bus.clone(),
            identity,
        )
        .await
    }
}
