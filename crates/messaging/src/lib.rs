//! Messaging crate: direct conversations between renters and hosts
//!
//! This crate implements the inbox subsystem: a durable message log, the
//! conversation summaries derived from it, and the event channel that keeps
//! connected sessions current.
//!
//! ## Core Concepts
//!
//! - **Message**: One row in the append-mostly message log. Immutable after
//!   insert except for its read flag.
//!
//! - **Conversation**: A derived per-counterpart summary (preview, timestamp,
//!   unread count). Never persisted; recomputed from the log on demand.
//!
//! - **MessageEvent**: Broadcast notification emitted after every insert (and
//!   after a thread is marked read). Fan-out is unfiltered; each subscriber
//!   decides locally whether an event concerns it.
//!
//! - **InboxSession**: The per-client orchestrator holding the current user,
//!   the selected counterpart, and the derived views, re-deriving them when
//!   events arrive.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use messaging::{MessagingService, MessagingServiceParams};
//! use messaging::logic::event::EventBus;
//!
//! let service = MessagingService::new(MessagingServiceParams {
//!     repository,
//!     event_bus: EventBus::default(),
//! });
//!
//! let router = messaging::router::create_router().with_state(Arc::new(service));
//! ```

pub mod logic;
pub mod repository;
pub mod router;
pub mod service;

pub use service::{MessagingService, MessagingServiceParams};
