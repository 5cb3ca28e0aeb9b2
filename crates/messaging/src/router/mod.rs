//! Router layer for the messaging crate
//! Contains HTTP endpoints for conversations, messages, profiles, and the
//! event stream

pub mod conversation;
pub mod events;
pub mod message;
pub mod profile;

use std::sync::Arc;
use utoipa::openapi::OpenApi as OpenApiDoc;
use utoipa_axum::router::OpenApiRouter;

use crate::service::MessagingService;

pub const PATH_PREFIX: &str = "/api";
pub const API_VERSION_1: &str = "v1";
pub const SERVICE_ROUTE_KEY: &str = "messaging";

/// Create the combined messaging router
pub fn create_router() -> OpenApiRouter<Arc<MessagingService>> {
    let conversation_router = conversation::create_router();
    let message_router = message::create_router();
    let profile_router = profile::create_router();
    let events_router = events::create_router();

    OpenApiRouter::new()
        .merge(conversation_router)
        .merge(message_router)
        .merge(profile_router)
        .merge(events_router)
}

/// Get the combined OpenAPI spec for the messaging crate
pub fn get_openapi_spec() -> OpenApiDoc {
    let (_, conversation_spec) = conversation::create_router().split_for_parts();
    let (_, message_spec) = message::create_router().split_for_parts();
    let (_, profile_spec) = profile::create_router().split_for_parts();
    let (_, events_spec) = events::create_router().split_for_parts();

    let mut spec = conversation_spec;
    spec.merge(message_spec);
    spec.merge(profile_spec);
    spec.merge(events_spec);
    spec
}
