//! Event stream HTTP endpoint
//!
//! Server-push transport for the change notifier. Fan-out is unfiltered:
//! every connected client receives every event and filters locally.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use shared::adapters::openapi::API_VERSION_TAG;
use shared::error::CommonError;
use shared::identity::Identity;
use tracing::{trace, warn};
use utoipa_axum::{router::OpenApiRouter, routes};

use super::{API_VERSION_1, PATH_PREFIX, SERVICE_ROUTE_KEY};
use crate::logic::event::EventConsumer;
use crate::service::MessagingService;

/// Create the events router
pub fn create_router() -> OpenApiRouter<Arc<MessagingService>> {
    OpenApiRouter::new().routes(routes!(route_stream_events))
}

#[utoipa::path(
    get,
    path = format!("{}/{}/{}/events", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    responses(
        (status = 200, description = "SSE stream of message events", content_type = "text/event-stream"),
        (status = 401, description = "Not Authenticated", body = CommonError),
    ),
    summary = "Stream message events",
    description = "Subscribe to the message event stream. Every insert and read-receipt is delivered to every subscriber; clients filter on their own user id.",
    operation_id = "stream-events",
    security(
        (),
        ("api_key" = []),
        ("bearer_token" = [])
    )
)]
async fn route_stream_events(
    State(ctx): State<Arc<MessagingService>>,
    identity: Identity,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    trace!(user_id = %identity.user_id, "Opening event stream");
    let queue = ctx.event_bus.create_queue();

    let stream = async_stream::stream! {
        let consumer = EventConsumer::new(queue);
        let events = consumer.consume_all();
        tokio::pin!(events);
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => {
                        yield Ok(SseEvent::default().event("message-event").data(json));
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to serialize message event");
                    }
                },
                Err(_) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
