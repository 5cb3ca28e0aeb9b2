//! Conversation HTTP endpoints

use axum::extract::{Path, State};
use shared::adapters::openapi::API_VERSION_TAG;
use std::sync::Arc;
use tracing::trace;
use utoipa_axum::{router::OpenApiRouter, routes};

use super::{API_VERSION_1, PATH_PREFIX, SERVICE_ROUTE_KEY};
use crate::{
    logic::{
        conversation::{ListConversationsResponse, list_conversations},
        message::{MarkThreadReadResponse, mark_thread_read},
        thread::{GetThreadResponse, read_thread},
    },
    service::MessagingService,
};
use shared::{
    adapters::openapi::JsonResponse, error::CommonError, identity::Identity,
    primitives::WrappedUuidV4,
};

/// Create the conversation router
pub fn create_router() -> OpenApiRouter<Arc<MessagingService>> {
    OpenApiRouter::new()
        .routes(routes!(route_list_conversations))
        .routes(routes!(route_get_thread))
        .routes(routes!(route_mark_thread_read))
}

#[utoipa::path(
    get,
    path = format!("{}/{}/{}/conversation", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    responses(
        (status = 200, description = "List conversations", body = ListConversationsResponse),
        (status = 401, description = "Not Authenticated", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "List conversations",
    description = "Derive the caller's conversation list from the message log, newest first",
    operation_id = "list-conversations",
    security(
        (),
        ("api_key" = []),
        ("bearer_token" = [])
    )
)]
async fn route_list_conversations(
    State(ctx): State<Arc<MessagingService>>,
    identity: Identity,
) -> JsonResponse<ListConversationsResponse, CommonError> {
    trace!(user_id = %identity.user_id, "Listing conversations");
    let res = list_conversations(&ctx.repository, &identity).await;
    trace!(success = res.is_ok(), "Listing conversations completed");
    JsonResponse::from(res)
}

#[utoipa::path(
    get,
    path = format!("{}/{}/{}/conversation/{{counterpart_id}}/messages", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("counterpart_id" = WrappedUuidV4, Path, description = "Counterpart user ID"),
    ),
    responses(
        (status = 200, description = "Get thread transcript", body = GetThreadResponse),
        (status = 401, description = "Not Authenticated", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Get thread",
    description = "Retrieve the full transcript between the caller and one counterpart, oldest first",
    operation_id = "get-thread",
    security(
        (),
        ("api_key" = []),
        ("bearer_token" = [])
    )
)]
async fn route_get_thread(
    State(ctx): State<Arc<MessagingService>>,
    identity: Identity,
    Path(counterpart_id): Path<WrappedUuidV4>,
) -> JsonResponse<GetThreadResponse, CommonError> {
    trace!(user_id = %identity.user_id, counterpart_id = %counterpart_id, "Getting thread");
    let res = read_thread(&ctx.repository, &identity, counterpart_id).await;
    trace!(success = res.is_ok(), "Getting thread completed");
    JsonResponse::from(res)
}

#[utoipa::path(
    post,
    path = format!("{}/{}/{}/conversation/{{counterpart_id}}/read", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    params(
        ("counterpart_id" = WrappedUuidV4, Path, description = "Counterpart user ID"),
    ),
    responses(
        (status = 200, description = "Mark thread read", body = MarkThreadReadResponse),
        (status = 401, description = "Not Authenticated", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Mark thread read",
    description = "Flip every unread message the counterpart sent to the caller",
    operation_id = "mark-thread-read",
    security(
        (),
        ("api_key" = []),
        ("bearer_token" = [])
    )
)]
async fn route_mark_thread_read(
    State(ctx): State<Arc<MessagingService>>,
    identity: Identity,
    Path(counterpart_id): Path<WrappedUuidV4>,
) -> JsonResponse<MarkThreadReadResponse, CommonError> {
    trace!(user_id = %identity.user_id, counterpart_id = %counterpart_id, "Marking thread read");
    let res = mark_thread_read(&ctx.repository, &ctx.event_bus, &identity, counterpart_id).await;
    trace!(success = res.is_ok(), "Marking thread read completed");
    JsonResponse::from(res)
}
