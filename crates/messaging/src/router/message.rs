//! Message HTTP endpoints

use axum::extract::{Json, State};
use shared::adapters::openapi::API_VERSION_TAG;
use std::sync::Arc;
use tracing::trace;
use utoipa_axum::{router::OpenApiRouter, routes};

use super::{API_VERSION_1, PATH_PREFIX, SERVICE_ROUTE_KEY};
use crate::{
    logic::message::{SendMessageRequest, SendMessageResponse, send_message},
    service::MessagingService,
};
use shared::{adapters::openapi::JsonResponse, error::CommonError, identity::Identity};

/// Create the message router
pub fn create_router() -> OpenApiRouter<Arc<MessagingService>> {
    OpenApiRouter::new().routes(routes!(route_send_message))
}

#[utoipa::path(
    post,
    path = format!("{}/{}/{}/message", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Send a message", body = SendMessageResponse),
        (status = 400, description = "Bad Request", body = CommonError),
        (status = 401, description = "Not Authenticated", body = CommonError),
        (status = 503, description = "Delivery failed, retryable", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Send message",
    description = "Validate and append a new message; subscribers are notified on success",
    operation_id = "send-message",
    security(
        (),
        ("api_key" = []),
        ("bearer_token" = [])
    )
)]
async fn route_send_message(
    State(ctx): State<Arc<MessagingService>>,
    identity: Identity,
    Json(request): Json<SendMessageRequest>,
) -> JsonResponse<SendMessageResponse, CommonError> {
    trace!(user_id = %identity.user_id, receiver_id = %request.receiver_id, "Sending message");
    let res = send_message(&ctx.repository, &ctx.event_bus, &identity, request).await;
    trace!(success = res.is_ok(), "Sending message completed");
    JsonResponse::from(res)
}
