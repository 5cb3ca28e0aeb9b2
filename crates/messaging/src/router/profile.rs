//! Profile HTTP endpoints

use axum::extract::{Json, State};
use shared::adapters::openapi::API_VERSION_TAG;
use std::sync::Arc;
use tracing::trace;
use utoipa_axum::{router::OpenApiRouter, routes};

use super::{API_VERSION_1, PATH_PREFIX, SERVICE_ROUTE_KEY};
use crate::{
    logic::profile::{UpsertProfileRequest, UpsertProfileResponse, upsert_profile},
    service::MessagingService,
};
use shared::{adapters::openapi::JsonResponse, error::CommonError, identity::Identity};

/// Create the profile router
pub fn create_router() -> OpenApiRouter<Arc<MessagingService>> {
    OpenApiRouter::new().routes(routes!(route_upsert_profile))
}

#[utoipa::path(
    put,
    path = format!("{}/{}/{}/profile", PATH_PREFIX, SERVICE_ROUTE_KEY, API_VERSION_1),
    tags = [SERVICE_ROUTE_KEY, API_VERSION_TAG],
    request_body = UpsertProfileRequest,
    responses(
        (status = 200, description = "Upsert profile", body = UpsertProfileResponse),
        (status = 401, description = "Not Authenticated", body = CommonError),
        (status = 500, description = "Internal Server Error", body = CommonError),
    ),
    summary = "Upsert profile",
    description = "Create or update the caller's display profile",
    operation_id = "upsert-profile",
    security(
        (),
        ("api_key" = []),
        ("bearer_token" = [])
    )
)]
async fn route_upsert_profile(
    State(ctx): State<Arc<MessagingService>>,
    identity: Identity,
    Json(request): Json<UpsertProfileRequest>,
) -> JsonResponse<UpsertProfileResponse, CommonError> {
    trace!(user_id = %identity.user_id, "Upserting profile");
    let res = upsert_profile(&ctx.repository, &identity, request).await;
    trace!(success = res.is_ok(), "Upserting profile completed");
    JsonResponse::from(res)
}
