use axum::extract::FromRequestParts;
use http::request::Parts;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::CommonError;
use crate::primitives::WrappedUuidV4;

/// Header carrying the authenticated user id. Populated by the session/auth
/// layer in front of this service; requests without it are anonymous and
/// rejected for every messaging operation.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller. Holding one proves an authenticated session
/// exists, so operations take it by value or reference instead of re-checking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    pub user_id: WrappedUuidV4,
}

impl Identity {
    pub fn new(user_id: WrappedUuidV4) -> Self {
        Self { user_id }
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = CommonError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| CommonError::Authentication {
                msg: format!("missing {USER_ID_HEADER} header"),
                source: None,
            })?;

        let raw = header.to_str().map_err(|e| CommonError::Authentication {
            msg: format!("invalid {USER_ID_HEADER} header"),
            source: Some(e.into()),
        })?;

        let user_id =
            WrappedUuidV4::try_from(raw.to_string()).map_err(|e| CommonError::Authentication {
                msg: format!("invalid user id in {USER_ID_HEADER} header"),
                source: Some(e),
            })?;

        Ok(Identity { user_id })
    }
}
