//! Profile domain model and logic
//!
//! The messaging subsystem only consumes the display columns of a profile;
//! account management owns the rest.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shared::error::CommonError;
use shared::identity::Identity;
use shared::primitives::{WrappedChronoDateTime, WrappedUuidV4};
use utoipa::ToSchema;

use crate::repository::{ProfileRepositoryLike, UpsertProfile};

/// Display profile of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct Profile {
    pub id: WrappedUuidV4,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub created_at: WrappedChronoDateTime,
    pub updated_at: WrappedChronoDateTime,
}

/// Request to upsert the caller's profile
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct UpsertProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

pub type UpsertProfileResponse = Profile;

// --- Logic Functions ---

/// Insert or update the caller's display profile
pub async fn upsert_profile<R: ProfileRepositoryLike>(
    repository: &R,
    identity: &Identity,
    request: UpsertProfileRequest,
) -> Result<UpsertProfileResponse, CommonError> {
    let now = WrappedChronoDateTime::now();
    let existing = repository.get_profile_by_id(&identity.user_id).await?;
    let created_at = existing.map(|p| p.created_at).unwrap_or(now);

    let params = UpsertProfile {
        id: identity.user_id,
        full_name: request.full_name.clone(),
        avatar_url: request.avatar_url.clone(),
        created_at,
        updated_at: now,
    };
    repository.upsert_profile(&params).await?;

    Ok(Profile {
        id: identity.user_id,
        full_name: request.full_name,
        avatar_url: request.avatar_url,
        created_at,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    mod unit {
        use super::super::*;
        use crate::repository::sqlite::repository_fixture;

        #[tokio::test]
        async fn test_upsert_profile_keeps_created_at() {
            let (_db, repository) = repository_fixture().await;
            let identity = Identity::new(WrappedUuidV4::new());

            let first = upsert_profile(
                &repository,
                &identity,
                UpsertProfileRequest {
                    full_name: Some("Priya Raman".to_string()),
                    avatar_url: None,
                },
            )
            .await
            .unwrap();

            let second = upsert_profile(
                &repository,
                &identity,
                UpsertProfileRequest {
                    full_name: Some("Priya R.".to_string()),
                    avatar_url: None,
                },
            )
            .await
            .unwrap();

            assert_eq!(second.created_at, first.created_at);
            assert_eq!(second.full_name.as_deref(), Some("Priya R."));
        }
    }
}
