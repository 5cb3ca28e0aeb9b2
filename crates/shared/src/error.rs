use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;
use utoipa::{IntoResponses, PartialSchema, ToSchema};

pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug, Serialize)]
pub enum CommonError {
    #[error("user is not authenticated to perform this action.")]
    Authentication {
        msg: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("request failed validation")]
    Validation {
        msg: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("message could not be delivered")]
    Delivery {
        msg: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("conversation aggregation fetch failed")]
    AggregationFetch {
        msg: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("could not find resource")]
    NotFound {
        msg: String,
        lookup_id: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("unknown error")]
    Unknown(
        #[serde(skip)]
        #[from]
        anyhow::Error,
    ),
    #[error("repository error")]
    Repository {
        msg: String,
        #[serde(skip)]
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("sqlite database error")]
    SqliteError {
        #[serde(skip)]
        #[from]
        #[source]
        source: libsql::Error,
    },
    #[error("tokio channel error")]
    TokioChannelError {
        #[serde(skip)]
        #[source]
        source: DynError,
    },
    #[error("io error")]
    IoError {
        #[serde(skip)]
        #[from]
        #[source]
        source: std::io::Error,
    },
    #[error("serde json error")]
    SerdeSerializationError {
        #[serde(skip)]
        #[from]
        #[source]
        source: serde_json::Error,
    },
    #[error("address parse error")]
    AddrParseError {
        #[serde(skip)]
        #[from]
        #[source]
        source: std::net::AddrParseError,
    },
}

impl<T: Send + Sync + 'static> From<tokio::sync::mpsc::error::SendError<T>> for CommonError {
    fn from(e: tokio::sync::mpsc::error::SendError<T>) -> Self {
        CommonError::TokioChannelError {
            source: Box::new(e),
        }
    }
}

impl<T: Send + Sync + 'static + std::fmt::Debug> From<tokio::sync::broadcast::error::SendError<T>>
    for CommonError
{
    fn from(e: tokio::sync::broadcast::error::SendError<T>) -> Self {
        CommonError::TokioChannelError {
            source: Box::new(e),
        }
    }
}

impl From<tokio::sync::broadcast::error::RecvError> for CommonError {
    fn from(e: tokio::sync::broadcast::error::RecvError) -> Self {
        CommonError::TokioChannelError {
            source: Box::new(e),
        }
    }
}

impl ToSchema for CommonError {
    fn name() -> std::borrow::Cow<'static, str> {
        std::borrow::Cow::Borrowed("Error")
    }

    fn schemas(
        _schemas: &mut Vec<(
            String,
            utoipa::openapi::RefOr<utoipa::openapi::schema::Schema>,
        )>,
    ) {
        // nothing by default
    }
}

impl PartialSchema for CommonError {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        utoipa::openapi::ObjectBuilder::new()
            .property(
                "name",
                utoipa::openapi::ObjectBuilder::new()
                    .schema_type(utoipa::openapi::schema::Type::String),
            )
            .required("name")
            .property(
                "message",
                utoipa::openapi::ObjectBuilder::new()
                    .schema_type(utoipa::openapi::schema::Type::String),
            )
            .required("message")
            .into()
    }
}

impl IntoResponses for CommonError {
    fn responses() -> std::collections::BTreeMap<
        String,
        utoipa::openapi::RefOr<utoipa::openapi::response::Response>,
    > {
        let mut responses = std::collections::BTreeMap::new();

        let error_content = utoipa::openapi::ContentBuilder::new()
            .schema(Some(CommonError::schema()))
            .build();

        // Authentication Error - 401
        responses.insert(
            "401".to_string(),
            utoipa::openapi::ResponseBuilder::new()
                .description("Authentication error")
                .content("application/json", error_content.clone())
                .into(),
        );

        // Validation Error - 400
        responses.insert(
            "400".to_string(),
            utoipa::openapi::ResponseBuilder::new()
                .description("Invalid request")
                .content("application/json", error_content.clone())
                .into(),
        );

        // Not Found Error - 404
        responses.insert(
            "404".to_string(),
            utoipa::openapi::ResponseBuilder::new()
                .description("Resource not found")
                .content("application/json", error_content.clone())
                .into(),
        );

        // Delivery Error - 503
        responses.insert(
            "503".to_string(),
            utoipa::openapi::ResponseBuilder::new()
                .description("Delivery failed, retryable")
                .content("application/json", error_content.clone())
                .into(),
        );

        // Everything else - 500
        responses.insert(
            "500".to_string(),
            utoipa::openapi::ResponseBuilder::new()
                .description("Server error")
                .content("application/json", error_content)
                .into(),
        );

        responses
    }
}

impl IntoResponse for CommonError {
    fn into_response(self) -> Response {
        let status = match self {
            CommonError::Authentication { .. } => StatusCode::UNAUTHORIZED,
            CommonError::Validation { .. } => StatusCode::BAD_REQUEST,
            CommonError::NotFound { .. } => StatusCode::NOT_FOUND,
            CommonError::Delivery { .. } => StatusCode::SERVICE_UNAVAILABLE,
            CommonError::AggregationFetch { .. }
            | CommonError::Unknown(_)
            | CommonError::Repository { .. }
            | CommonError::SqliteError { .. }
            | CommonError::TokioChannelError { .. }
            | CommonError::IoError { .. }
            | CommonError::SerdeSerializationError { .. }
            | CommonError::AddrParseError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            name: match self {
                CommonError::Authentication { .. } => "Authentication",
                CommonError::Validation { .. } => "Validation",
                CommonError::Delivery { .. } => "Delivery",
                CommonError::AggregationFetch { .. } => "AggregationFetch",
                CommonError::NotFound { .. } => "NotFound",
                CommonError::Repository { .. } => "Repository",
                CommonError::Unknown(_) => "InternalServerError",
                CommonError::SqliteError { .. } => "InternalServerError",
                CommonError::TokioChannelError { .. } => "InternalServerError",
                CommonError::IoError { .. } => "InternalServerError",
                CommonError::SerdeSerializationError { .. } => "InternalServerError",
                CommonError::AddrParseError { .. } => "InternalServerError",
            }
            .to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    name: String,
    message: String,
}
