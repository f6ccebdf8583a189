use axum::{
    Json,
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use storefront_db::StoreError;
use storefront_types::api::MessageResponse;

/// Every handler failure ends up here. The body is always `{"message": ...}`;
/// store and internal failures are logged and reported as a bare "Server error".
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("store failure: {0}")]
    Store(StoreError),

    #[error("internal failure: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => Self::bad_request("User already exists"),
            StoreError::UnknownProduct(id) => Self::bad_request(format!("Product {} not found", id)),
            StoreError::InsufficientStock { .. }
            | StoreError::InvalidTransition { .. }
            | StoreError::TotalOutOfRange => {
                Self::BadRequest(err.to_string())
            }
            other => Self::Store(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Store(_) | Self::Internal(_) => {
                error!("Request failed: {}", self);
                "Server error".to_string()
            }
            other => other.to_string(),
        };
        (self.status(), Json(MessageResponse { message })).into_response()
    }
}

/// `axum::Json` with rejections reported as `ApiError` JSON instead of plain text.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// Parse a path or query id. Anything that is not a UUID cannot name a
/// stored record, so it is reported the same way as a missing one.
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::not_found(format!("{} not found", what)))
}
