use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Failure of a single backend round trip.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Quota exceeded: {0}")]
    Quota(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl BackendError {
    /// Whether the backend answered, but in a shape we cannot read.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, BackendError::MalformedResponse(_))
    }
}

#[derive(Debug, Error)]
pub enum PageViewError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Backend contract violation: {0}")]
    ContractViolation(String),
}

impl IntoResponse for PageViewError {
    fn into_response(self) -> axum::response::Response {
        let status = match self {
            PageViewError::InvalidConfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PageViewError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            PageViewError::Backend(_) => StatusCode::BAD_GATEWAY,
            PageViewError::ContractViolation(_) => StatusCode::BAD_GATEWAY,
        };

        let body = Json(json!({
            "message": self.to_string()
        }));

        (status, body).into_response()
    }
}
