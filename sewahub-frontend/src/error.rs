use reqwest::StatusCode;
use service_core::error::AppError;
use thiserror::Error;

/// Failure of a call to the SewaHub API or of a session operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Rejected before any request was made.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Token invalid or expired, or credentials rejected (HTTP 401).
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// No usable response: connection refused, timeout, gateway errors.
    #[error("Network error: {0}")]
    Network(String),

    /// A well-formed response reporting failure.
    #[error("{message}")]
    ServerRejected { status: u16, message: String },

    /// The credential store could not be read or written.
    #[error("Credential store error: {0}")]
    Storage(String),
}

impl ApiError {
    /// Only this class forces the session to be cleared.
    pub fn is_authentication(&self) -> bool {
        matches!(self, ApiError::Authentication(_))
    }

    pub fn rejected(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::ServerRejected {
            status: status.as_u16(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::ServerRejected {
                status: err.status().map(|s| s.as_u16()).unwrap_or(200),
                message: format!("Malformed response: {}", err),
            }
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::Validation(err.to_string())
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Storage(err.0)
    }
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Validation(msg) => AppError::BadRequest(msg),
            ApiError::Authentication(msg) => AppError::Unauthorized(msg),
            ApiError::Network(msg) => AppError::ServiceUnavailable(msg),
            ApiError::ServerRejected { status, message } => match status {
                400 | 422 => AppError::BadRequest(message),
                403 => AppError::Forbidden(message),
                404 => AppError::NotFound(message),
                409 => AppError::Conflict(message),
                _ => AppError::BadGateway(message),
            },
            ApiError::Storage(msg) => AppError::InternalError(anyhow::anyhow!(msg)),
        }
    }
}
