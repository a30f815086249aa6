use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Fallback text shown when the backend rejects a call without saying why.
pub const UPSTREAM_FALLBACK_MESSAGE: &str = "The invoice service could not complete the request";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("Forbidden: {0}")]
    Forbidden(anyhow::Error),

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    /// The backend answered with a non-2xx status.
    #[error("Upstream error ({status}): {}", message.as_deref().unwrap_or(UPSTREAM_FALLBACK_MESSAGE))]
    Upstream { status: u16, message: Option<String> },

    /// The backend could not be reached or answered with something unreadable.
    #[error("Bad Gateway: {0}")]
    BadGateway(String),

    #[error("Storage error: {0}")]
    StorageError(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Service Unavailable")]
    ServiceUnavailable,

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl AppError {
    /// Shorthand for a local validation failure that never reached the network.
    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::BadRequest(anyhow::anyhow!(message.into()))
    }

    /// Message suitable for a user-facing notice.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Upstream { message, .. } => message
                .clone()
                .unwrap_or_else(|| UPSTREAM_FALLBACK_MESSAGE.to_string()),
            AppError::BadRequest(err)
            | AppError::NotFound(err)
            | AppError::Unauthorized(err)
            | AppError::Forbidden(err)
            | AppError::Conflict(err) => err.to_string(),
            AppError::ValidationError(_) => "Validation error".to_string(),
            AppError::BadGateway(_) => UPSTREAM_FALLBACK_MESSAGE.to_string(),
            AppError::StorageError(_) => "File storage error".to_string(),
            AppError::InternalError(_) => "Internal server error".to_string(),
            AppError::ServiceUnavailable => "Service unavailable".to_string(),
            AppError::ConfigError(_) => "Configuration error".to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::BadGateway(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<String>,
        }

        let message = self.user_message();
        let (status, details) = match &self {
            AppError::ValidationError(err) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Some(err.to_string()))
            }
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, None),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, None),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, None),
            AppError::Conflict(_) => (StatusCode::CONFLICT, None),
            AppError::Upstream { status, .. } => (upstream_status(*status), None),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, Some(msg.clone())),
            AppError::StorageError(err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Some(err.to_string()))
            }
            AppError::InternalError(err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Some(format!("{:#}", err)))
            }
            AppError::ServiceUnavailable => (StatusCode::SERVICE_UNAVAILABLE, None),
            AppError::ConfigError(err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Some(err.to_string()))
            }
        };

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        }

        (
            status,
            Json(ErrorResponse {
                error: message,
                details,
            }),
        )
            .into_response()
    }
}

/// Client errors from the backend keep their status; everything else is a gateway failure.
fn upstream_status(status: u16) -> StatusCode {
    match StatusCode::from_u16(status) {
        Ok(code) if code.is_client_error() => code,
        _ => StatusCode::BAD_GATEWAY,
    }
}
