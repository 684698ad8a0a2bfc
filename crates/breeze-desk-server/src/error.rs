use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use breeze_desk_broker::error::BrokerError;
use breeze_desk_core::error::FieldErrors;
use serde::Serialize;
use thiserror::Error;

pub const NETWORK_ERROR_MESSAGE: &str =
    "Network error. Please check your connection and try again.";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(FieldErrors),
    #[error("{0}")]
    Malformed(String),
    /// Opening a session failed (client error).
    #[error("{0}")]
    SessionInit(BrokerError),
    /// The broker failed while serving a query (server error).
    #[error("{0}")]
    Upstream(BrokerError),
    #[error("Session not found or expired. Initialize a session first.")]
    UnknownSession,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Malformed(_) | ApiError::SessionInit(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::UnknownSession => StatusCode::UNAUTHORIZED,
            ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when the broker could not be reached.
    pub fn is_transport(&self) -> bool {
        match self {
            ApiError::SessionInit(e) | ApiError::Upstream(e) => e.is_transport(),
            _ => false,
        }
    }

    /// Message for an HTML page: transport failures read as a network problem,
    /// and `fallback` stands in for an empty upstream message.
    pub fn page_message(&self, fallback: &str) -> String {
        if self.is_transport() {
            return NETWORK_ERROR_MESSAGE.to_string();
        }
        let message = self.to_string();
        if message.trim().is_empty() {
            fallback.to_string()
        } else {
            message
        }
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::Validation(errors)
    }
}

#[derive(Serialize)]
struct FailureBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "FieldErrors::is_empty")]
    errors: FieldErrors,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        let errors = match self {
            ApiError::Validation(errors) => errors,
            _ => FieldErrors::new(),
        };
        let body = Json(FailureBody {
            success: false,
            message,
            errors,
        });
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
