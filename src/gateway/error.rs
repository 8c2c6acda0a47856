//! HTTP error mapping.
//!
//! Every failure leaves the gateway as `{"error": "<message>"}` with a status
//! code. Storage and hashing details are logged, never sent to the client.

use crate::account::AccountError;
use crate::auth::AuthRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

/// The request-level operation a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Register,
    Login,
    ReadSettings,
    Profile,
    Notifications,
    Theme,
    Password,
    Deactivate,
}

impl Operation {
    /// Generic client-facing message for failures with no safer detail.
    pub fn failure_message(self) -> &'static str {
        match self {
            Self::Register => "Error registering user",
            Self::Login => "Login failed",
            Self::ReadSettings => "Error loading settings",
            Self::Profile => "Error updating profile",
            Self::Notifications => "Error updating notification settings",
            Self::Theme => "Error updating theme preferences",
            Self::Password => "Error updating password",
            Self::Deactivate => "Error deactivating account",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{status}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Map an account failure for the given operation.
    pub fn from_account(err: AccountError, op: Operation) -> Self {
        let message = err.to_string();
        match err {
            AccountError::Validation(_)
            | AccountError::InvalidPassword
            | AccountError::InvalidOldPassword => Self::bad_request(message),
            AccountError::DuplicateEmail if op == Operation::Register => {
                Self::bad_request(message)
            }
            AccountError::UserNotFound if op == Operation::Login => Self::bad_request(message),
            AccountError::Conflict => Self::new(StatusCode::CONFLICT, message),
            AccountError::DuplicateEmail | AccountError::UserNotFound => {
                tracing::warn!(?op, "{message}");
                Self::bad_request(op.failure_message())
            }
            AccountError::Hashing(_) | AccountError::Token(_) | AccountError::Store(_) => {
                tracing::error!(?op, "{message}");
                Self::bad_request(op.failure_message())
            }
            AccountError::Internal(_) => {
                tracing::error!(?op, "{message}");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

impl From<AuthRejection> for ApiError {
    fn from(rejection: AuthRejection) -> Self {
        match rejection {
            AuthRejection::Missing => Self::new(StatusCode::UNAUTHORIZED, "Access denied"),
            AuthRejection::Invalid => Self::new(StatusCode::FORBIDDEN, "Invalid token"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}
