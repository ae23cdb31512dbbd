use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::AuthError;

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// Maps an error onto its HTTP status.
pub fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
        AuthError::ChallengeMissing
        | AuthError::InvalidSignature
        | AuthError::SignatureMismatch
        | AuthError::AuthFailed
        | AuthError::MissingToken
        | AuthError::TokenExpired
        | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
        AuthError::NotAuthorized => StatusCode::FORBIDDEN,
        AuthError::IdentityNotFound => StatusCode::NOT_FOUND,
        AuthError::AlreadyInDesiredState(_) => StatusCode::CONFLICT,
        AuthError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
        AuthError::StorageError(_)
        | AuthError::CryptoError(_)
        | AuthError::LedgerError(_)
        | AuthError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = status_for(&self);

        let message = if self.is_internal() {
            tracing::error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            error: status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
