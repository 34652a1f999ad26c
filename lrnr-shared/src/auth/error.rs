/// Authentication error taxonomy
///
/// Only [`AuthError::StoreUnavailable`], [`AuthError::InvalidInput`] and
/// [`AuthError::Internal`] are ever returned as `Err` by the managers. The
/// credential-shaped variants describe why a request ended up anonymous; they
/// are logged where they happen and surface to handlers only through the
/// extractors (`Authenticated` rejects with `NotAuthenticated`).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::store::StoreError;

/// Authentication result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication and credential-management errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No usable credential on the request
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Session or key exists but is past its validity window
    #[error("Credential has expired")]
    ExpiredCredential,

    /// Bearer value or cookie failed the cheap format check
    #[error("Malformed credential: {0}")]
    MalformedCredential(String),

    /// The credential store could not serve the request
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),

    /// Caller does not own the targeted credential
    #[error("Credential not found")]
    OwnershipViolation,

    /// Rejected caller input (e.g. API key name out of range)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Wiring error, e.g. extractor used without the authentication layer
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// HTTP status this error maps to
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::NotAuthenticated | AuthError::ExpiredCredential => StatusCode::UNAUTHORIZED,
            AuthError::MalformedCredential(_) => StatusCode::BAD_REQUEST,
            AuthError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::OwnershipViolation => StatusCode::NOT_FOUND,
            AuthError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::NotAuthenticated => "unauthorized",
            AuthError::ExpiredCredential => "credential_expired",
            AuthError::MalformedCredential(_) => "malformed_credential",
            AuthError::StoreUnavailable(_) => "service_unavailable",
            AuthError::OwnershipViolation => "not_found",
            AuthError::InvalidInput(_) => "validation_error",
            AuthError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AuthError::StoreUnavailable(err) => {
                tracing::error!(error = %err, "Authentication aborted: credential store unavailable");
                "Authentication service temporarily unavailable".to_string()
            }
            AuthError::Internal(msg) => {
                tracing::error!(error = %msg, "Authentication internal error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": self.code(), "message": message }))).into_response()
    }
}

/// Logs a store failure and lifts it into [`AuthError::StoreUnavailable`]
pub(crate) fn store_failure(operation: &'static str, err: StoreError) -> AuthError {
    tracing::error!(operation, error = %err, "Credential store operation failed");
    AuthError::StoreUnavailable(err)
}
