use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Deliberately identical for unknown email and wrong password.
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";
/// Deliberately identical for unknown, expired, and already-consumed tokens.
pub const TOKEN_INVALID: &str = "Token invalid or expired";

#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed input, reported per-field.
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: &'static str,
    },
    /// A pre-commit validator denied the operation.
    #[error("{reason}")]
    Policy {
        rule: &'static str,
        reason: &'static str,
    },
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Token invalid or expired")]
    TokenInvalid,
    #[error("Email verification required")]
    VerificationRequired,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Not found")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Map a chain denial into the error taxonomy: weak passwords are policy
    /// errors, everything else is field-level validation.
    pub fn denied(rule: &'static str, field: &'static str, reason: &'static str) -> Self {
        if rule == "password-strength" {
            AuthError::Policy { rule, reason }
        } else {
            AuthError::Validation {
                field,
                message: reason,
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation { .. } | AuthError::Policy { .. } => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials | AuthError::TokenInvalid => StatusCode::UNAUTHORIZED,
            AuthError::VerificationRequired => StatusCode::FORBIDDEN,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AuthError::Validation { field, message } => {
                json!({ "error": message, "field": field })
            }
            AuthError::Policy { rule, reason } => {
                json!({ "error": reason, "rule": rule })
            }
            AuthError::Internal(err) => {
                error!(error = %err, "internal error");
                json!({ "error": "Something went wrong" })
            }
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_failures_share_one_message() {
        // Unknown email and wrong password must be textually identical.
        assert_eq!(AuthError::InvalidCredentials.to_string(), INVALID_CREDENTIALS);
        assert_eq!(AuthError::TokenInvalid.to_string(), TOKEN_INVALID);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            AuthError::Policy {
                rule: "password-strength",
                reason: "Password not strong enough"
            }
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::InvalidCredentials.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::TokenInvalid.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::VerificationRequired.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AuthError::EmailTaken.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn denial_mapping_distinguishes_policy_from_validation() {
        let policy = AuthError::denied("password-strength", "password", "Password not strong enough");
        assert!(matches!(policy, AuthError::Policy { .. }));

        let validation = AuthError::denied("email-shape", "email", "Invalid email");
        assert!(matches!(
            validation,
            AuthError::Validation { field: "email", .. }
        ));
    }
}
