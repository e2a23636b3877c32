use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Terminal outcomes of the authentication flows. Nothing here is retried;
/// the façade maps each kind to a fixed status code and a stable reason string.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Email already registered")]
    EmailTaken,

    #[error("Enrollment number already registered")]
    EnrollmentTaken,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Enrollment number already set")]
    EnrollmentAlreadySet,

    #[error("Incorrect email or password")]
    InvalidCredentials,

    // Expired and forged tokens share one kind on purpose: callers get no oracle.
    #[error("Invalid or expired token")]
    TokenInvalid,

    #[error("Invalid email")]
    InvalidEmail,

    #[error("Could not exchange authorization code")]
    ExchangeFailed,

    #[error("Could not fetch provider profile")]
    ProfileFetchFailed,

    #[error("Provider profile has no email")]
    NoEmailProvided,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Stable machine-readable reason, independent of the human message.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::EmailTaken => "email_taken",
            AuthError::EnrollmentTaken => "enrollment_taken",
            AuthError::UsernameTaken => "username_taken",
            AuthError::EnrollmentAlreadySet => "enrollment_already_set",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::TokenInvalid => "token_invalid",
            AuthError::InvalidEmail => "invalid_email",
            AuthError::ExchangeFailed => "exchange_failed",
            AuthError::ProfileFetchFailed => "profile_fetch_failed",
            AuthError::NoEmailProvided => "no_email_provided",
            AuthError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::EmailTaken
            | AuthError::EnrollmentTaken
            | AuthError::UsernameTaken
            | AuthError::EnrollmentAlreadySet
            | AuthError::InvalidEmail
            | AuthError::ExchangeFailed
            | AuthError::ProfileFetchFailed
            | AuthError::NoEmailProvided => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials | AuthError::TokenInvalid => StatusCode::UNAUTHORIZED,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal causes are logged, never surfaced to the caller.
        let detail = match &self {
            AuthError::Internal(e) => {
                error!(error = %e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({ "reason": self.reason(), "detail": detail }));
        let mut response = (status, body).into_response();

        if matches!(self, AuthError::InvalidCredentials) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_kinds_map_to_400() {
        for err in [
            AuthError::EmailTaken,
            AuthError::EnrollmentTaken,
            AuthError::UsernameTaken,
            AuthError::EnrollmentAlreadySet,
            AuthError::ExchangeFailed,
            AuthError::ProfileFetchFailed,
            AuthError::NoEmailProvided,
        ] {
            assert_eq!(err.status(), StatusCode::BAD_REQUEST, "{}", err.reason());
        }
    }

    #[test]
    fn credential_kinds_map_to_401() {
        assert_eq!(AuthError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::TokenInvalid.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn invalid_credentials_carries_challenge_header() {
        let response = AuthError::InvalidCredentials.into_response();
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[test]
    fn internal_detail_is_not_leaked() {
        let err = AuthError::Internal(anyhow::anyhow!("SELECT * FROM accounts blew up"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn reasons_are_stable() {
        assert_eq!(AuthError::EmailTaken.reason(), "email_taken");
        assert_eq!(AuthError::TokenInvalid.reason(), "token_invalid");
        assert_eq!(AuthError::EnrollmentAlreadySet.reason(), "enrollment_already_set");
    }
}
