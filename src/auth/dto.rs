use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo::{Account, AuthProvider};

/// Request body for local registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub enrollment_number: Option<String>,
    pub username: Option<String>,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for the write-once enrollment assignment.
#[derive(Debug, Deserialize)]
pub struct EnrollmentUpdate {
    pub enrollment_number: String,
}

/// Authorization code posted back after the Google redirect.
#[derive(Debug, Deserialize)]
pub struct GoogleCallbackRequest {
    pub code: String,
}

/// Bearer token returned by register, login and the Google callback.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct AuthorizeUrlResponse {
    pub url: String,
}

/// Full profile projection of an account, as returned by `GET /me`.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub enrollment_number: Option<String>,
    pub auth_provider: AuthProvider,
    pub profile_photo_url: Option<String>,
    pub full_name: Option<String>,
    pub department: Option<String>,
    pub role: Option<String>,
    pub bio: Option<String>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Account> for MeResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            username: account.username,
            enrollment_number: account.enrollment_number,
            auth_provider: account.auth_provider,
            profile_photo_url: account.profile_photo_url,
            full_name: account.full_name,
            department: account.department,
            role: account.role,
            bio: account.bio,
            is_active: account.is_active,
            created_at: account.created_at,
        }
    }
}
