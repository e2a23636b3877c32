use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::error::AuthError;
use crate::config::GoogleConfig;

/// Tokens returned by the provider's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderTokens {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Profile data the reconciler consumes. `email` is the join key and is
/// guaranteed present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub email: String,
    pub full_name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserinfoResponse {
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

fn profile_from_userinfo(raw: UserinfoResponse) -> Result<ProviderProfile, AuthError> {
    let email = raw.email.filter(|e| !e.is_empty()).ok_or_else(|| {
        warn!("provider userinfo response has no email");
        AuthError::NoEmailProvided
    })?;
    Ok(ProviderProfile {
        email,
        full_name: raw.name,
        picture: raw.picture,
    })
}

/// External identity provider seam. Production uses `GoogleOAuth`; tests
/// substitute a canned implementation.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// One round trip to the token endpoint. Codes are single-use, so a
    /// failed exchange is terminal and never retried.
    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, AuthError>;
    /// One round trip to the userinfo endpoint.
    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, AuthError>;
    /// Authorization URL the frontend redirects the user to. Pure string
    /// construction from configuration.
    fn authorize_url(&self) -> String;
}

pub struct GoogleOAuth {
    http: reqwest::Client,
    config: GoogleConfig,
}

impl GoogleOAuth {
    pub fn new(config: GoogleConfig) -> anyhow::Result<Self> {
        // A hung provider call is bounded here and surfaces as the same
        // error kind as any other failed round trip.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuth {
    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, AuthError> {
        let params = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        let response = self
            .http
            .post(&self.config.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "token endpoint request failed");
                AuthError::ExchangeFailed
            })?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "token endpoint rejected code");
            return Err(AuthError::ExchangeFailed);
        }

        let tokens = response.json::<ProviderTokens>().await.map_err(|e| {
            warn!(error = %e, "token endpoint response malformed");
            AuthError::ExchangeFailed
        })?;
        debug!("authorization code exchanged");
        Ok(tokens)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, AuthError> {
        let response = self
            .http
            .get(&self.config.userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "userinfo request failed");
                AuthError::ProfileFetchFailed
            })?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "userinfo endpoint returned error");
            return Err(AuthError::ProfileFetchFailed);
        }

        let raw = response.json::<UserinfoResponse>().await.map_err(|e| {
            warn!(error = %e, "userinfo response malformed");
            AuthError::ProfileFetchFailed
        })?;
        profile_from_userinfo(raw)
    }

    fn authorize_url(&self) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline",
            self.config.auth_endpoint,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode("openid email profile"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> GoogleConfig {
        GoogleConfig {
            client_id: "client-123".into(),
            client_secret: "shhh".into(),
            redirect_uri: "http://localhost:3000/auth/callback".into(),
            auth_endpoint: "https://accounts.google.com/o/oauth2/v2/auth".into(),
            token_endpoint: "https://oauth2.googleapis.com/token".into(),
            userinfo_endpoint: "https://www.googleapis.com/oauth2/v2/userinfo".into(),
        }
    }

    #[test]
    fn authorize_url_encodes_parameters() {
        let oauth = GoogleOAuth::new(test_config()).expect("client builds");
        let url = oauth.authorize_url();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fauth%2Fcallback"));
        assert!(url.contains("scope=openid%20email%20profile"));
        assert!(!url.contains("shhh"));
    }

    #[test]
    fn userinfo_without_email_is_rejected() {
        let raw = UserinfoResponse {
            email: None,
            name: Some("C. Student".into()),
            picture: Some("p1".into()),
        };
        assert!(matches!(
            profile_from_userinfo(raw),
            Err(AuthError::NoEmailProvided)
        ));
    }

    #[test]
    fn userinfo_with_empty_email_is_rejected() {
        let raw = UserinfoResponse {
            email: Some(String::new()),
            name: None,
            picture: None,
        };
        assert!(matches!(
            profile_from_userinfo(raw),
            Err(AuthError::NoEmailProvided)
        ));
    }

    #[test]
    fn userinfo_maps_to_profile() {
        let raw = UserinfoResponse {
            email: Some("c@x.com".into()),
            name: Some("C. Student".into()),
            picture: Some("p1".into()),
        };
        let profile = profile_from_userinfo(raw).expect("valid profile");
        assert_eq!(profile.email, "c@x.com");
        assert_eq!(profile.picture.as_deref(), Some("p1"));
    }

    #[test]
    fn token_response_deserializes() {
        let tokens: ProviderTokens = serde_json::from_str(
            r#"{"access_token":"ya29.abc","expires_in":3599,"token_type":"Bearer","scope":"openid"}"#,
        )
        .expect("deserialize");
        assert_eq!(tokens.access_token, "ya29.abc");
        assert_eq!(tokens.expires_in, Some(3599));
    }
}
