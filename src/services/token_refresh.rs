use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use crate::config::GoogleOAuthConfig;
use crate::models::{CalendarCredential, RefreshedToken};
use crate::utils::time::current_timestamp_millis;

const REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Error codes the provider returns when the refresh token itself is dead.
const REAUTH_ERROR_CODES: [&str; 3] = ["invalid_grant", "invalid_request", "unauthorized_client"];

/// Human-readable phrases that mean the same thing. Provider wording drifts;
/// extend this list as new variants show up in the field.
const REAUTH_ERROR_PHRASES: [&str; 2] =
    ["token has been expired or revoked", "token was not found"];

#[derive(Error, Debug)]
pub enum RefreshError {
    /// The grant is dead. Retrying cannot help; the user must re-consent and
    /// the caller must deactivate the stored credential.
    #[error("reauthorization required: {0}")]
    ReauthRequired(String),

    /// Network trouble, rate limiting, a malformed upstream response, or an
    /// unrecognized upstream error. Safe to retry later without re-consent.
    #[error("token refresh failed: {0}")]
    Transient(String),
}

#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, credential: &CalendarCredential)
        -> Result<RefreshedToken, RefreshError>;
}

/// Exchanges a refresh token for a fresh access token at Google's token
/// endpoint. Holds only the immutable app identity; all per-call token state
/// lives in a [`RefreshSession`] constructed per invocation.
pub struct GoogleTokenRefresher {
    oauth: GoogleOAuthConfig,
}

impl GoogleTokenRefresher {
    pub fn new(oauth: GoogleOAuthConfig) -> Self {
        Self { oauth }
    }
}

#[async_trait]
impl TokenRefresher for GoogleTokenRefresher {
    async fn refresh(
        &self,
        credential: &CalendarCredential,
    ) -> Result<RefreshedToken, RefreshError> {
        let Some(refresh_token) = credential.refresh_token.as_deref() else {
            return Err(RefreshError::ReauthRequired(
                "no refresh token available".to_string(),
            ));
        };

        let session = RefreshSession::new(&self.oauth, credential)?;
        session.exchange(refresh_token).await
    }
}

/// One refresh exchange. Built fresh per call so concurrent refreshes for
/// different users never share mutable session state, and seeded with the
/// full known credential set, not just the refresh token.
struct RefreshSession<'a> {
    http: Client,
    oauth: &'a GoogleOAuthConfig,
    access_token: String,
    token_type: Option<String>,
    scope: Option<String>,
    id_token: Option<String>,
}

/// Success body of the token endpoint. Fields are optional so a malformed
/// success can be detected rather than failing deserialization opaquely.
#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenEndpointError {
    error: Option<String>,
    error_description: Option<String>,
}

impl<'a> RefreshSession<'a> {
    fn new(
        oauth: &'a GoogleOAuthConfig,
        credential: &CalendarCredential,
    ) -> Result<Self, RefreshError> {
        let http = Client::builder()
            .timeout(REFRESH_TIMEOUT)
            .build()
            .map_err(|e| RefreshError::Transient(format!("failed to build client: {}", e)))?;

        Ok(Self {
            http,
            oauth,
            access_token: credential.access_token.clone(),
            token_type: credential.token_type.clone(),
            scope: credential.scope.clone(),
            id_token: credential.id_token.clone(),
        })
    }

    async fn exchange(&self, refresh_token: &str) -> Result<RefreshedToken, RefreshError> {
        let mut params: Vec<(&str, &str)> = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.oauth.client_id),
            ("client_secret", &self.oauth.client_secret),
            ("redirect_uri", &self.oauth.redirect_uri),
            // The stale access token rides along for provider-side session
            // continuity checks
            ("access_token", &self.access_token),
        ];
        if let Some(token_type) = self.token_type.as_deref() {
            params.push(("token_type", token_type));
        }
        if let Some(scope) = self.scope.as_deref() {
            params.push(("scope", scope));
        }
        if let Some(id_token) = self.id_token.as_deref() {
            params.push(("id_token", id_token));
        }

        // A timeout or connection failure says nothing about grant validity
        let response = self
            .http
            .post(&self.oauth.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| RefreshError::Transient(format!("token endpoint unreachable: {}", e)))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_refresh_failure(&body));
        }

        let token: TokenEndpointResponse = response.json().await.map_err(|e| {
            RefreshError::Transient(format!("failed to parse refresh response: {}", e))
        })?;

        let (Some(access_token), Some(expires_in)) = (token.access_token, token.expires_in) else {
            // The upstream returned a malformed success; treat as transient
            return Err(RefreshError::Transient(
                "refresh response missing access token or expiry".to_string(),
            ));
        };

        let expires_at_ms = current_timestamp_millis() + expires_in * 1000;
        info!(
            "Refreshed access token, expires in {} minutes",
            expires_in / 60
        );

        Ok(RefreshedToken {
            access_token,
            expires_at_ms,
        })
    }
}

/// Classifies a failed token-endpoint response body. Prefers the structured
/// `error` code, then `error_description`, then the raw body, matching
/// case-insensitively.
fn classify_refresh_failure(body: &str) -> RefreshError {
    let parsed: Option<TokenEndpointError> = serde_json::from_str(body).ok();

    let code = parsed
        .as_ref()
        .and_then(|e| e.error.as_deref())
        .unwrap_or_default()
        .to_lowercase();
    let description = parsed
        .as_ref()
        .and_then(|e| e.error_description.as_deref())
        .unwrap_or_default()
        .to_lowercase();
    let raw = body.to_lowercase();

    let is_reauth = REAUTH_ERROR_CODES
        .iter()
        .any(|c| code == *c || description.contains(c) || raw.contains(c))
        || REAUTH_ERROR_PHRASES
            .iter()
            .any(|p| description.contains(p) || raw.contains(p));

    if is_reauth {
        error!(
            "Token refresh rejected by provider: code={:?} description={:?}",
            code, description
        );
        return RefreshError::ReauthRequired(
            "refresh token is invalid, expired, or revoked".to_string(),
        );
    }

    let message = parsed
        .and_then(|e| e.error_description.or(e.error))
        .unwrap_or_else(|| body.to_string());
    RefreshError::Transient(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GOOGLE_PROVIDER;

    fn oauth_config() -> GoogleOAuthConfig {
        GoogleOAuthConfig {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            redirect_uri: "https://app.example.com/callback".to_string(),
            scopes: vec!["https://www.googleapis.com/auth/calendar".to_string()],
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
        }
    }

    fn credential(refresh_token: Option<&str>) -> CalendarCredential {
        CalendarCredential {
            user_id: "user-1".to_string(),
            email: "user@example.com".to_string(),
            access_token: "ya29.stale".to_string(),
            refresh_token: refresh_token.map(|s| s.to_string()),
            token_type: Some("Bearer".to_string()),
            scope: None,
            id_token: None,
            expires_at_ms: Some(0),
            is_valid: true,
            provider: GOOGLE_PROVIDER.to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_refresh_token_fails_without_network() {
        let refresher = GoogleTokenRefresher::new(oauth_config());
        let result = refresher.refresh(&credential(None)).await;
        assert!(matches!(result, Err(RefreshError::ReauthRequired(_))));
    }

    #[test]
    fn test_invalid_grant_code_is_reauth() {
        let body = r#"{"error":"invalid_grant","error_description":"Bad Request"}"#;
        assert!(matches!(
            classify_refresh_failure(body),
            RefreshError::ReauthRequired(_)
        ));
    }

    #[test]
    fn test_revoked_phrase_is_reauth() {
        let body = r#"{"error":"server_error","error_description":"Token has been expired or revoked."}"#;
        assert!(matches!(
            classify_refresh_failure(body),
            RefreshError::ReauthRequired(_)
        ));
    }

    #[test]
    fn test_unstructured_body_matching_code_is_reauth() {
        assert!(matches!(
            classify_refresh_failure("unauthorized_client"),
            RefreshError::ReauthRequired(_)
        ));
    }

    #[test]
    fn test_rate_limit_is_transient() {
        let body = r#"{"error":"rate_limit_exceeded","error_description":"Too many requests"}"#;
        match classify_refresh_failure(body) {
            RefreshError::Transient(message) => assert_eq!(message, "Too many requests"),
            other => panic!("expected transient, got {:?}", other),
        }
    }

    #[test]
    fn test_opaque_failure_is_transient() {
        assert!(matches!(
            classify_refresh_failure("<html>502 Bad Gateway</html>"),
            RefreshError::Transient(_)
        ));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert!(matches!(
            classify_refresh_failure("INVALID_GRANT"),
            RefreshError::ReauthRequired(_)
        ));
    }
}
