use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::utils::time::parse_expiry_millis;

pub const GOOGLE_PROVIDER: &str = "google";

/// One user's delegated calendar grant, combined from the user row and the
/// provider token row. `expires_at_ms` is already normalized to epoch
/// milliseconds; the dual storage representation never leaves the store layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarCredential {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub id_token: Option<String>,
    pub expires_at_ms: Option<i64>,
    pub is_valid: bool,
    pub provider: String,
}

/// Raw `oauth_token` row. `expires_at` keeps its storage form (ISO-8601
/// string, or an epoch-millisecond number on legacy rows) until mapped.
#[derive(Debug, Clone, FromRow)]
pub struct OAuthTokenRow {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub id_token: Option<String>,
    pub expires_at: Option<String>,
    pub is_valid: bool,
    pub provider: String,
}

impl OAuthTokenRow {
    pub fn into_credential(self, email: String) -> CalendarCredential {
        let expires_at_ms = self
            .expires_at
            .as_deref()
            .and_then(parse_expiry_millis);

        CalendarCredential {
            user_id: self.user_id,
            email,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            scope: self.scope,
            id_token: self.id_token,
            expires_at_ms,
            is_valid: self.is_valid,
            provider: self.provider,
        }
    }
}

/// Result of a successful upstream refresh exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_at_ms: i64,
}
