use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::CalendarCredential;
use crate::services::credential_store::CredentialStore;
use crate::services::token_expiry::{check_token_expiry, TokenExpiryStatus};
use crate::services::token_refresh::{RefreshError, TokenRefresher};

/// What a successful pipeline run hands to the downstream calendar-client
/// construction step: the credential plus the verdict it was admitted under.
#[derive(Debug, Clone)]
pub struct CalendarAccessContext {
    pub credential: CalendarCredential,
    pub expiry: TokenExpiryStatus,
}

/// Validation stage. Loads the principal's credential and fails fast on
/// anything that can never produce a usable token; read-only.
pub async fn validate_calendar_tokens<S: CredentialStore + ?Sized>(
    store: &S,
    principal: Option<&str>,
) -> AppResult<CalendarAccessContext> {
    let principal = principal.map(|p| p.trim().to_lowercase()).filter(|p| !p.is_empty());
    let Some(email) = principal else {
        return Err(AppError::Unauthenticated(
            "Authentication required.".to_string(),
        ));
    };

    let credential = store
        .find_credential_by_email(&email)
        .await
        .map_err(|e| {
            error!("Credential lookup failed for {}: {}", email, e);
            e
        })?;

    let Some(credential) = credential else {
        return Err(AppError::NotConnected(
            "No calendar connection found. Please authorize calendar access.".to_string(),
        ));
    };

    if !credential.is_valid {
        return Err(AppError::AccessRevoked(
            "Calendar access has been revoked. Please reconnect your calendar.".to_string(),
        ));
    }

    // Distinct from the revoked case: the row is live and may even hold a
    // working access token, but it can never be refreshed
    if credential.refresh_token.is_none() {
        return Err(AppError::IncompleteGrant(
            "Calendar connection is missing offline access. Please reconnect and grant full permissions.".to_string(),
        ));
    }

    let expiry = check_token_expiry(credential.expires_at_ms);
    Ok(CalendarAccessContext { credential, expiry })
}

/// Refresh stage. Passes a healthy credential through untouched; otherwise
/// runs the refresh protocol and persists or deactivates. This is the only
/// path that flips `is_valid` off.
pub async fn refresh_calendar_tokens<S, R>(
    store: &S,
    refresher: &R,
    mut ctx: CalendarAccessContext,
) -> AppResult<CalendarAccessContext>
where
    S: CredentialStore + ?Sized,
    R: TokenRefresher + ?Sized,
{
    if !ctx.expiry.is_expired && !ctx.expiry.is_near_expiry {
        return Ok(ctx);
    }

    info!(
        "Token refresh triggered for {} - expired: {}, near expiry: {}",
        ctx.credential.email, ctx.expiry.is_expired, ctx.expiry.is_near_expiry
    );

    match refresher.refresh(&ctx.credential).await {
        Ok(refreshed) => {
            store
                .update_refreshed_token(&ctx.credential.user_id, &refreshed)
                .await?;

            ctx.credential.access_token = refreshed.access_token;
            ctx.credential.expires_at_ms = Some(refreshed.expires_at_ms);
            ctx.credential.is_valid = true;
            ctx.expiry = check_token_expiry(ctx.credential.expires_at_ms);

            info!("Token refreshed successfully for {}", ctx.credential.email);
            Ok(ctx)
        }
        Err(RefreshError::ReauthRequired(reason)) => {
            warn!(
                "Refresh token dead for {}: {}; deactivating credential",
                ctx.credential.email, reason
            );
            store.deactivate_tokens(&ctx.credential.user_id).await?;

            Err(AppError::ReauthRequired(
                "Calendar session expired. Please reconnect your calendar.".to_string(),
            ))
        }
        Err(RefreshError::Transient(message)) => {
            // Grant status unknown; keep the stored credential for the next
            // attempt
            warn!(
                "Transient token refresh failure for {}: {}",
                ctx.credential.email, message
            );

            Err(AppError::TemporarilyUnavailable(
                "Calendar token refresh failed. Please try again shortly.".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RefreshedToken, GOOGLE_PROVIDER};
    use crate::services::token_expiry::NEAR_EXPIRY_BUFFER_MS;
    use crate::utils::time::current_timestamp_millis;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct MockStore {
        credential: Option<CalendarCredential>,
        persisted: Mutex<Vec<RefreshedToken>>,
        deactivations: Mutex<u32>,
    }

    impl MockStore {
        fn with(credential: Option<CalendarCredential>) -> Self {
            MockStore {
                credential,
                persisted: Mutex::new(Vec::new()),
                deactivations: Mutex::new(0),
            }
        }

        fn persisted_tokens(&self) -> Vec<RefreshedToken> {
            self.persisted.lock().unwrap().clone()
        }

        fn deactivation_count(&self) -> u32 {
            *self.deactivations.lock().unwrap()
        }
    }

    #[async_trait]
    impl CredentialStore for MockStore {
        async fn find_credential_by_email(
            &self,
            _email: &str,
        ) -> AppResult<Option<CalendarCredential>> {
            Ok(self.credential.clone())
        }

        async fn find_user_id_by_email(&self, _email: &str) -> AppResult<Option<String>> {
            Ok(self.credential.as_ref().map(|c| c.user_id.clone()))
        }

        async fn update_refreshed_token(
            &self,
            _user_id: &str,
            refreshed: &RefreshedToken,
        ) -> AppResult<()> {
            self.persisted.lock().unwrap().push(refreshed.clone());
            Ok(())
        }

        async fn deactivate_tokens(&self, _user_id: &str) -> AppResult<()> {
            *self.deactivations.lock().unwrap() += 1;
            Ok(())
        }
    }

    enum MockOutcome {
        Success(RefreshedToken),
        Reauth,
        Transient,
    }

    struct MockRefresher {
        outcome: MockOutcome,
        calls: Mutex<u32>,
    }

    impl MockRefresher {
        fn new(outcome: MockOutcome) -> Self {
            MockRefresher {
                outcome,
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl TokenRefresher for MockRefresher {
        async fn refresh(
            &self,
            _credential: &CalendarCredential,
        ) -> Result<RefreshedToken, RefreshError> {
            *self.calls.lock().unwrap() += 1;
            match &self.outcome {
                MockOutcome::Success(token) => Ok(token.clone()),
                MockOutcome::Reauth => Err(RefreshError::ReauthRequired(
                    "refresh token is invalid, expired, or revoked".to_string(),
                )),
                MockOutcome::Transient => {
                    Err(RefreshError::Transient("connection reset".to_string()))
                }
            }
        }
    }

    fn credential(expires_in_ms: i64) -> CalendarCredential {
        CalendarCredential {
            user_id: "user-1".to_string(),
            email: "user@example.com".to_string(),
            access_token: "ya29.original".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            token_type: Some("Bearer".to_string()),
            scope: Some("https://www.googleapis.com/auth/calendar".to_string()),
            id_token: None,
            expires_at_ms: Some(current_timestamp_millis() + expires_in_ms),
            is_valid: true,
            provider: GOOGLE_PROVIDER.to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_principal_is_unauthenticated() {
        let store = MockStore::with(None);
        let result = validate_calendar_tokens(&store, None).await;
        assert!(matches!(result, Err(AppError::Unauthenticated(_))));

        let result = validate_calendar_tokens(&store, Some("   ")).await;
        assert!(matches!(result, Err(AppError::Unauthenticated(_))));
    }

    #[tokio::test]
    async fn test_no_credential_is_not_connected() {
        let store = MockStore::with(None);
        let result = validate_calendar_tokens(&store, Some("User@Example.com")).await;
        assert!(matches!(result, Err(AppError::NotConnected(_))));
    }

    #[tokio::test]
    async fn test_invalid_credential_is_access_revoked() {
        let mut cred = credential(60 * 60 * 1000);
        cred.is_valid = false;
        let store = MockStore::with(Some(cred));

        let result = validate_calendar_tokens(&store, Some("user@example.com")).await;
        assert!(matches!(result, Err(AppError::AccessRevoked(_))));
    }

    #[tokio::test]
    async fn test_missing_refresh_token_is_incomplete_grant() {
        let mut cred = credential(60 * 60 * 1000);
        cred.refresh_token = None;
        let store = MockStore::with(Some(cred));

        let result = validate_calendar_tokens(&store, Some("user@example.com")).await;
        assert!(matches!(result, Err(AppError::IncompleteGrant(_))));
    }

    #[tokio::test]
    async fn test_healthy_credential_attaches_context() {
        let store = MockStore::with(Some(credential(2 * 60 * 60 * 1000)));
        let ctx = validate_calendar_tokens(&store, Some("  User@Example.COM "))
            .await
            .unwrap();

        assert!(!ctx.expiry.is_expired);
        assert!(!ctx.expiry.is_near_expiry);
        assert_eq!(ctx.credential.access_token, "ya29.original");
    }

    #[tokio::test]
    async fn test_valid_token_passes_through_without_refresh() {
        let store = MockStore::with(Some(credential(2 * 60 * 60 * 1000)));
        let refresher = MockRefresher::new(MockOutcome::Transient);

        let ctx = validate_calendar_tokens(&store, Some("user@example.com"))
            .await
            .unwrap();
        let ctx = refresh_calendar_tokens(&store, &refresher, ctx).await.unwrap();

        assert_eq!(refresher.call_count(), 0);
        assert!(store.persisted_tokens().is_empty());
        assert_eq!(ctx.credential.access_token, "ya29.original");
    }

    #[tokio::test]
    async fn test_near_expiry_refresh_persists_and_swaps_token() {
        let store = MockStore::with(Some(credential(2 * 60 * 1000)));
        let new_expiry = current_timestamp_millis() + 60 * 60 * 1000;
        let refresher = MockRefresher::new(MockOutcome::Success(RefreshedToken {
            access_token: "ya29.fresh".to_string(),
            expires_at_ms: new_expiry,
        }));

        let ctx = validate_calendar_tokens(&store, Some("user@example.com"))
            .await
            .unwrap();
        assert!(ctx.expiry.is_near_expiry);

        let ctx = refresh_calendar_tokens(&store, &refresher, ctx).await.unwrap();

        assert_eq!(refresher.call_count(), 1);
        let persisted = store.persisted_tokens();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].access_token, "ya29.fresh");
        assert_eq!(persisted[0].expires_at_ms, new_expiry);
        assert_eq!(ctx.credential.access_token, "ya29.fresh");
        assert!(!ctx.expiry.is_expired);
        assert!(!ctx.expiry.is_near_expiry);
        assert_eq!(store.deactivation_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_token_triggers_refresh() {
        let store = MockStore::with(Some(credential(-1000)));
        let refresher = MockRefresher::new(MockOutcome::Success(RefreshedToken {
            access_token: "ya29.fresh".to_string(),
            expires_at_ms: current_timestamp_millis() + NEAR_EXPIRY_BUFFER_MS * 12,
        }));

        let ctx = validate_calendar_tokens(&store, Some("user@example.com"))
            .await
            .unwrap();
        assert!(ctx.expiry.is_expired);

        let ctx = refresh_calendar_tokens(&store, &refresher, ctx).await.unwrap();
        assert_eq!(refresher.call_count(), 1);
        assert_eq!(ctx.credential.access_token, "ya29.fresh");
    }

    #[tokio::test]
    async fn test_dead_grant_deactivates_exactly_once() {
        let store = MockStore::with(Some(credential(2 * 60 * 1000)));
        let refresher = MockRefresher::new(MockOutcome::Reauth);

        let ctx = validate_calendar_tokens(&store, Some("user@example.com"))
            .await
            .unwrap();
        let result = refresh_calendar_tokens(&store, &refresher, ctx).await;

        assert!(matches!(result, Err(AppError::ReauthRequired(_))));
        assert_eq!(store.deactivation_count(), 1);
        assert!(store.persisted_tokens().is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_leaves_credential_untouched() {
        let store = MockStore::with(Some(credential(2 * 60 * 1000)));
        let refresher = MockRefresher::new(MockOutcome::Transient);

        let ctx = validate_calendar_tokens(&store, Some("user@example.com"))
            .await
            .unwrap();
        let result = refresh_calendar_tokens(&store, &refresher, ctx).await;

        assert!(matches!(result, Err(AppError::TemporarilyUnavailable(_))));
        assert_eq!(store.deactivation_count(), 0);
        assert!(store.persisted_tokens().is_empty());
    }
}
