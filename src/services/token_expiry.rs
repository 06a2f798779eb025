use serde::{Deserialize, Serialize};

use crate::utils::time::current_timestamp_millis;

/// Buffer before token expiry that triggers a proactive refresh. Refreshing
/// only at the instant of expiry risks a request racing the refresh and
/// failing with a stale token; refreshing early absorbs clock skew and
/// network latency.
pub const NEAR_EXPIRY_BUFFER_MS: i64 = 5 * 60 * 1000;

/// Expiry verdict for a stored access token. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenExpiryStatus {
    pub is_expired: bool,
    pub is_near_expiry: bool,
    pub expires_in_ms: Option<i64>,
}

/// Classifies a token expiry instant (epoch milliseconds, already normalized
/// by the store mapper). A missing instant means the token must be treated as
/// already expired; defaulting to "valid" on missing data would grant access
/// on a token nobody can vouch for.
pub fn check_token_expiry(expires_at_ms: Option<i64>) -> TokenExpiryStatus {
    classify(expires_at_ms, current_timestamp_millis())
}

fn classify(expires_at_ms: Option<i64>, now_ms: i64) -> TokenExpiryStatus {
    let Some(expiry) = expires_at_ms else {
        return TokenExpiryStatus {
            is_expired: true,
            is_near_expiry: true,
            expires_in_ms: None,
        };
    };

    let remaining = expiry - now_ms;
    TokenExpiryStatus {
        is_expired: remaining <= 0,
        is_near_expiry: remaining > 0 && remaining <= NEAR_EXPIRY_BUFFER_MS,
        expires_in_ms: if remaining > 0 { Some(remaining) } else { None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn test_missing_expiry_is_expired() {
        let status = classify(None, NOW);
        assert!(status.is_expired);
        assert!(status.is_near_expiry);
        assert_eq!(status.expires_in_ms, None);
    }

    #[test]
    fn test_past_expiry_is_expired() {
        let status = classify(Some(NOW - 1), NOW);
        assert!(status.is_expired);
        assert_eq!(status.expires_in_ms, None);
    }

    #[test]
    fn test_exact_expiry_instant_is_expired() {
        let status = classify(Some(NOW), NOW);
        assert!(status.is_expired);
        assert_eq!(status.expires_in_ms, None);
    }

    #[test]
    fn test_within_buffer_is_near_expiry() {
        let status = classify(Some(NOW + 2 * 60 * 1000), NOW);
        assert!(!status.is_expired);
        assert!(status.is_near_expiry);
        assert_eq!(status.expires_in_ms, Some(2 * 60 * 1000));
    }

    #[test]
    fn test_buffer_boundary_is_near_expiry() {
        let status = classify(Some(NOW + NEAR_EXPIRY_BUFFER_MS), NOW);
        assert!(!status.is_expired);
        assert!(status.is_near_expiry);
    }

    #[test]
    fn test_beyond_buffer_is_valid() {
        let status = classify(Some(NOW + 2 * 60 * 60 * 1000), NOW);
        assert!(!status.is_expired);
        assert!(!status.is_near_expiry);
        assert_eq!(status.expires_in_ms, Some(2 * 60 * 60 * 1000));
    }

    #[test]
    fn test_verdict_is_stable_for_fixed_instant() {
        let first = classify(Some(NOW + 10_000), NOW);
        let second = classify(Some(NOW + 10_000), NOW);
        assert_eq!(first, second);
    }
}
