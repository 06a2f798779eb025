use chrono::{DateTime, Utc};

/// Returns current timestamp in seconds (Unix epoch)
pub fn current_timestamp_seconds() -> i64 {
    Utc::now().timestamp()
}

/// Returns current timestamp in milliseconds
pub fn current_timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parses a stored token expiry into epoch milliseconds.
///
/// The `expires_at` column historically held either an epoch-millisecond
/// number or an ISO-8601 string; both forms must keep working. Anything
/// unparseable maps to `None`, which callers treat as already expired.
pub fn parse_expiry_millis(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(millis) = trimmed.parse::<i64>() {
        return Some(millis);
    }

    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

/// Formats an epoch-millisecond instant as the canonical ISO-8601 storage form.
pub fn millis_to_iso(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_epoch_millis() {
        assert_eq!(parse_expiry_millis("1735689600000"), Some(1735689600000));
    }

    #[test]
    fn test_parse_iso_string() {
        let parsed = parse_expiry_millis("2025-01-01T00:00:00+00:00");
        assert_eq!(parsed, Some(1735689600000));
    }

    #[test]
    fn test_parse_garbage_is_none() {
        assert_eq!(parse_expiry_millis("not-a-date"), None);
        assert_eq!(parse_expiry_millis(""), None);
        assert_eq!(parse_expiry_millis("   "), None);
    }

    #[test]
    fn test_round_trip() {
        let iso = millis_to_iso(1735689600000).unwrap();
        assert_eq!(parse_expiry_millis(&iso), Some(1735689600000));
    }
}
