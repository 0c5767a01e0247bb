use chrono::{DateTime, Utc};

/// Parse the provider's `timestamp` field: epoch seconds carried as a string.
pub fn from_epoch_seconds_str(s: &str) -> Option<DateTime<Utc>> {
    let secs: i64 = s.parse().ok()?;
    DateTime::from_timestamp(secs, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_epoch_seconds() {
        let dt = from_epoch_seconds_str("1710926100").expect("valid epoch");
        assert_eq!(dt.to_rfc3339(), "2024-03-20T09:15:00+00:00");
    }

    #[test]
    fn rejects_garbage() {
        assert!(from_epoch_seconds_str("not-a-number").is_none());
        assert!(from_epoch_seconds_str("").is_none());
    }
}
