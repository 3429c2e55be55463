//! Wall-clock helpers for time-bucketed cache keys.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, Utc};

/// Start of the bucket of width `lifetime` containing `now`, measured from
/// the Unix epoch. A zero lifetime returns `now` unchanged; times before the
/// epoch clamp to it.
#[must_use]
pub fn bucket_start(now: SystemTime, lifetime: Duration) -> SystemTime {
    let width = lifetime.as_nanos();
    if width == 0 {
        return now;
    }
    let since = now.duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
    let start = since - since % width;
    let secs = u64::try_from(start / 1_000_000_000).unwrap_or(u64::MAX);
    // remainder of a division by 1e9 always fits
    let nanos = u32::try_from(start % 1_000_000_000).unwrap_or(0);
    UNIX_EPOCH + Duration::new(secs, nanos)
}

/// RFC 3339 UTC rendering of the bucket containing `now`, e.g.
/// `2024-05-01T12:00:00Z`. Identical for every instant in the same bucket.
#[must_use]
pub fn bucket_marker(now: SystemTime, lifetime: Duration) -> String {
    let start: DateTime<Utc> = bucket_start(now, lifetime).into();
    start.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_bucket_start_truncates() {
        let minute = Duration::from_secs(60);
        assert_eq!(bucket_start(at(125), minute), at(120));
        assert_eq!(bucket_start(at(120), minute), at(120));
        assert_eq!(bucket_start(at(179), minute), at(120));
    }

    #[test]
    fn test_bucket_start_zero_lifetime() {
        let now = at(1_000) + Duration::from_millis(5);
        assert_eq!(bucket_start(now, Duration::ZERO), now);
    }

    #[test]
    fn test_bucket_marker_format() {
        assert_eq!(
            bucket_marker(at(1_714_564_805), Duration::from_secs(60)),
            "2024-05-01T12:00:00Z"
        );
    }
}
