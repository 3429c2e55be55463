//! Tests for utility functions

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use htcondor_query::util::{bucket_marker, bucket_start};

fn at(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

#[test]
fn test_bucket_start_truncates() {
    let lifetime = Duration::from_secs(300);
    assert_eq!(bucket_start(at(1_000), lifetime), at(900));
    assert_eq!(bucket_start(at(1_199), lifetime), at(900));
    assert_eq!(bucket_start(at(1_200), lifetime), at(1_200));
}

#[test]
fn test_zero_lifetime_keeps_time() {
    let now = at(1_234) + Duration::from_millis(5);
    assert_eq!(bucket_start(now, Duration::ZERO), now);
}

#[test]
fn test_bucket_marker_is_stable_within_bucket() {
    let lifetime = Duration::from_secs(60);
    let a = bucket_marker(at(1_714_564_800), lifetime);
    let b = bucket_marker(at(1_714_564_859), lifetime);
    let c = bucket_marker(at(1_714_564_860), lifetime);
    assert_eq!(a, "2024-05-01T12:00:00Z");
    assert_eq!(a, b);
    assert_eq!(c, "2024-05-01T12:01:00Z");
}

#[test]
fn test_init_tracing_is_idempotent() {
    htcondor_query::util::init_tracing();
    htcondor_query::util::init_tracing_with_default("htcondor_query=debug");
}
