//! Tests for command descriptors and cache keys

use std::time::{Duration, UNIX_EPOCH};

use htcondor_query::core::NO_EXPIRY;
use htcondor_query::{CacheKey, Command};

#[test]
fn test_full_record_args() {
    let cmd = Command::new("condor_q")
        .with_name("schedd01")
        .with_limit(10)
        .with_arg("-allusers");
    assert_eq!(
        cmd.make_args(),
        ["-name", "schedd01", "-limit", "10", "-allusers", "-long"]
    );
    assert_eq!(cmd.statement(), "condor_q -name schedd01 -limit 10 -allusers -long");
}

#[test]
fn test_attributes_are_deduplicated_in_order() {
    let cmd = Command::new("condor_status")
        .with_attribute("Name")
        .with_attribute("State")
        .with_attribute("Name");
    assert_eq!(cmd.attributes(), ["Name", "State"]);
    assert_eq!(cmd.make_args(), ["-af:lrng", "Name", "State"]);
}

#[test]
fn test_empty_constraint_is_unset() {
    let cmd = Command::new("condor_q").with_constraint("");
    assert!(cmd.constraint().is_none());
    assert_eq!(cmd.make_args(), ["-long"]);
}

#[test]
fn test_uncached_key_never_expires() {
    let cmd = Command::new("condor_q").with_arg("-allusers");
    let key = cmd.cache_key_at(UNIX_EPOCH + Duration::from_secs(42));
    let decoded = key.decode().unwrap();
    assert_eq!(decoded.bucket, NO_EXPIRY);
    assert_eq!(decoded.command.make_args(), cmd.make_args());
}

#[test]
fn test_key_roundtrip_preserves_arguments() {
    let cmd = Command::new("condor_history")
        .with_pool("cm.example.org")
        .with_constraint("Owner == \"jmalbos\"")
        .with_attribute("ClusterId")
        .with_attribute("RemoteSysCpu");
    let now = UNIX_EPOCH + Duration::from_secs(1_714_564_805);
    let key = CacheKey::encode(&cmd, now, Duration::from_secs(60));
    let decoded = key.decode().unwrap();
    assert_eq!(decoded.bucket, "2024-05-01T12:00:00Z");
    assert_eq!(decoded.command.tool(), "condor_history");
    assert_eq!(decoded.command.make_args(), cmd.make_args());
}

#[test]
fn test_key_distinguishes_argument_boundaries() {
    let now = UNIX_EPOCH;
    let joined = Command::new("condor_q").with_arg("a b");
    let split = Command::new("condor_q").with_arg("a").with_arg("b");
    assert_ne!(
        CacheKey::encode(&joined, now, Duration::ZERO),
        CacheKey::encode(&split, now, Duration::ZERO)
    );
}

#[test]
fn test_malformed_key_fails_to_decode() {
    assert!(CacheKey::from_raw("no-separator").decode().is_err());
}
