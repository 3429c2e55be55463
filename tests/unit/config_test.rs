//! Tests for configuration validation and loading

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use htcondor_query::config::{CacheConfig, ClientConfig, GroupConfig};
use htcondor_query::config::client::{ENV_BIN_DIR, ENV_MAX_LINE_BYTES, ENV_POOL};

fn cache_with(capacity_bytes: usize) -> CacheConfig {
    CacheConfig {
        peer_id: None,
        groups: HashMap::from([(
            "jobs".to_string(),
            GroupConfig {
                capacity_bytes,
                lifetime_secs: 60,
            },
        )]),
    }
}

#[test]
fn test_client_config_validation() {
    let valid = ClientConfig {
        cache: Some(cache_with(1 << 20)),
        ..ClientConfig::default()
    };
    assert!(valid.validate().is_ok());
}

#[test]
fn test_client_config_invalid_line_limit() {
    let invalid = ClientConfig {
        max_line_bytes: 0,
        ..ClientConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_client_config_invalid_stream_buffer() {
    let invalid = ClientConfig {
        stream_buffer: 0,
        ..ClientConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_cache_config_invalid_capacity() {
    let err = cache_with(0).validate().unwrap_err();
    assert!(err.contains("jobs"), "{err}");
}

#[test]
fn test_cache_config_requires_groups() {
    let empty = CacheConfig::default();
    assert!(empty.validate().is_err());
}

#[test]
fn test_from_json_str_rejects_invalid() {
    assert!(ClientConfig::from_json_str("{not json").is_err());
    assert!(ClientConfig::from_json_str(r#"{"max_line_bytes": 0}"#).is_err());
}

#[test]
fn test_overrides_from_lookup() {
    let vars = HashMap::from([
        (ENV_POOL, "cm.example.org"),
        (ENV_BIN_DIR, "/opt/condor/bin"),
        (ENV_MAX_LINE_BYTES, "4096"),
    ]);
    let cfg = ClientConfig::default()
        .with_overrides(|name| vars.get(name).map(ToString::to_string))
        .unwrap();
    assert_eq!(cfg.pool.as_deref(), Some("cm.example.org"));
    assert_eq!(cfg.bin_dir, Some(PathBuf::from("/opt/condor/bin")));
    assert_eq!(cfg.max_line_bytes, 4096);
}

#[test]
fn test_overrides_reject_bad_numbers() {
    let err = ClientConfig::default()
        .with_overrides(|name| (name == ENV_MAX_LINE_BYTES).then(|| "lots".to_string()))
        .unwrap_err();
    assert!(err.to_string().contains(ENV_MAX_LINE_BYTES));
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"pool": "cm", "cache": {{"peer_id": "node-a", "groups": {{"jobs": {{"capacity_bytes": 4096}}}}}}}}"#
    )
    .unwrap();
    let cfg = ClientConfig::load(file.path()).unwrap();
    assert_eq!(cfg.pool.as_deref(), Some("cm"));
    assert_eq!(cfg.group("jobs").unwrap().lifetime_secs, 0);
}

#[test]
fn test_load_missing_file() {
    let err = ClientConfig::load("/nonexistent/htcondor_query.json").unwrap_err();
    assert!(format!("{err:#}").contains("reading config file"));
}
