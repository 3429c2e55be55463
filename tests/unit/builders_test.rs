//! Tests for builder modules

use std::sync::Arc;
use std::time::Duration;

use htcondor_query::builders::{build_cache_pool, cached_command};
use htcondor_query::config::ClientConfig;
use htcondor_query::core::NoPeers;
use htcondor_query::infra::ProcessExecutor;
use htcondor_query::QueryError;

const CONFIG: &str = r#"{
    "cache": {
        "peer_id": "node-a",
        "groups": {
            "jobs": {"capacity_bytes": 65536, "lifetime_secs": 30},
            "slots": {"capacity_bytes": 65536}
        }
    }
}"#;

#[test]
fn test_build_cache_pool_registers_groups() {
    let cfg = ClientConfig::from_json_str(CONFIG).unwrap();
    let pool = build_cache_pool(&cfg, Arc::new(ProcessExecutor::new()), Arc::new(NoPeers)).unwrap();
    assert_eq!(pool.id(), "node-a");
    assert_eq!(pool.groups(), ["jobs", "slots"]);
}

#[test]
fn test_build_cache_pool_rejects_invalid() {
    let cfg = ClientConfig {
        stream_buffer: 0,
        ..ClientConfig::default()
    };
    let err = build_cache_pool(&cfg, Arc::new(ProcessExecutor::new()), Arc::new(NoPeers))
        .unwrap_err();
    assert!(matches!(err, QueryError::Config(_)));
}

#[test]
fn test_cached_command_uses_group_lifetime() {
    let cfg = ClientConfig::from_json_str(CONFIG).unwrap();
    let pool = build_cache_pool(&cfg, Arc::new(ProcessExecutor::new()), Arc::new(NoPeers)).unwrap();
    let cmd = cached_command(&cfg, &pool, "jobs", "condor_q").unwrap();
    let binding = cmd.cache().unwrap();
    assert_eq!(binding.group.name(), "jobs");
    assert_eq!(binding.lifetime, Duration::from_secs(30));

    let err = cached_command(&cfg, &pool, "missing", "condor_q").unwrap_err();
    assert!(matches!(err, QueryError::UnknownGroup(_)));
}
