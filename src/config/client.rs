//! Client and cache configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::classad::{ClassAdReader, DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_LINE_BYTES};
use crate::core::{AppResult, Command};
use crate::infra::process::ProcessExecutor;

/// Environment variable overriding [`ClientConfig::pool`].
pub const ENV_POOL: &str = "HTCONDOR_QUERY_POOL";
/// Environment variable overriding [`ClientConfig::bin_dir`].
pub const ENV_BIN_DIR: &str = "HTCONDOR_QUERY_BIN_DIR";
/// Environment variable overriding [`ClientConfig::max_line_bytes`].
pub const ENV_MAX_LINE_BYTES: &str = "HTCONDOR_QUERY_MAX_LINE_BYTES";
/// Environment variable overriding [`ClientConfig::stream_buffer`].
pub const ENV_STREAM_BUFFER: &str = "HTCONDOR_QUERY_STREAM_BUFFER";

/// One cache group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Byte budget for keys and values.
    pub capacity_bytes: usize,
    /// Bucket width in seconds; zero means entries never expire.
    #[serde(default)]
    pub lifetime_secs: u64,
}

impl GroupConfig {
    /// Bucket width as a duration.
    #[must_use]
    pub const fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }
}

/// Cache section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Id of this process among its peers; random when unset.
    #[serde(default)]
    pub peer_id: Option<String>,
    /// Groups by name.
    pub groups: HashMap<String, GroupConfig>,
}

/// Root client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Directory holding the HTCondor tools; `PATH` when unset.
    pub bin_dir: Option<PathBuf>,
    /// Default `-pool` for commands built from this config.
    pub pool: Option<String>,
    /// Longest accepted output line in bytes.
    pub max_line_bytes: usize,
    /// Records buffered between a stream and its consumer.
    pub stream_buffer: usize,
    /// Cache groups; no caching when absent.
    pub cache: Option<CacheConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bin_dir: None,
            pool: None,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            stream_buffer: DEFAULT_CHANNEL_CAPACITY,
            cache: None,
        }
    }
}

impl CacheConfig {
    /// Validate every group and ensure at least one exists.
    pub fn validate(&self) -> Result<(), String> {
        if self.groups.is_empty() {
            return Err("at least one cache group must be defined".into());
        }
        if self.peer_id.as_deref() == Some("") {
            return Err("peer_id must not be empty".into());
        }
        for (name, group) in &self.groups {
            if group.capacity_bytes == 0 {
                return Err(format!(
                    "group `{name}` invalid: capacity_bytes must be greater than 0"
                ));
            }
        }
        Ok(())
    }
}

impl ClientConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_line_bytes == 0 {
            return Err("max_line_bytes must be greater than 0".into());
        }
        if self.stream_buffer == 0 {
            return Err("stream_buffer must be greater than 0".into());
        }
        if let Some(cache) = &self.cache {
            cache.validate().map_err(|e| format!("cache invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, is not valid JSON or does not
    /// validate.
    pub fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_json_str(&text)
            .map_err(|e| anyhow!(e))
            .with_context(|| format!("loading config file {}", path.display()))
    }

    /// Defaults overridden by `HTCONDOR_QUERY_*` environment variables, after
    /// loading a `.env` file if one is present.
    ///
    /// # Errors
    ///
    /// Fails when a numeric variable does not parse or the result does not
    /// validate.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides looked up by variable name.
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::from_env`].
    pub fn with_overrides<F>(mut self, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(pool) = lookup(ENV_POOL) {
            self.pool = Some(pool).filter(|p| !p.is_empty());
        }
        if let Some(dir) = lookup(ENV_BIN_DIR) {
            self.bin_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = lookup(ENV_MAX_LINE_BYTES) {
            self.max_line_bytes = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_MAX_LINE_BYTES}={raw:?} is not a byte count"))?;
        }
        if let Some(raw) = lookup(ENV_STREAM_BUFFER) {
            self.stream_buffer = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_STREAM_BUFFER}={raw:?} is not a record count"))?;
        }
        self.validate().map_err(|e| anyhow!(e))?;
        Ok(self)
    }

    /// Parser settings from this configuration.
    #[must_use]
    pub fn reader(&self) -> ClassAdReader {
        ClassAdReader::new()
            .with_max_line_bytes(self.max_line_bytes)
            .with_channel_capacity(self.stream_buffer)
    }

    /// Process executor from this configuration.
    #[must_use]
    pub fn executor(&self) -> ProcessExecutor {
        match &self.bin_dir {
            Some(dir) => ProcessExecutor::new().with_bin_dir(dir),
            None => ProcessExecutor::new(),
        }
    }

    /// Settings of the cache group `name`, if configured.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&GroupConfig> {
        self.cache.as_ref()?.groups.get(name)
    }

    /// New command for `tool` with this configuration's pool, executor and
    /// parser settings applied.
    #[must_use]
    pub fn command(&self, tool: impl Into<String>) -> Command {
        let cmd = Command::new(tool)
            .with_executor(std::sync::Arc::new(self.executor()))
            .with_reader(self.reader());
        match &self.pool {
            Some(pool) => cmd.with_pool(pool.clone()),
            None => cmd,
        }
    }
}
