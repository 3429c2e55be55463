//! Immutable description of an HTCondor query.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::classad::ClassAdReader;
use crate::core::cache::QueryCache;
use crate::core::executor::Executor;
use crate::core::key::CacheKey;
use crate::infra::process::ProcessExecutor;

/// Flag selecting the collector (pool) to query.
pub const POOL_FLAG: &str = "-pool";
/// Flag selecting a named daemon, e.g. a schedd.
pub const NAME_FLAG: &str = "-name";
/// Flag limiting the number of returned records.
pub const LIMIT_FLAG: &str = "-limit";
/// Flag carrying a constraint expression.
pub const CONSTRAINT_FLAG: &str = "-constraint";
/// Attribute-selection flag; prints the selected attributes in long format.
pub const ATTRIBUTE_FLAG: &str = "-af:lrng";
/// Full-record flag used when no attributes are selected.
pub const FULL_RECORD_FLAG: &str = "-long";

/// Association between a command and a cache group.
#[derive(Debug, Clone)]
pub struct CacheBinding {
    /// Group that serves this command.
    pub group: Arc<QueryCache>,
    /// Bucket width; zero disables time bucketing.
    pub lifetime: Duration,
}

/// An HTCondor command-line query, e.g. `condor_q`.
///
/// A `Command` is a value: builder methods consume it and return the updated
/// value, and `clone()` yields an independent copy. Specializing a shared base
/// query therefore never affects other users of the base.
///
/// ```
/// use htcondor_query::Command;
///
/// let base = Command::new("condor_q").with_pool("cm.example.org:9618");
/// let mine = base.clone().with_constraint("Owner == \"me\"").with_attribute("ClusterId");
///
/// assert_eq!(base.make_args(), ["-pool", "cm.example.org:9618", "-long"]);
/// assert_eq!(
///     mine.make_args(),
///     ["-pool", "cm.example.org:9618", "-constraint", "Owner == \"me\"", "-af:lrng", "ClusterId"]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Command {
    tool: String,
    pool: Option<String>,
    name: Option<String>,
    limit: usize,
    constraint: Option<String>,
    attributes: Vec<String>,
    args: Vec<String>,
    cache: Option<CacheBinding>,
    executor: Arc<dyn Executor>,
    reader: ClassAdReader,
}

fn non_empty(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    (!value.is_empty()).then_some(value)
}

impl Command {
    /// Create a command for `tool` with no arguments.
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            pool: None,
            name: None,
            limit: 0,
            constraint: None,
            attributes: Vec::new(),
            args: Vec::new(),
            cache: None,
            executor: Arc::new(ProcessExecutor::default()),
            reader: ClassAdReader::default(),
        }
    }

    /// Rebuild a command from a tool name and raw argument lists, as recovered
    /// from a cache key.
    pub(crate) fn from_raw(tool: String, args: Vec<String>, attributes: Vec<String>) -> Self {
        let mut cmd = Self::new(tool);
        cmd.args = args;
        cmd.attributes = attributes;
        cmd
    }

    /// Set the `-pool` argument. An empty string clears it.
    #[must_use]
    pub fn with_pool(mut self, pool: impl Into<String>) -> Self {
        self.pool = non_empty(pool);
        self
    }

    /// Set the `-name` argument. An empty string clears it.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = non_empty(name);
        self
    }

    /// Set the `-limit` argument. Zero leaves it unset.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the `-constraint` argument. An empty string clears it.
    #[must_use]
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = non_empty(constraint);
        self
    }

    /// Request a specific attribute instead of the whole record. Can be
    /// called repeatedly; an attribute already selected is ignored.
    #[must_use]
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        let attribute = attribute.into();
        if !self.attributes.contains(&attribute) {
            self.attributes.push(attribute);
        }
        self
    }

    /// Append an extra argument, e.g. `-schedd`. Can be called repeatedly.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Route queries through `group`, bucketing keys by `lifetime`. A zero
    /// lifetime never expires entries; they leave only by LRU eviction.
    #[must_use]
    pub fn with_cache(mut self, group: Arc<QueryCache>, lifetime: Duration) -> Self {
        self.cache = Some(CacheBinding { group, lifetime });
        self
    }

    /// Drop any cache association.
    #[must_use]
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    /// Use `executor` for uncached runs instead of spawning local processes.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    /// Parser settings used for this command's output.
    #[must_use]
    pub const fn with_reader(mut self, reader: ClassAdReader) -> Self {
        self.reader = reader;
        self
    }

    /// Tool name, e.g. `condor_status`.
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// The `-pool` value, if set.
    #[must_use]
    pub fn pool(&self) -> Option<&str> {
        self.pool.as_deref()
    }

    /// The `-name` value, if set.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The `-limit` value; zero when unset.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// The `-constraint` value, if set.
    #[must_use]
    pub fn constraint(&self) -> Option<&str> {
        self.constraint.as_deref()
    }

    /// Selected attributes, in selection order.
    #[must_use]
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Extra arguments, in call order.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Cache association, if any.
    #[must_use]
    pub const fn cache(&self) -> Option<&CacheBinding> {
        self.cache.as_ref()
    }

    /// Executor used for uncached runs.
    #[must_use]
    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    /// Parser settings.
    #[must_use]
    pub const fn reader(&self) -> ClassAdReader {
        self.reader
    }

    /// Build the complete argument list passed to the tool.
    ///
    /// The order is fixed so equal commands always render identical lists:
    /// pool, name, limit, constraint, extra args, then either the attribute
    /// selection or the full-record flag.
    #[must_use]
    pub fn make_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(8 + self.args.len() + self.attributes.len());
        if let Some(pool) = &self.pool {
            args.extend([POOL_FLAG.to_string(), pool.clone()]);
        }
        if let Some(name) = &self.name {
            args.extend([NAME_FLAG.to_string(), name.clone()]);
        }
        if self.limit > 0 {
            args.extend([LIMIT_FLAG.to_string(), self.limit.to_string()]);
        }
        if let Some(constraint) = &self.constraint {
            args.extend([CONSTRAINT_FLAG.to_string(), constraint.clone()]);
        }
        args.extend(self.args.iter().cloned());
        if self.attributes.is_empty() {
            args.push(FULL_RECORD_FLAG.to_string());
        } else {
            args.push(ATTRIBUTE_FLAG.to_string());
            args.extend(self.attributes.iter().cloned());
        }
        args
    }

    /// Tool and arguments as one space-separated line, for logs and spans.
    #[must_use]
    pub fn statement(&self) -> String {
        std::iter::once(self.tool.clone())
            .chain(self.make_args())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Cache key for this command at `now`, using the bound cache lifetime
    /// (or no bucketing when the command is not cached).
    #[must_use]
    pub fn cache_key_at(&self, now: SystemTime) -> CacheKey {
        let lifetime = self.cache.as_ref().map_or(Duration::ZERO, |c| c.lifetime);
        CacheKey::encode(self, now, lifetime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_argument_order() {
        let cmd = Command::new("condor_q")
            .with_arg("-allusers")
            .with_attribute("ClusterId")
            .with_constraint("JobStatus == 2")
            .with_limit(10)
            .with_name("schedd@host")
            .with_pool("cm:9618")
            .with_attribute("ProcId")
            .with_arg("-nobatch");
        assert_eq!(
            cmd.make_args(),
            [
                "-pool",
                "cm:9618",
                "-name",
                "schedd@host",
                "-limit",
                "10",
                "-constraint",
                "JobStatus == 2",
                "-allusers",
                "-nobatch",
                "-af:lrng",
                "ClusterId",
                "ProcId",
            ]
        );
    }

    #[test]
    fn test_bare_command_requests_full_records() {
        assert_eq!(Command::new("condor_status").make_args(), ["-long"]);
    }

    #[test]
    fn test_empty_values_are_unset() {
        let cmd = Command::new("condor_q")
            .with_pool("cm")
            .with_pool("")
            .with_name("")
            .with_constraint("")
            .with_limit(0);
        assert_eq!(cmd.pool(), None);
        assert_eq!(cmd.make_args(), ["-long"]);
    }

    #[test]
    fn test_attributes_are_an_ordered_set() {
        let cmd = Command::new("condor_q")
            .with_attribute("B")
            .with_attribute("A")
            .with_attribute("B");
        assert_eq!(cmd.attributes(), ["B", "A"]);
    }

    #[test]
    fn test_clone_is_independent() {
        let base = Command::new("condor_history").with_pool("cm");
        let derived = base.clone().with_constraint("false").with_arg("-forwards");
        assert_eq!(base.make_args(), ["-pool", "cm", "-long"]);
        assert_eq!(
            derived.make_args(),
            ["-pool", "cm", "-constraint", "false", "-forwards", "-long"]
        );
    }

    #[test]
    fn test_statement() {
        let cmd = Command::new("condor_status").with_arg("-schedd").with_attribute("Name");
        assert_eq!(cmd.statement(), "condor_status -schedd -af:lrng Name");
    }
}
