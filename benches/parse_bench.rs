//! Benchmarks for ClassAd parsing, cache keys and cached query lookups.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use htcondor_query::core::{CachePool, Executor, NoPeers, Output, SpawnedProcess};
use htcondor_query::{CacheKey, ClassAdReader, Command, QueryError};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Fixtures
// ============================================================================

fn job_ads(count: usize) -> String {
    let mut out = String::new();
    for id in 0..count {
        out.push_str(&format!(
            "ClusterId = {id}\nOwner = \"user{}\"\nRemoteSysCpu = {}.5\nRequirements = ( TARGET.OpSys == \"LINUX\" ) && ( TARGET.Arch == \"X86_64\" )\nLastRemoteHost = \"slot1@node{id}.example.org\"\n\n",
            id % 10,
            id % 100
        ));
    }
    out
}

#[derive(Debug)]
struct StaticExecutor(String);

#[async_trait]
impl Executor for StaticExecutor {
    async fn run(
        &self,
        _command: &Command,
        _cancel: CancellationToken,
    ) -> Result<Output, QueryError> {
        Ok(Output::ok(self.0.clone()))
    }

    async fn spawn(
        &self,
        _command: &Command,
        _cancel: CancellationToken,
    ) -> Result<SpawnedProcess, QueryError> {
        Ok(SpawnedProcess {
            stdout: Box::pin(std::io::Cursor::new(self.0.clone().into_bytes())),
            completion: Box::pin(async { Ok(()) }),
        })
    }
}

// ============================================================================
// Parsing
// ============================================================================

fn bench_parse_bytes(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_bytes");
    for count in [10usize, 100, 1000] {
        let input = job_ads(count);
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &input, |b, input| {
            let reader = ClassAdReader::new();
            b.iter(|| black_box(reader.parse_bytes(input.as_bytes())));
        });
    }
    group.finish();
}

fn bench_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream");
    let input = job_ads(1000);
    group.throughput(Throughput::Elements(1000));
    group.bench_function("async_1000", |b| {
        b.to_async(Runtime::new().unwrap()).iter(|| {
            let input = input.clone();
            async move {
                let (tx, mut rx) = mpsc::channel(64);
                let (etx, _erx) = mpsc::unbounded_channel();
                let producer = tokio::spawn(async move {
                    ClassAdReader::new().stream(input.as_bytes(), tx, etx).await;
                });
                let mut count = 0usize;
                while rx.recv().await.is_some() {
                    count += 1;
                }
                producer.await.unwrap();
                black_box(count)
            }
        });
    });
    group.finish();
}

// ============================================================================
// Cache keys
// ============================================================================

fn bench_cache_key(c: &mut Criterion) {
    let command = Command::new("condor_q")
        .with_pool("cm.example.org")
        .with_constraint("Owner == \"jmalbos\" && JobStatus == 2")
        .with_attribute("ClusterId")
        .with_attribute("ProcId")
        .with_attribute("RemoteSysCpu");
    let now = SystemTime::now();
    let lifetime = Duration::from_secs(60);

    c.bench_function("cache_key_encode", |b| {
        b.iter(|| black_box(CacheKey::encode(&command, now, lifetime)));
    });
    let key = CacheKey::encode(&command, now, lifetime);
    c.bench_function("cache_key_decode", |b| {
        b.iter(|| black_box(key.decode()));
    });
}

// ============================================================================
// Cached lookups
// ============================================================================

fn bench_cache_hit(c: &mut Criterion) {
    let runtime = Runtime::new().unwrap();
    let pool = CachePool::new(Arc::new(StaticExecutor(job_ads(100))), Arc::new(NoPeers));
    let group = pool.register_group("jobs", 16 << 20);
    let command = Command::new("condor_q").with_cache(group.clone(), Duration::from_secs(3600));
    let key = command.cache_key_at(SystemTime::now());
    runtime
        .block_on(group.get(&key, CancellationToken::new()))
        .unwrap();

    c.bench_function("cache_get_hit", |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(group.get(&key, CancellationToken::new()).await)
        });
    });
}

criterion_group!(
    benches,
    bench_parse_bytes,
    bench_stream,
    bench_cache_key,
    bench_cache_hit
);
criterion_main!(benches);
