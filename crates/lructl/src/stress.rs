//! Concurrent stress run: one writer and several readers sharing one cache

use std::sync::Arc;
use std::time::Instant;

use anyhow::{ensure, Context, Result};
use lrucache::{LruCache, StatsSnapshot};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Yield to the scheduler every this many operations
const YIELD_EVERY: u64 = 1024;

/// Stress run parameters
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Cache capacity
    pub capacity: usize,
    /// Operations per worker
    pub ops: u64,
    /// Readers pick keys from `0..keyspace`
    pub keyspace: u64,
    /// Number of reader tasks
    pub readers: usize,
    /// Base seed for reader key choice
    pub seed: u64,
}

/// Outcome of a stress run
#[derive(Debug, Serialize)]
pub struct StressReport {
    /// Wall time in milliseconds
    pub elapsed_ms: u64,
    /// Entries left in the cache
    pub len: usize,
    /// Cache capacity
    pub capacity: usize,
    /// Final counters
    pub stats: StatsSnapshot,
}

/// Run the workload and check the capacity bound afterwards
pub async fn run(config: StressConfig) -> Result<StressReport> {
    if config.readers > 0 && config.ops > 0 {
        ensure!(config.keyspace > 0, "keyspace must be greater than 0");
    }

    let cache: Arc<LruCache<String, u64>> = Arc::new(LruCache::new(config.capacity)?);
    let started = Instant::now();
    let mut workers: JoinSet<Result<()>> = JoinSet::new();

    info!(
        capacity = config.capacity,
        ops = config.ops,
        readers = config.readers,
        "starting stress run"
    );

    {
        let cache = Arc::clone(&cache);
        let ops = config.ops;
        workers.spawn(async move {
            for i in 0..ops {
                cache.set(i.to_string(), i);
                if i % YIELD_EVERY == 0 {
                    tokio::task::yield_now().await;
                }
            }
            debug!("writer finished");
            Ok(())
        });
    }

    for reader in 0..config.readers {
        let cache = Arc::clone(&cache);
        let ops = config.ops;
        let keyspace = config.keyspace;
        let mut rng = SmallRng::seed_from_u64(config.seed.wrapping_add(reader as u64));
        workers.spawn(async move {
            for i in 0..ops {
                let key = rng.gen_range(0..keyspace);
                if let Some(value) = cache.get(key.to_string().as_str()) {
                    ensure!(value == key, "key {} returned value {}", key, value);
                }
                if i % YIELD_EVERY == 0 {
                    tokio::task::yield_now().await;
                }
            }
            debug!(reader, "reader finished");
            Ok(())
        });
    }

    while let Some(joined) = workers.join_next().await {
        joined.context("stress worker panicked")??;
    }

    let len = cache.len();
    ensure!(
        len <= cache.capacity(),
        "cache holds {} entries, capacity is {}",
        len,
        cache.capacity()
    );

    Ok(StressReport {
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        len,
        capacity: cache.capacity(),
        stats: cache.stats().snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(capacity: usize, ops: u64, readers: usize) -> StressConfig {
        StressConfig {
            capacity,
            ops,
            keyspace: ops,
            readers,
            seed: 42,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stress_run() {
        let report = run(config(10, 20_000, 3)).await.unwrap();

        assert_eq!(report.len, 10);
        assert_eq!(report.capacity, 10);
        assert_eq!(report.stats.inserts, 20_000);
        assert_eq!(report.stats.evictions, 20_000 - 10);
        assert_eq!(report.stats.hits + report.stats.misses, 3 * 20_000);
    }

    #[tokio::test]
    async fn test_stress_without_readers() {
        let report = run(config(100, 50, 0)).await.unwrap();

        assert_eq!(report.len, 50);
        assert_eq!(report.stats.evictions, 0);
    }

    #[tokio::test]
    async fn test_stress_rejects_zero_capacity() {
        let err = run(config(0, 10, 1)).await.unwrap_err();
        assert!(err.to_string().contains("must be greater than 0"));
    }

    #[tokio::test]
    async fn test_stress_zero_ops() {
        let report = run(config(10, 0, 2)).await.unwrap();

        assert_eq!(report.len, 0);
        assert_eq!(report.stats.hits + report.stats.misses, 0);
    }

    #[tokio::test]
    async fn test_stress_report_json() {
        let report = run(config(4, 100, 1)).await.unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert!(json["elapsed_ms"].is_u64());
        assert_eq!(json["len"], 4);
        assert_eq!(json["stats"]["inserts"], 100);
    }

    #[tokio::test]
    async fn test_stress_rejects_empty_keyspace() {
        let mut cfg = config(10, 10, 1);
        cfg.keyspace = 0;

        assert!(run(cfg).await.is_err());
    }
}
