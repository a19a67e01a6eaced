//! Concurrent sharded fetch
//!
//! Splits the page keys below a start into `shard_count` shards and runs one
//! coordinator per shard at the same time. Every shard owns its transport,
//! queue and processor; nothing is shared until the caller combines the
//! results.

use super::fetch::PagedFetchCoordinator;
use super::shard::ShardedPageKeys;
use super::types::{CoordinatorConfig, RunSummary};
use crate::error::{Error, Result};
use crate::pipeline::EntryProcessor;
use crate::transport::Transport;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Result of one shard
#[derive(Debug)]
pub struct ShardOutcome<P> {
    /// Shard index
    pub shard_index: u64,
    /// The shard's processor, returned for inspection
    pub processor: P,
    /// How the shard's run ended
    pub result: Result<RunSummary>,
}

/// Runs every shard of a page-key range concurrently
#[derive(Debug, Clone)]
pub struct ShardedFetch {
    config: CoordinatorConfig,
    start: u64,
    shard_count: u64,
}

impl ShardedFetch {
    /// Split the keys from `start` down into `shard_count` shards
    ///
    /// `config.start` and `config.page_keys` are replaced per shard.
    pub fn new(config: CoordinatorConfig, start: u64, shard_count: u64) -> Result<Self> {
        if shard_count == 0 {
            return Err(Error::invalid_value("shards", "must be positive"));
        }
        Ok(Self {
            config,
            start,
            shard_count,
        })
    }

    /// Number of shards
    pub fn shard_count(&self) -> u64 {
        self.shard_count
    }

    /// Coordinator settings for one shard
    pub fn shard_config(&self, shard_index: u64) -> Result<CoordinatorConfig> {
        let keys = ShardedPageKeys::new(self.start, shard_index, self.shard_count)?;
        Ok(self.config.clone().with_page_keys(keys))
    }

    /// Run one `(transport, processor)` pair per shard, in shard order
    ///
    /// Waits for every shard; a failing shard does not stop the others.
    pub async fn run<T, P>(
        &self,
        shards: Vec<(T, P)>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ShardOutcome<P>>>
    where
        T: Transport,
        P: EntryProcessor,
    {
        if shards.len() as u64 != self.shard_count {
            return Err(Error::config(format!(
                "expected {} shard connections, got {}",
                self.shard_count,
                shards.len()
            )));
        }

        let mut runs = Vec::with_capacity(shards.len());
        for (shard_index, (transport, mut processor)) in (0..self.shard_count).zip(shards) {
            let coordinator = PagedFetchCoordinator::new(self.shard_config(shard_index)?);
            runs.push(async move {
                let result = coordinator.run(transport, &mut processor, cancel).await;
                match &result {
                    Ok(summary) => info!(
                        shard_index,
                        records = summary.stats.records,
                        outcome = ?summary.outcome,
                        "shard finished"
                    ),
                    Err(e) => warn!(shard_index, error = %e, "shard failed"),
                }
                ShardOutcome {
                    shard_index,
                    processor,
                    result,
                }
            });
        }

        info!(shards = self.shard_count, start = self.start, "starting sharded fetch");
        Ok(join_all(runs).await)
    }
}
