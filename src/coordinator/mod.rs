//! Coordinator module
//!
//! Paginated fetching over a single transport connection.
//!
//! # Overview
//!
//! A run starts at an explicit page key, or at `current`, which is resolved
//! in-band by a one-time request whose acknowledgment carries the concrete
//! key. Each page yields records, which are enriched with the run context and
//! handed to an [`EntryProcessor`](crate::pipeline::EntryProcessor), and a
//! cursor. An absent cursor ends the sequence; the run then completes, moves
//! on to the next sharded page key, or re-resolves `current` in repeat mode.
//!
//! Failed or malformed responses re-issue the same request after a bounded,
//! jittered exponential backoff.
//!
//! [`ShardedFetch`] runs several shards of a key range at once, each with its
//! own connection and processor.

mod fetch;
mod retry;
mod shard;
mod sharded;
mod types;

pub use fetch::PagedFetchCoordinator;
pub use retry::{Backoff, RetryPolicy};
pub use shard::ShardedPageKeys;
pub use sharded::{ShardOutcome, ShardedFetch};
pub use types::{
    CompletionSignal, ContextConfig, CoordinatorConfig, CursorSignal, FetchState,
    PipelineContext, QueueItem, RunOutcome, RunStats, RunSummary, ShardConfig,
};

#[cfg(test)]
mod tests;
