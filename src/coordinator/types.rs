//! Coordinator types

use super::retry::RetryPolicy;
use super::shard::ShardedPageKeys;
use crate::error::Result;
use crate::transport::PageLayout;
use crate::types::{JsonValue, PageKey, Record};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pagination state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchState {
    /// Waiting for the next `(page_key, cursor)` pair
    #[default]
    AwaitingCursor,
    /// A request is in flight
    RequestSent,
    /// A response is being handled
    PageReceived,
    /// The run is over
    Done,
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FetchState::AwaitingCursor => "awaiting_cursor",
            FetchState::RequestSent => "request_sent",
            FetchState::PageReceived => "page_received",
            FetchState::Done => "done",
        })
    }
}

/// Next page to request; a `None` cursor starts a new sequence
#[derive(Debug, Clone, PartialEq)]
pub struct CursorSignal {
    /// Page key to fetch, `Current` asks for resolution first
    pub page_key: PageKey,
    /// Continuation token
    pub cursor: Option<JsonValue>,
}

impl CursorSignal {
    /// First page of a sequence
    pub fn start(page_key: PageKey) -> Self {
        Self {
            page_key,
            cursor: None,
        }
    }
}

/// Sentinel telling the requester that no more pages will be needed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionSignal {
    /// Last page key fetched
    pub page_key: PageKey,
}

/// Item on the requester's queue
#[derive(Debug, Clone, PartialEq)]
pub enum QueueItem {
    Fetch(CursorSignal),
    Complete(CompletionSignal),
}

/// Record enrichment settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Attach the run's execution id
    pub attach_execution_id: bool,
    /// Attach a per-record sequence number
    pub attach_sequence: bool,
    /// Field holding the execution id
    pub execution_id_field: String,
    /// Field holding the sequence number
    pub sequence_field: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            attach_execution_id: true,
            attach_sequence: true,
            execution_id_field: "_ExecutionID".to_string(),
            sequence_field: "_Sequence".to_string(),
        }
    }
}

/// Per-run context attached to every record
#[derive(Debug, Clone)]
pub struct PipelineContext {
    execution_id: String,
    next_sequence: u64,
    config: ContextConfig,
}

impl PipelineContext {
    /// Fresh context with a random execution id
    pub fn new(config: ContextConfig) -> Self {
        Self::with_execution_id(uuid::Uuid::new_v4().simple().to_string(), config)
    }

    /// Context with a known execution id
    pub fn with_execution_id(execution_id: impl Into<String>, config: ContextConfig) -> Self {
        Self {
            execution_id: execution_id.into(),
            next_sequence: 0,
            config,
        }
    }

    /// Execution id of this run
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Sequence number the next record will get
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Attach the configured fields to `record`
    pub fn enrich(&mut self, record: &mut Record) {
        if self.config.attach_execution_id {
            record.insert(
                self.config.execution_id_field.clone(),
                JsonValue::String(self.execution_id.clone()),
            );
        }
        if self.config.attach_sequence {
            record.insert(
                self.config.sequence_field.clone(),
                JsonValue::from(self.next_sequence),
            );
            self.next_sequence += 1;
        }
    }
}

/// Sharding section of a run configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardConfig {
    /// This worker's shard
    pub index: u64,
    /// Number of shards
    pub size: u64,
}

impl ShardConfig {
    /// Page keys this shard visits from `start` downward
    pub fn page_keys(&self, start: u64) -> Result<ShardedPageKeys> {
        ShardedPageKeys::new(start, self.index, self.size)
    }
}

/// Coordinator settings
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Where the first sequence starts
    pub start: PageKey,
    /// Page keys visited one sequence after another, replacing `start`
    pub page_keys: Option<ShardedPageKeys>,
    /// Re-resolve the current page key after each completed sequence
    pub repeat: bool,
    /// Pause before re-resolving in repeat mode
    pub repeat_delay_ms: u64,
    /// Message layout
    pub layout: PageLayout,
    /// Failure handling
    pub retry: RetryPolicy,
    /// Record enrichment
    pub context: ContextConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            start: PageKey::Current,
            page_keys: None,
            repeat: false,
            repeat_delay_ms: 1_000,
            layout: PageLayout::default(),
            retry: RetryPolicy::default(),
            context: ContextConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Start from an explicit page key or `Current`
    pub fn with_start(mut self, start: PageKey) -> Self {
        self.start = start;
        self
    }

    /// Visit a series of page keys
    pub fn with_page_keys(mut self, keys: ShardedPageKeys) -> Self {
        self.page_keys = Some(keys);
        self
    }

    /// Keep following the current page key
    pub fn with_repeat(mut self, repeat: bool) -> Self {
        self.repeat = repeat;
        self
    }

    /// Set the message layout
    pub fn with_layout(mut self, layout: PageLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set record enrichment
    pub fn with_context(mut self, context: ContextConfig) -> Self {
        self.context = context;
        self
    }
}

/// Statistics from a fetch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Requests sent
    pub requests: u64,
    /// Pages received
    pub pages: u64,
    /// Records handed to the processor
    pub records: u64,
    /// Page items that were not records
    pub skipped_items: u64,
    /// Failed or malformed responses
    pub failures: u64,
    /// Requests re-issued after a failure
    pub retries: u64,
    /// Page-key sequences completed
    pub sequences: u64,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl RunStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page of `records` records
    pub fn add_page(&mut self, records: usize, skipped: usize) {
        self.pages += 1;
        self.records += records as u64;
        self.skipped_items += skipped as u64;
    }

    /// Add a failed response
    pub fn add_failure(&mut self) {
        self.failures += 1;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every sequence was exhausted
    Completed {
        /// Terminal page key
        page_key: PageKey,
    },
    /// No page keys were left to visit before any request was made
    Empty,
    /// Stopped by cancellation between pages
    Cancelled {
        /// Last page key seen, if any
        last_page_key: Option<PageKey>,
    },
}

impl RunOutcome {
    /// Page key passed to `done`, if the run reached one
    pub fn terminal_page_key(&self) -> Option<PageKey> {
        match self {
            RunOutcome::Completed { page_key } => Some(*page_key),
            RunOutcome::Cancelled { last_page_key } => *last_page_key,
            RunOutcome::Empty => None,
        }
    }
}

/// Result of a fetch run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Execution id attached to records
    pub execution_id: String,
    /// How the run ended
    pub outcome: RunOutcome,
    /// Counters
    pub stats: RunStats,
}
