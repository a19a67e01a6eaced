//! Run configuration
//!
//! A run is described by a YAML file. Every section has defaults, so an empty
//! file fetches ledger objects from a public node, validates them against the
//! built-in object schema and prints them to stdout.

use crate::coordinator::{ContextConfig, CoordinatorConfig, RetryPolicy, ShardConfig, ShardedFetch};
use crate::error::{Error, Result};
use crate::schema::{resolve_schema, SchemaMapping};
use crate::sink::SinkConfig;
use crate::transform::{TransformConfig, TransformPreset};
use crate::transport::LayoutConfig;
use crate::types::PageKey;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default WebSocket endpoint
pub const DEFAULT_SOURCE_URL: &str = "wss://s1.ripple.com:443";

// ============================================================================
// Top-Level Run Config
// ============================================================================

/// Complete run configuration loaded from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Where and from which page key to fetch
    pub source: SourceConfig,

    /// Message layout of the source
    pub layout: LayoutConfig,

    /// Declared schema and discovery settings
    pub schema: SchemaConfig,

    /// Record reshaping
    pub transform: TransformConfig,

    /// Record destinations
    pub sinks: SinkConfig,

    /// Fields attached to every record
    pub context: ContextConfig,

    /// Failure handling for fetches and lookups
    pub retry: RetryPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            layout: LayoutConfig::default(),
            schema: SchemaConfig::default(),
            transform: TransformConfig::preset(TransformPreset::LedgerObject),
            sinks: SinkConfig::default(),
            context: ContextConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl RunConfig {
    /// Parse from a YAML string; an empty document yields the defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Option<Self> = serde_yaml::from_str(yaml)?;
        Ok(config.unwrap_or_default())
    }

    /// Load from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Declared schema, if validation is enabled
    pub fn declared_schema(&self) -> Result<Option<SchemaMapping>> {
        self.schema
            .declared
            .as_deref()
            .map(resolve_schema)
            .transpose()
    }

    /// Coordinator settings for a run starting at `start`
    pub fn coordinator_config(&self, start: PageKey) -> Result<CoordinatorConfig> {
        let mut config = CoordinatorConfig::default()
            .with_start(start)
            .with_repeat(self.source.repeat)
            .with_layout(self.layout.build())
            .with_retry(self.retry.clone())
            .with_context(self.context.clone());
        config.repeat_delay_ms = self.source.repeat_delay_ms;

        if let Some(shard) = &self.source.shard {
            let Some(first) = start.index() else {
                return Err(Error::invalid_value(
                    "source.shard",
                    "sharding needs a concrete start page key",
                ));
            };
            config = config.with_page_keys(shard.page_keys(first)?);
        }
        Ok(config)
    }

    /// Concurrent sharded run starting at `start`, when `source.shards` is set
    pub fn sharded_fetch(&self, start: PageKey) -> Result<Option<ShardedFetch>> {
        let Some(shards) = self.source.shards else {
            return Ok(None);
        };
        if self.source.shard.is_some() {
            return Err(Error::invalid_value(
                "source.shards",
                "cannot be combined with source.shard",
            ));
        }
        let Some(first) = start.index() else {
            return Err(Error::invalid_value(
                "source.shards",
                "sharding needs a concrete start page key",
            ));
        };
        let base = self.coordinator_config(start)?;
        ShardedFetch::new(base, first, shards).map(Some)
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Source section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// WebSocket endpoint
    pub url: String,

    /// JSON-RPC endpoint used to resolve `current` before connecting
    pub rpc_url: Option<String>,

    /// First page key, or `current`
    pub start: PageKey,

    /// Keep following `current` after each completed sequence
    pub repeat: bool,

    /// Pause before re-resolving in repeat mode
    pub repeat_delay_ms: u64,

    /// Visit only one shard of the page keys below `start`
    pub shard: Option<ShardConfig>,

    /// Run this many shards of the page keys below `start` concurrently
    pub shards: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            rpc_url: None,
            start: PageKey::Current,
            repeat: false,
            repeat_delay_ms: 1_000,
            shard: None,
            shards: None,
        }
    }
}

/// Schema section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Built-in schema name or path to a YAML/JSON mapping; `None` disables
    /// validation
    pub declared: Option<String>,

    /// Collect the observed schema of raw records
    pub discover: bool,

    /// Log the observed schema when the run completes
    pub report: bool,

    /// Write the observed schema to this file when the run completes
    pub output: Option<String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            declared: Some("ledger_object".to_string()),
            discover: true,
            report: true,
            output: None,
        }
    }
}
