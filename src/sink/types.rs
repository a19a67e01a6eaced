//! Sink trait and configuration

use crate::error::Result;
use crate::types::{Environment, PageKey, Record};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default forwarding agent host
pub const DEFAULT_FORWARD_HOST: &str = "0.0.0.0";

/// Default forwarding agent port
pub const DEFAULT_FORWARD_PORT: u16 = 22522;

/// Default forwarding tag
pub const DEFAULT_FORWARD_TAG: &str = "ledger_objects";

/// Destination for transformed records
///
/// `deliver` reports failures to the caller; `ingest` is what the pipeline
/// calls and it never fails: a delivery error is logged and the record is
/// dropped.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Deliver one record
    async fn deliver(&self, record: &Record) -> Result<()>;

    /// Deliver one record, logging any failure
    async fn ingest(&self, record: &Record) {
        if let Err(e) = self.deliver(record).await {
            warn!(sink = self.name(), error = %e, "failed to deliver record");
        }
    }

    /// Called once when a run completes at `page_key`
    async fn done(&self, _page_key: PageKey) {}
}

#[async_trait]
impl<S: Sink + ?Sized> Sink for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn deliver(&self, record: &Record) -> Result<()> {
        (**self).deliver(record).await
    }

    async fn ingest(&self, record: &Record) {
        (**self).ingest(record).await;
    }

    async fn done(&self, page_key: PageKey) {
        (**self).done(page_key).await;
    }
}

/// Forwarding agent settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardConfig {
    /// Agent host
    pub host: String,
    /// Agent port
    pub port: u16,
    /// Tag suffix; the full tag is `<environment>.<tag>`
    pub tag: String,
    /// Environment label prefixed to the tag
    pub environment: Environment,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_FORWARD_HOST.to_string(),
            port: DEFAULT_FORWARD_PORT,
            tag: DEFAULT_FORWARD_TAG.to_string(),
            environment: Environment::default(),
            connect_timeout_ms: 5_000,
        }
    }
}

impl ForwardConfig {
    /// Full forwarding tag
    pub fn full_tag(&self) -> String {
        format!("{}.{}", self.environment, self.tag)
    }

    /// `host:port` address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Sinks section of a run configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Print records to stdout
    pub console: bool,
    /// Pretty-print console output
    pub pretty: bool,
    /// Forward records to a log-forwarding agent
    pub forward: Option<ForwardConfig>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            console: true,
            pretty: false,
            forward: None,
        }
    }
}
