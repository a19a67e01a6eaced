//! Fan-out and in-memory sinks

use super::types::Sink;
use crate::error::{Error, Result};
use crate::types::{PageKey, Record};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Delivers every record to each child in order
///
/// A failing child is logged and skipped; the remaining children still
/// receive the record.
#[derive(Default)]
pub struct FanOutSink {
    children: Vec<Box<dyn Sink>>,
    failures: AtomicU64,
}

impl FanOutSink {
    /// Create an empty fan-out
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a child
    pub fn with_sink(mut self, sink: impl Sink + 'static) -> Self {
        self.children.push(Box::new(sink));
        self
    }

    /// Append a boxed child
    pub fn push(&mut self, sink: Box<dyn Sink>) {
        self.children.push(sink);
    }

    /// Number of children
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether there are no children
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Child deliveries that failed so far
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    async fn deliver_all(&self, record: &Record) -> Vec<String> {
        let mut failed = Vec::new();
        for child in &self.children {
            if let Err(e) = child.deliver(record).await {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(sink = child.name(), error = %e, "failed to deliver record");
                failed.push(child.name().to_string());
            }
        }
        failed
    }
}

#[async_trait]
impl Sink for FanOutSink {
    fn name(&self) -> &str {
        "fan-out"
    }

    async fn deliver(&self, record: &Record) -> Result<()> {
        let failed = self.deliver_all(record).await;
        if failed.is_empty() {
            Ok(())
        } else {
            Err(Error::sink(
                "fan-out",
                format!("failed children: {}", failed.join(", ")),
            ))
        }
    }

    async fn ingest(&self, record: &Record) {
        self.deliver_all(record).await;
    }

    async fn done(&self, page_key: PageKey) {
        for child in &self.children {
            child.done(page_key).await;
        }
    }
}

/// Collects records in memory
///
/// Clones share the same buffer, so a handle kept by the caller observes what
/// the pipeline delivered.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Record>>>,
    completions: Arc<Mutex<Vec<PageKey>>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Records delivered so far
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Page keys passed to `done`
    pub fn completions(&self) -> Vec<PageKey> {
        self.completions.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Sink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn deliver(&self, record: &Record) -> Result<()> {
        self.records
            .lock()
            .map_err(|_| Error::sink("memory", "buffer lock poisoned"))?
            .push(record.clone());
        Ok(())
    }

    async fn done(&self, page_key: PageKey) {
        if let Ok(mut completions) = self.completions.lock() {
            completions.push(page_key);
        }
    }
}
