//! Entry-processing pipeline

use super::processors::{EtlProcessor, SchemaDiscoveryProcessor};
use super::types::EntryProcessor;
use crate::schema::SchemaMapping;
use crate::types::{PageKey, Record};
use async_trait::async_trait;
use tracing::debug;

/// Discovery branch plus validate -> transform -> sink branch
///
/// Every record reaches both branches exactly once: the collector sees the
/// raw record, the ETL branch works on its own copies. Extra processors run
/// after both branches.
pub struct EntryProcessingPipeline {
    discovery: Option<SchemaDiscoveryProcessor>,
    etl: EtlProcessor,
    extras: Vec<Box<dyn EntryProcessor>>,
    processed: u64,
}

impl EntryProcessingPipeline {
    /// Pipeline with schema discovery enabled
    pub fn new(etl: EtlProcessor) -> Self {
        Self {
            discovery: Some(SchemaDiscoveryProcessor::new()),
            etl,
            extras: Vec::new(),
            processed: 0,
        }
    }

    /// Replace the discovery branch
    pub fn with_discovery(mut self, discovery: SchemaDiscoveryProcessor) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Disable the discovery branch
    pub fn without_discovery(mut self) -> Self {
        self.discovery = None;
        self
    }

    /// Append an extra processor
    pub fn with_processor(mut self, processor: impl EntryProcessor + 'static) -> Self {
        self.extras.push(Box::new(processor));
        self
    }

    /// Observed mapping, if discovery is enabled
    pub fn observed(&self) -> Option<&SchemaMapping> {
        self.discovery.as_ref().map(SchemaDiscoveryProcessor::mapping)
    }

    /// Take the observed mapping
    pub fn into_observed(self) -> Option<SchemaMapping> {
        self.discovery.map(SchemaDiscoveryProcessor::into_mapping)
    }

    /// Records processed so far
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// The ETL branch
    pub fn etl(&self) -> &EtlProcessor {
        &self.etl
    }
}

#[async_trait]
impl EntryProcessor for EntryProcessingPipeline {
    async fn process(&mut self, record: &Record) {
        if let Some(discovery) = self.discovery.as_mut() {
            discovery.process(record).await;
        }
        self.etl.process(record).await;
        for extra in &mut self.extras {
            extra.process(record).await;
        }
        self.processed += 1;
    }

    async fn done(&mut self, page_key: PageKey) {
        debug!(%page_key, processed = self.processed, "pipeline done");
        if let Some(discovery) = self.discovery.as_mut() {
            discovery.done(page_key).await;
        }
        self.etl.done(page_key).await;
        for extra in &mut self.extras {
            extra.done(page_key).await;
        }
    }
}
