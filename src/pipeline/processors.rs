//! Built-in entry processors

use super::types::EntryProcessor;
use crate::schema::{AttributeSchemaCollector, SchemaMapping};
use crate::sink::Sink;
use crate::transform::Transformer;
use crate::types::{JsonValue, PageKey, Record};
use crate::validate::Validator;
use async_trait::async_trait;
use std::fmt;
use tracing::info;

// ============================================================================
// Schema discovery
// ============================================================================

/// Accumulates the observed schema of every raw record
///
/// Newly seen paths are reported at `info`; the full mapping is logged when
/// the run completes.
#[derive(Debug)]
pub struct SchemaDiscoveryProcessor {
    collector: AttributeSchemaCollector,
    report_on_done: bool,
}

impl SchemaDiscoveryProcessor {
    /// Start from an empty mapping
    pub fn new() -> Self {
        Self {
            collector: AttributeSchemaCollector::new(),
            report_on_done: true,
        }
    }

    /// Start from a known mapping so only genuinely new paths are reported
    pub fn with_initial(mapping: SchemaMapping) -> Self {
        Self {
            collector: AttributeSchemaCollector::with_mapping(mapping),
            report_on_done: true,
        }
    }

    /// Toggle the mapping report at completion
    pub fn with_report_on_done(mut self, report: bool) -> Self {
        self.report_on_done = report;
        self
    }

    /// Mapping observed so far
    pub fn mapping(&self) -> &SchemaMapping {
        self.collector.mapping()
    }

    /// Take the observed mapping
    pub fn into_mapping(self) -> SchemaMapping {
        self.collector.into_mapping()
    }
}

impl Default for SchemaDiscoveryProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntryProcessor for SchemaDiscoveryProcessor {
    async fn process(&mut self, record: &Record) {
        for discovery in self.collector.collect(record) {
            if discovery.new_path {
                info!(path = %discovery.path, kind = %discovery.kind, "new field path discovered");
            } else {
                info!(path = %discovery.path, kind = %discovery.kind, "new kind for field path");
            }
        }
    }

    async fn done(&mut self, page_key: PageKey) {
        if self.report_on_done {
            info!(
                %page_key,
                paths = self.mapping().len(),
                "observed schema:\n{}",
                self.mapping()
            );
        }
    }
}

// ============================================================================
// Validate -> transform -> sink
// ============================================================================

/// Validates, transforms and delivers each record
pub struct EtlProcessor {
    validator: Box<dyn Validator>,
    transformer: Box<dyn Transformer>,
    sink: Box<dyn Sink>,
    delivered: u64,
}

impl EtlProcessor {
    /// Create the stage from its three parts
    pub fn new(
        validator: Box<dyn Validator>,
        transformer: Box<dyn Transformer>,
        sink: Box<dyn Sink>,
    ) -> Self {
        Self {
            validator,
            transformer,
            sink,
            delivered: 0,
        }
    }

    /// Records handed to the sink so far
    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl fmt::Debug for EtlProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EtlProcessor")
            .field("sink", &self.sink.name())
            .field("delivered", &self.delivered)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EntryProcessor for EtlProcessor {
    async fn process(&mut self, record: &Record) {
        let validated = self.validator.validate(record);
        let transformed = self.transformer.transform(&validated);
        self.sink.ingest(&transformed).await;
        self.delivered += 1;
    }

    async fn done(&mut self, page_key: PageKey) {
        self.sink.done(page_key).await;
    }
}

// ============================================================================
// Payment paths
// ============================================================================

/// Summary of one payment's paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSummary {
    /// Ledger the payment was read from, when the record carries it
    pub ledger_index: Option<u64>,
    /// Transaction hash
    pub hash: Option<String>,
    /// Engine result code
    pub result: Option<String>,
    /// Resolved steps of each path
    pub paths: Vec<Vec<String>>,
    /// One plus the number of modified offers
    pub offer_count: usize,
}

impl PaymentSummary {
    /// Summarize a `Payment` transaction; other records yield `None`
    pub fn from_record(record: &Record) -> Option<Self> {
        if record.get("TransactionType").and_then(JsonValue::as_str) != Some("Payment") {
            return None;
        }

        let paths = record
            .get("Paths")
            .and_then(JsonValue::as_array)
            .map(|paths| {
                paths
                    .iter()
                    .map(|path| {
                        path.as_array()
                            .map(|steps| steps.iter().map(path_step).collect())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();

        let meta = record.get("metaData");
        let modified_offers = meta
            .and_then(|m| m.get("AffectedNodes"))
            .and_then(JsonValue::as_array)
            .map(|nodes| {
                nodes
                    .iter()
                    .filter(|node| {
                        node.get("ModifiedNode")
                            .and_then(|n| n.get("LedgerEntryType"))
                            .and_then(JsonValue::as_str)
                            == Some("Offer")
                    })
                    .count()
            })
            .unwrap_or(0);

        let ledger_index = record
            .get("ledger_index")
            .or_else(|| record.get("inLedger"))
            .and_then(JsonValue::as_u64);

        Some(Self {
            ledger_index,
            hash: string_field(record.get("hash")),
            result: string_field(meta.and_then(|m| m.get("TransactionResult"))),
            paths,
            offer_count: 1 + modified_offers,
        })
    }
}

impl fmt::Display for PaymentSummary {
    /// `ledger \t hash \t result \t path_count \t offers[|step sizes] \t *paths`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ledger = self
            .ledger_index
            .map_or_else(|| "-".to_string(), |i| i.to_string());
        let step_sizes = if self.paths.is_empty() {
            String::new()
        } else {
            let sizes: Vec<String> = self.paths.iter().map(|p| p.len().to_string()).collect();
            format!("|{}", sizes.join("\t"))
        };
        let paths: Vec<String> = self.paths.iter().map(|p| p.join(">")).collect();
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}{}\t*{}",
            ledger,
            self.hash.as_deref().unwrap_or("-"),
            self.result.as_deref().unwrap_or("-"),
            self.paths.len(),
            self.offer_count,
            step_sizes,
            paths.join("-")
        )
    }
}

fn string_field(value: Option<&JsonValue>) -> Option<String> {
    value.and_then(JsonValue::as_str).map(str::to_string)
}

/// `rippling:<account>`, `<currency>:<issuer>` or `<currency>`
fn path_step(step: &JsonValue) -> String {
    let field = |name: &str| {
        step.get(name)
            .and_then(JsonValue::as_str)
            .filter(|s| !s.is_empty())
    };
    match (field("account"), field("currency"), field("issuer")) {
        (Some(account), _, _) => format!("rippling:{account}"),
        (None, Some(currency), Some(issuer)) => format!("{currency}:{issuer}"),
        (None, Some(currency), None) => currency.to_string(),
        (None, None, Some(issuer)) => format!(":{issuer}"),
        (None, None, None) => String::new(),
    }
}

/// Logs a path summary line for every payment
#[derive(Debug, Default)]
pub struct PaymentPathProcessor {
    summaries: Vec<PaymentSummary>,
    keep: bool,
}

impl PaymentPathProcessor {
    /// Create a processor that only logs
    pub fn new() -> Self {
        Self::default()
    }

    /// Also keep every summary in memory
    pub fn with_retained(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    /// Retained summaries
    pub fn summaries(&self) -> &[PaymentSummary] {
        &self.summaries
    }
}

#[async_trait]
impl EntryProcessor for PaymentPathProcessor {
    async fn process(&mut self, record: &Record) {
        let Some(summary) = PaymentSummary::from_record(record) else {
            return;
        };
        info!(target: "payment_paths", "{summary}");
        if self.keep {
            self.summaries.push(summary);
        }
    }

    async fn done(&mut self, page_key: PageKey) {
        info!(target: "payment_paths", %page_key, "payment path summary finished");
    }
}
