//! Pipeline module
//!
//! Entry processors consume the raw records a fetch produces. The standard
//! pipeline runs schema discovery on the raw record and, independently,
//! validates, transforms and delivers a copy of it.

mod entry;
mod processors;
mod types;

pub use entry::EntryProcessingPipeline;
pub use processors::{EtlProcessor, PaymentPathProcessor, PaymentSummary, SchemaDiscoveryProcessor};
pub use types::{AggregateProcessor, EntryProcessor};
