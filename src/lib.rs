// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # ledger-etl
//!
//! Paginated ledger fetching with schema discovery, validation,
//! transformation and pluggable sinks.
//!
//! ## Features
//!
//! - **Paged Fetch**: one request in flight at a time, cursor-driven, with
//!   retry and backoff on failed pages
//! - **Page-Key Sequences**: `current` resolution, sharded descending keys,
//!   repeat mode
//! - **Schema Discovery**: incremental field-path mappings over raw records
//! - **Validation**: path-sensitive pruning against a declared schema
//! - **Transformation**: amount normalization for objects and transactions
//! - **Sinks**: stdout, log-forwarding agent, fan-out
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ledger_etl::coordinator::{CoordinatorConfig, PagedFetchCoordinator};
//! use ledger_etl::pipeline::{EntryProcessingPipeline, EtlProcessor};
//! use ledger_etl::sink::ConsoleSink;
//! use ledger_etl::transform::PassthroughTransformer;
//! use ledger_etl::transport::WebSocketTransport;
//! use ledger_etl::validate::PassthroughValidator;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> ledger_etl::Result<()> {
//!     let transport = WebSocketTransport::connect("wss://s1.ripple.com:443").await?;
//!     let mut pipeline = EntryProcessingPipeline::new(EtlProcessor::new(
//!         Box::new(PassthroughValidator),
//!         Box::new(PassthroughTransformer),
//!         Box::new(ConsoleSink::stdout()),
//!     ));
//!
//!     let coordinator = PagedFetchCoordinator::new(CoordinatorConfig::default());
//!     let summary = coordinator
//!         .run(transport, &mut pipeline, &CancellationToken::new())
//!         .await?;
//!     println!("{} records", summary.stats.records);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  page requests  ┌──────────────────────────────────────┐
//! │  Transport   │◄────────────────│        PagedFetchCoordinator          │
//! │  (WebSocket) │────────────────►│  requester ◄─ queue ─► consumer       │
//! └──────────────┘    messages     └──────────────────┬───────────────────┘
//!                                                     │ records
//!                                  ┌──────────────────▼───────────────────┐
//!                                  │       EntryProcessingPipeline         │
//!                                  │  discovery → validate → transform     │
//!                                  └──────────────────┬───────────────────┘
//!                                                     │
//!                                  ┌─────────┬────────┴──┬────────────────┐
//!                                  │ Console │  Forward  │  Fan-out       │
//!                                  └─────────┴───────────┴────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Run configuration
pub mod config;

/// Field-path schema mappings and discovery
pub mod schema;

/// Declared-schema validation
pub mod validate;

/// Record transformation
pub mod transform;

/// Record destinations
pub mod sink;

/// Message transports and page layouts
pub mod transport;

/// Paged fetch coordination
pub mod coordinator;

/// Entry-processing pipeline
pub mod pipeline;

/// Page-key resolution over JSON-RPC
pub mod resolve;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::RunConfig;
pub use coordinator::{CoordinatorConfig, PagedFetchCoordinator, RunOutcome, RunSummary};
pub use pipeline::{EntryProcessingPipeline, EntryProcessor, EtlProcessor};
pub use schema::SchemaMapping;
pub use sink::Sink;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
