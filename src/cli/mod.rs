//! CLI module
//!
//! Command-line interface for running fetches and inspecting schemas.
//!
//! # Commands
//!
//! - `fetch` - Page through the ledger and deliver records to the sinks
//! - `schema collect` - Discover the schema of records in a file
//! - `schema merge` - Merge mappings from independent runs
//! - `schema show` / `schema list` - Inspect built-in schemas
//! - `validate` - Validate and transform records from a file

mod commands;
mod runner;

pub use commands::{Cli, Commands, FetchArgs, SchemaCommand, SchemaFormat};
pub use runner::{apply_fetch_args, build_pipeline, read_records, Runner};
