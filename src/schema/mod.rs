//! Schema module
//!
//! Field-path schema mappings and attribute discovery.
//!
//! # Features
//!
//! - **Flattened Paths**: nested field names joined with `.`
//! - **Kind Sets**: every path maps to the set of value kinds seen or allowed
//! - **Discovery**: incremental collection over heterogeneous records
//! - **Built-ins**: declared schemas for ledger objects and transactions

mod builtin;
mod collector;
mod types;

pub use builtin::{
    get_builtin_schema, is_builtin_schema, list_builtin_schemas, load_builtin_schema,
    resolve_schema, BUILTIN_SCHEMAS,
};
pub use collector::{collect_schema, AttributeSchemaCollector, Discovery};
pub use types::{join_path, KindNaming, SchemaMapping};
