//! Built-in declared schemas embedded in the binary
//!
//! Lets a run file say `schema: ledger_object` instead of pointing at a file.

use super::types::SchemaMapping;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Built-in declared schema YAML definitions
pub static BUILTIN_SCHEMAS: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    // Ledger state objects (ledger_data)
    m.insert("ledger_object", include_str!("../../schemas/ledger_object.yaml"));
    m.insert("ledger_objects", include_str!("../../schemas/ledger_object.yaml"));

    // Expanded transactions with metadata
    m.insert(
        "ledger_transaction",
        include_str!("../../schemas/ledger_transaction.yaml"),
    );
    m.insert(
        "ledger_transactions",
        include_str!("../../schemas/ledger_transaction.yaml"),
    );

    m
});

/// Get a built-in schema's YAML source by name
pub fn get_builtin_schema(name: &str) -> Option<&'static str> {
    BUILTIN_SCHEMAS.get(name).copied()
}

/// Check if a name refers to a built-in schema
pub fn is_builtin_schema(name: &str) -> bool {
    BUILTIN_SCHEMAS.contains_key(name)
}

/// List built-in schema names (sorted, aliases included)
pub fn list_builtin_schemas() -> Vec<&'static str> {
    let mut names: Vec<_> = BUILTIN_SCHEMAS.keys().copied().collect();
    names.sort_unstable();
    names
}

/// Parse a built-in schema by name
pub fn load_builtin_schema(name: &str) -> Result<SchemaMapping> {
    let yaml = get_builtin_schema(name).ok_or_else(|| Error::UnknownSchema {
        name: name.to_string(),
    })?;
    SchemaMapping::from_yaml_str(yaml)
}

/// Resolve a schema reference: a built-in name or a file path
pub fn resolve_schema(reference: &str) -> Result<SchemaMapping> {
    if is_builtin_schema(reference) {
        load_builtin_schema(reference)
    } else {
        SchemaMapping::load(reference)
    }
}
