//! Attribute schema collection over nested records

use super::types::{join_path, SchemaMapping};
use crate::types::{JsonValue, Kind, Record};

/// A `(path, kind)` pair that was new to the mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    /// Flattened field path
    pub path: String,
    /// Kind observed at the path
    pub kind: Kind,
    /// Whether the path itself was unseen before
    pub new_path: bool,
}

/// Accumulates the observed kinds of every flattened field path
///
/// Sequences are descended element-wise: each object element contributes its
/// fields under the sequence's own path. Sequences nested directly inside
/// sequences are recorded as `array` but not flattened further.
#[derive(Debug, Clone, Default)]
pub struct AttributeSchemaCollector {
    mapping: SchemaMapping,
}

impl AttributeSchemaCollector {
    /// Create a collector with an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collector seeded with an existing mapping
    pub fn with_mapping(mapping: SchemaMapping) -> Self {
        Self { mapping }
    }

    /// Observed mapping so far
    pub fn mapping(&self) -> &SchemaMapping {
        &self.mapping
    }

    /// Consume the collector, returning its mapping
    pub fn into_mapping(self) -> SchemaMapping {
        self.mapping
    }

    /// Collect a record into this collector's mapping
    pub fn collect(&mut self, record: &Record) -> Vec<Discovery> {
        collect_schema(record, &mut self.mapping)
    }
}

/// Walk `record` and add every `(path, kind)` to `mapping`
///
/// Returns the pairs that were not in the mapping before. Running this twice
/// on the same record leaves the mapping as after the first run.
pub fn collect_schema(record: &Record, mapping: &mut SchemaMapping) -> Vec<Discovery> {
    let mut discovered = Vec::new();
    let mut stack: Vec<(String, &Record)> = vec![(String::new(), record)];

    while let Some((prefix, fields)) = stack.pop() {
        for (key, value) in fields {
            let path = join_path(&prefix, key);

            match value {
                JsonValue::Object(nested) => stack.push((path.clone(), nested)),
                JsonValue::Array(items) => {
                    for item in items {
                        if let JsonValue::Object(nested) = item {
                            stack.push((path.clone(), nested));
                        }
                    }
                }
                _ => {}
            }

            let kind = Kind::of(value);
            let new_path = !mapping.contains_path(&path);
            if mapping.insert(path.clone(), kind) {
                discovered.push(Discovery {
                    path,
                    kind,
                    new_path,
                });
            }
        }
    }

    discovered
}
