//! Declared-schema record validation

use crate::schema::{join_path, SchemaMapping};
use crate::types::{JsonValue, Kind, Record};
use tracing::warn;

/// Why a field was removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The path is not declared
    Undeclared,
    /// The path is declared but the value's kind is not allowed there
    DisallowedKind(Kind),
}

/// A field removed during validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedField {
    /// Full dotted path of the field
    pub path: String,
    /// Reason for removal
    pub reason: DropReason,
}

/// Result of validating a record
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    /// The pruned copy of the input
    pub record: Record,
    /// Fields removed, in traversal order
    pub dropped: Vec<DroppedField>,
}

/// Core trait for validation stages
pub trait Validator: Send + Sync {
    /// Return a copy of `record` containing only permitted fields
    fn validate(&self, record: &Record) -> Record;
}

/// Validator that keeps every field
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughValidator;

impl Validator for PassthroughValidator {
    fn validate(&self, record: &Record) -> Record {
        record.clone()
    }
}

/// Validator backed by a declared schema mapping
#[derive(Debug, Clone, Default)]
pub struct SchemaValidator {
    declared: SchemaMapping,
}

impl SchemaValidator {
    /// Create a validator for a declared mapping
    pub fn new(declared: SchemaMapping) -> Self {
        Self { declared }
    }

    /// Declared mapping
    pub fn declared(&self) -> &SchemaMapping {
        &self.declared
    }
}

impl Validator for SchemaValidator {
    fn validate(&self, record: &Record) -> Record {
        let validated = validate_record(record, &self.declared);
        for field in &validated.dropped {
            match field.reason {
                DropReason::Undeclared => {
                    warn!(path = %field.path, "removing field that is not defined in the schema");
                }
                DropReason::DisallowedKind(kind) => {
                    warn!(path = %field.path, %kind, "removing field with a disallowed kind");
                }
            }
        }
        validated.record
    }
}

/// Pending field check: the field `key` inside the object reached by `parents`
struct Pending {
    parents: Vec<String>,
    key: String,
    path: String,
}

/// Validate `record` against `declared`, reporting every dropped field
///
/// Works top-down over an explicit stack. A dropped object is not descended
/// into; a kept object keeps its structure even if all its children are later
/// dropped. Arrays are kept or dropped whole.
pub fn validate_record(record: &Record, declared: &SchemaMapping) -> Validated {
    let mut working = record.clone();
    let mut dropped = Vec::new();

    let mut stack: Vec<Pending> = working
        .keys()
        .map(|key| Pending {
            parents: Vec::new(),
            key: key.clone(),
            path: key.clone(),
        })
        .collect();

    while let Some(pending) = stack.pop() {
        let Some(container) = container_mut(&mut working, &pending.parents) else {
            continue;
        };
        let Some(value) = container.get(&pending.key) else {
            continue;
        };

        let kind = Kind::of(value);
        if !declared.contains_path(&pending.path) {
            container.remove(&pending.key);
            dropped.push(DroppedField {
                path: pending.path,
                reason: DropReason::Undeclared,
            });
            continue;
        }
        if !declared.allows(&pending.path, kind) {
            container.remove(&pending.key);
            dropped.push(DroppedField {
                path: pending.path,
                reason: DropReason::DisallowedKind(kind),
            });
            continue;
        }

        if let JsonValue::Object(children) = value {
            let mut parents = pending.parents.clone();
            parents.push(pending.key.clone());
            for child in children.keys() {
                stack.push(Pending {
                    parents: parents.clone(),
                    key: child.clone(),
                    path: join_path(&pending.path, child),
                });
            }
        }
    }

    Validated {
        record: working,
        dropped,
    }
}

/// Walk from the root through nested objects named by `parents`
fn container_mut<'a>(root: &'a mut Record, parents: &[String]) -> Option<&'a mut Record> {
    let mut current = root;
    for segment in parents {
        current = match current.get_mut(segment) {
            Some(JsonValue::Object(map)) => map,
            _ => return None,
        };
    }
    Some(current)
}
