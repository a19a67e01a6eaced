//! Schema mapping types

use crate::error::{Error, Result};
use crate::types::Kind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write as _};
use std::path::Path;

/// Join a field name onto a dotted prefix
pub fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Mapping from flattened field path to a set of value kinds
///
/// Serves both as a declared validation policy and as the observed shape built
/// by the collector. Kind sets only ever grow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaMapping {
    paths: BTreeMap<String, BTreeSet<Kind>>,
}

/// How kinds are named when a mapping is formatted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KindNaming {
    /// Lowercase kind names (`string`, `object`, ...)
    #[default]
    Plain,
    /// Warehouse column type names (`STRING`, `RECORD`, ...)
    Warehouse,
}

impl SchemaMapping {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare allowed kinds for a path (builder style)
    #[must_use]
    pub fn with(mut self, path: impl Into<String>, kinds: impl IntoIterator<Item = Kind>) -> Self {
        let entry = self.paths.entry(path.into()).or_default();
        entry.extend(kinds);
        self
    }

    /// Add a kind to a path
    ///
    /// Returns `true` when the mapping changed (new path or new kind).
    pub fn insert(&mut self, path: impl Into<String>, kind: Kind) -> bool {
        self.paths.entry(path.into()).or_default().insert(kind)
    }

    /// Allowed or observed kinds for a path
    pub fn kinds(&self, path: &str) -> Option<&BTreeSet<Kind>> {
        self.paths.get(path)
    }

    /// Check whether a path is present
    pub fn contains_path(&self, path: &str) -> bool {
        self.paths.get(path).is_some_and(|kinds| !kinds.is_empty())
    }

    /// Check whether a kind is permitted at a path
    pub fn allows(&self, path: &str, kind: Kind) -> bool {
        self.paths.get(path).is_some_and(|kinds| kinds.contains(&kind))
    }

    /// Number of paths
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Check if the mapping is empty
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Paths in lexicographic order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths.keys().map(String::as_str)
    }

    /// Iterate over `(path, kinds)` in lexicographic order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<Kind>)> {
        self.paths.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Union another mapping into this one
    ///
    /// Returns the number of `(path, kind)` pairs that were new.
    pub fn merge(&mut self, other: &SchemaMapping) -> usize {
        let mut added = 0;
        for (path, kinds) in &other.paths {
            let entry = self.paths.entry(path.clone()).or_default();
            for kind in kinds {
                if entry.insert(*kind) {
                    added += 1;
                }
            }
        }
        added
    }

    /// Parse a mapping from YAML (`path: [kind, ...]`)
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mapping: Option<Self> = serde_yaml::from_str(yaml)?;
        Ok(mapping.unwrap_or_default())
    }

    /// Parse a mapping from JSON (`{"path": ["kind", ...]}`)
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a mapping from a `.json`, `.yaml` or `.yml` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            _ => Self::from_yaml_str(&contents),
        }
    }

    /// Format one line per path: `path<delimiter>{kind, kind}`
    pub fn format_with(&self, delimiter: &str, naming: KindNaming) -> String {
        let mut out = String::new();
        for (path, kinds) in &self.paths {
            let names: BTreeSet<String> = kinds
                .iter()
                .map(|k| match naming {
                    KindNaming::Plain => k.to_string(),
                    KindNaming::Warehouse => k.warehouse_type().to_string(),
                })
                .collect();
            let names: Vec<String> = names.into_iter().collect();
            let _ = writeln!(out, "{path}{delimiter}{{{}}}", names.join(", "));
        }
        out
    }
}

impl fmt::Display for SchemaMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_with("\t", KindNaming::Plain))
    }
}

impl<P: Into<String>> FromIterator<(P, Kind)> for SchemaMapping {
    fn from_iter<I: IntoIterator<Item = (P, Kind)>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for (path, kind) in iter {
            mapping.insert(path, kind);
        }
        mapping
    }
}
