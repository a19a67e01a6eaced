//! Common types used throughout ledger-etl
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// A single record: a JSON object keyed by field name
pub type Record = serde_json::Map<String, JsonValue>;

// ============================================================================
// Value Kind
// ============================================================================

/// The tag of a record value's variant
///
/// Kind sets in a schema mapping are sets over this enum. Ordering follows the
/// declaration order so that formatted kind sets are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Null,
    #[serde(alias = "bool")]
    Boolean,
    #[serde(alias = "int")]
    Integer,
    #[serde(alias = "number")]
    Float,
    #[serde(alias = "str")]
    String,
    #[serde(alias = "dict", alias = "record")]
    Object,
    #[serde(alias = "list")]
    Array,
}

impl Kind {
    /// Kind of a JSON value
    pub fn of(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Kind::Null,
            JsonValue::Bool(_) => Kind::Boolean,
            JsonValue::Number(n) => {
                if n.is_i64() || n.is_u64() {
                    Kind::Integer
                } else {
                    Kind::Float
                }
            }
            JsonValue::String(_) => Kind::String,
            JsonValue::Array(_) => Kind::Array,
            JsonValue::Object(_) => Kind::Object,
        }
    }

    /// Warehouse column type name for this kind
    ///
    /// Only used for diagnostics; arrays map to a repeated record.
    pub fn warehouse_type(self) -> &'static str {
        match self {
            Kind::Null => "NULL",
            Kind::Boolean => "BOOLEAN",
            Kind::Integer => "INTEGER",
            Kind::Float => "FLOAT",
            Kind::String => "STRING",
            Kind::Object | Kind::Array => "RECORD",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Null => "null",
            Kind::Boolean => "boolean",
            Kind::Integer => "integer",
            Kind::Float => "float",
            Kind::String => "string",
            Kind::Object => "object",
            Kind::Array => "array",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Page Key
// ============================================================================

/// The logical partition a page belongs to (a ledger sequence number)
///
/// `Current` is only valid on the first request of a run; it is resolved to a
/// concrete index before any page is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "JsonValue", into = "JsonValue")]
pub enum PageKey {
    #[default]
    Current,
    Index(u64),
}

impl PageKey {
    /// Concrete index, if resolved
    pub fn index(self) -> Option<u64> {
        match self {
            PageKey::Current => None,
            PageKey::Index(i) => Some(i),
        }
    }

    /// Check if this key still needs resolving
    pub fn is_current(self) -> bool {
        matches!(self, PageKey::Current)
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageKey::Current => f.write_str("current"),
            PageKey::Index(i) => write!(f, "{i}"),
        }
    }
}

impl FromStr for PageKey {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("current") {
            return Ok(PageKey::Current);
        }
        s.parse::<u64>().map(PageKey::Index).map_err(|_| {
            crate::error::Error::invalid_value(
                "page_key",
                format!("expected 'current' or a ledger index, got '{s}'"),
            )
        })
    }
}

impl TryFrom<JsonValue> for PageKey {
    type Error = crate::error::Error;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        match value {
            JsonValue::Number(n) => n.as_u64().map(PageKey::Index).ok_or_else(|| {
                crate::error::Error::invalid_value("page_key", format!("negative index {n}"))
            }),
            JsonValue::String(s) => s.parse(),
            other => Err(crate::error::Error::invalid_value(
                "page_key",
                format!("unexpected {} value", Kind::of(&other)),
            )),
        }
    }
}

impl From<PageKey> for JsonValue {
    fn from(key: PageKey) -> Self {
        match key {
            PageKey::Current => JsonValue::String("current".into()),
            PageKey::Index(i) => JsonValue::from(i),
        }
    }
}

impl From<u64> for PageKey {
    fn from(index: u64) -> Self {
        PageKey::Index(index)
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Execution environment label, used only to prefix forwarding tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Test,
    Prod,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Environment::Local => "local",
            Environment::Test => "test",
            Environment::Prod => "prod",
        })
    }
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.is_empty())
    }
}

impl OptionStringExt for String {
    fn none_if_empty(self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

/// Follow a dotted path through nested objects
///
/// Accepts an optional `$.` prefix. Returns `None` when any segment is
/// missing or traverses a non-object.
pub fn value_at_path<'a>(value: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    if path.is_empty() || path == "$" {
        return Some(value);
    }

    let mut current = value;
    for part in path.split('.') {
        match current {
            JsonValue::Object(map) => {
                current = map.get(part)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(json!(null), Kind::Null ; "null")]
    #[test_case(json!(true), Kind::Boolean ; "boolean")]
    #[test_case(json!(42), Kind::Integer ; "integer")]
    #[test_case(json!(-7), Kind::Integer ; "negative integer")]
    #[test_case(json!(705695142.5), Kind::Float ; "float")]
    #[test_case(json!("rHb9CJ"), Kind::String ; "string")]
    #[test_case(json!({"a": 1}), Kind::Object ; "object")]
    #[test_case(json!([1, 2]), Kind::Array ; "array")]
    fn test_kind_of(value: JsonValue, expected: Kind) {
        assert_eq!(Kind::of(&value), expected);
    }

    #[test]
    fn test_kind_serde_aliases() {
        let kinds: Vec<Kind> =
            serde_json::from_str(r#"["bool", "int", "number", "str", "dict", "list", "null"]"#)
                .unwrap();
        assert_eq!(
            kinds,
            vec![
                Kind::Boolean,
                Kind::Integer,
                Kind::Float,
                Kind::String,
                Kind::Object,
                Kind::Array,
                Kind::Null
            ]
        );
        assert_eq!(serde_json::to_string(&Kind::Object).unwrap(), "\"object\"");
    }

    #[test]
    fn test_kind_warehouse_type() {
        assert_eq!(Kind::Integer.warehouse_type(), "INTEGER");
        assert_eq!(Kind::Object.warehouse_type(), "RECORD");
        assert_eq!(Kind::Array.warehouse_type(), "RECORD");
    }

    #[test]
    fn test_page_key_parse() {
        assert_eq!("current".parse::<PageKey>().unwrap(), PageKey::Current);
        assert_eq!("CURRENT".parse::<PageKey>().unwrap(), PageKey::Current);
        assert_eq!(
            "72631379".parse::<PageKey>().unwrap(),
            PageKey::Index(72_631_379)
        );
        assert!("-1".parse::<PageKey>().is_err());
        assert!("latest".parse::<PageKey>().is_err());
    }

    #[test]
    fn test_page_key_serde() {
        let key: PageKey = serde_json::from_value(json!(71698271)).unwrap();
        assert_eq!(key, PageKey::Index(71_698_271));
        let key: PageKey = serde_json::from_value(json!("current")).unwrap();
        assert_eq!(key, PageKey::Current);
        let key: PageKey = serde_json::from_value(json!("42")).unwrap();
        assert_eq!(key, PageKey::Index(42));
        assert!(serde_json::from_value::<PageKey>(json!(true)).is_err());

        assert_eq!(serde_json::to_value(PageKey::Index(5)).unwrap(), json!(5));
        assert_eq!(
            serde_json::to_value(PageKey::Current).unwrap(),
            json!("current")
        );
    }

    #[test]
    fn test_value_at_path() {
        let value = json!({"result": {"ledger": {"ledger_index": 7}}});
        assert_eq!(
            value_at_path(&value, "result.ledger.ledger_index"),
            Some(&json!(7))
        );
        assert_eq!(
            value_at_path(&value, "$.result.ledger.ledger_index"),
            Some(&json!(7))
        );
        assert_eq!(value_at_path(&value, "result.missing"), None);
        assert_eq!(value_at_path(&value, "$"), Some(&value));
    }

    #[test]
    fn test_option_string_none_if_empty() {
        assert_eq!(
            Some("test".to_string()).none_if_empty(),
            Some("test".to_string())
        );
        assert_eq!(Some(String::new()).none_if_empty(), None);
        assert_eq!(None::<String>.none_if_empty(), None);
        assert_eq!(String::new().none_if_empty(), None);
    }
}
