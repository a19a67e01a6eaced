//! Amount normalization transformer

use super::types::{AmountRule, TransformConfig, DEFAULT_UNIT, DEFAULT_UNIT_KEY};
use crate::types::{JsonValue, Record};
use serde_json::Map;

/// Core trait for transform stages
pub trait Transformer: Send + Sync {
    /// Return a reshaped copy of `record`
    fn transform(&self, record: &Record) -> Record;
}

/// Transformer that returns records unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughTransformer;

impl Transformer for PassthroughTransformer {
    fn transform(&self, record: &Record) -> Record {
        record.clone()
    }
}

/// Normalizes amount-like fields to one structured shape
///
/// A field holding anything other than an object, typically a string of drops,
/// becomes `{<unit_key>: <default_unit>, "issuer": "", "value": <scalar>}`.
/// Objects are left alone, as are absent fields.
#[derive(Debug, Clone)]
pub struct AmountTransformer {
    rules: Vec<AmountRule>,
    unit_key: String,
    default_unit: String,
}

impl AmountTransformer {
    /// Create a transformer from explicit rules
    pub fn new(rules: Vec<AmountRule>) -> Self {
        Self {
            rules,
            unit_key: DEFAULT_UNIT_KEY.to_string(),
            default_unit: DEFAULT_UNIT.to_string(),
        }
    }

    /// Create a transformer from the transform config section
    pub fn from_config(config: &TransformConfig) -> Self {
        Self::new(config.all_rules())
            .with_unit_key(&config.unit_key)
            .with_default_unit(&config.default_unit)
    }

    /// Set the key naming the unit
    pub fn with_unit_key(mut self, unit_key: impl Into<String>) -> Self {
        self.unit_key = unit_key.into();
        self
    }

    /// Set the unit assigned to scalar amounts
    pub fn with_default_unit(mut self, unit: impl Into<String>) -> Self {
        self.default_unit = unit.into();
        self
    }

    /// Rules applied by this transformer
    pub fn rules(&self) -> &[AmountRule] {
        &self.rules
    }

    fn structured(&self, value: JsonValue) -> JsonValue {
        let mut amount = Map::new();
        amount.insert(
            self.unit_key.clone(),
            JsonValue::String(self.default_unit.clone()),
        );
        amount.insert("issuer".to_string(), JsonValue::String(String::new()));
        amount.insert("value".to_string(), value);
        JsonValue::Object(amount)
    }

    fn normalize_fields(&self, container: &mut Record, fields: &[String]) {
        for field in fields {
            let Some(slot) = container.get_mut(field) else {
                continue;
            };
            if slot.is_object() {
                continue;
            }
            let scalar = slot.take();
            *slot = self.structured(scalar);
        }
    }

    fn apply_rule(&self, root: &mut Record, rule: &AmountRule) {
        let segments = rule.segments();
        let Some((first, rest)) = segments.split_first() else {
            self.normalize_fields(root, &rule.fields);
            return;
        };
        let Some(start) = root.get_mut(*first) else {
            return;
        };

        // (node, number of segments already consumed)
        let mut stack: Vec<(&mut JsonValue, usize)> = vec![(start, 0)];
        while let Some((node, consumed)) = stack.pop() {
            match node {
                JsonValue::Array(items) => {
                    for item in items.iter_mut() {
                        stack.push((item, consumed));
                    }
                }
                JsonValue::Object(map) => {
                    if consumed == rest.len() {
                        self.normalize_fields(map, &rule.fields);
                    } else if let Some(child) = map.get_mut(rest[consumed]) {
                        stack.push((child, consumed + 1));
                    }
                }
                _ => {}
            }
        }
    }
}

impl Transformer for AmountTransformer {
    fn transform(&self, record: &Record) -> Record {
        let mut working = record.clone();
        for rule in &self.rules {
            self.apply_rule(&mut working, rule);
        }
        working
    }
}

/// Build the transformer described by a config section
pub fn build_transformer(config: &TransformConfig) -> Box<dyn Transformer> {
    let rules = config.all_rules();
    if rules.is_empty() {
        Box::new(PassthroughTransformer)
    } else {
        Box::new(AmountTransformer::from_config(config))
    }
}
