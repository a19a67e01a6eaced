//! Transform types
//!
//! Amount normalization rules and the presets shipped for ledger objects and
//! transactions.

use serde::{Deserialize, Serialize};

/// Default key naming the unit of a structured amount
pub const DEFAULT_UNIT_KEY: &str = "currency";

/// Default unit assigned to scalar amounts
pub const DEFAULT_UNIT: &str = "XRP";

/// A set of amount-like fields inside one container path
///
/// `container` is a dotted path from the record root (empty for the root
/// itself). Sequences met along the way are traversed transparently, so
/// `metaData.AffectedNodes.ModifiedNode.FinalFields` reaches the final
/// field group of every affected node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AmountRule {
    /// Dotted container path, empty for top-level fields
    #[serde(default)]
    pub container: String,
    /// Field names normalized inside the container
    pub fields: Vec<String>,
}

impl AmountRule {
    /// Rule for top-level fields
    pub fn top_level<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::nested("", fields)
    }

    /// Rule for fields inside a nested container
    pub fn nested<I, S>(container: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            container: container.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Container path split into segments
    pub fn segments(&self) -> Vec<&str> {
        self.container
            .split('.')
            .filter(|segment| !segment.is_empty())
            .collect()
    }
}

/// Named rule sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformPreset {
    /// Records pass through unchanged
    #[default]
    None,
    /// Ledger state objects
    #[serde(alias = "ledger_objects")]
    LedgerObject,
    /// Ledger transactions with metadata
    #[serde(alias = "ledger_transactions")]
    LedgerTransaction,
}

impl TransformPreset {
    /// Amount rules for this preset
    pub fn rules(self) -> Vec<AmountRule> {
        match self {
            TransformPreset::None => Vec::new(),
            TransformPreset::LedgerObject => vec![AmountRule::top_level([
                "Balance",
                "SendMax",
                "TakerGets",
                "TakerPays",
            ])],
            TransformPreset::LedgerTransaction => {
                const NODE_FIELDS: [&str; 3] = ["Balance", "TakerGets", "TakerPays"];
                vec![
                    AmountRule::top_level(["Amount", "SendMax", "TakerGets", "TakerPays"]),
                    AmountRule::nested("metaData", ["DeliveredAmount", "delivered_amount"]),
                    AmountRule::nested("metaData.AffectedNodes.CreatedNode.NewFields", NODE_FIELDS),
                    AmountRule::nested(
                        "metaData.AffectedNodes.DeletedNode.FinalFields",
                        NODE_FIELDS,
                    ),
                    AmountRule::nested(
                        "metaData.AffectedNodes.ModifiedNode.FinalFields",
                        NODE_FIELDS,
                    ),
                    AmountRule::nested(
                        "metaData.AffectedNodes.ModifiedNode.PreviousFields",
                        NODE_FIELDS,
                    ),
                ]
            }
        }
    }
}

impl std::str::FromStr for TransformPreset {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "passthrough" => Ok(Self::None),
            "ledger_object" | "ledger_objects" => Ok(Self::LedgerObject),
            "ledger_transaction" | "ledger_transactions" => Ok(Self::LedgerTransaction),
            other => Err(crate::error::Error::invalid_value(
                "transform.preset",
                format!("unknown preset '{other}'"),
            )),
        }
    }
}

/// Transform section of a run configuration
///
/// Explicit `rules` are applied after the preset's rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Preset rule set
    pub preset: TransformPreset,
    /// Additional rules
    pub rules: Vec<AmountRule>,
    /// Key naming the unit in the structured shape
    pub unit_key: String,
    /// Unit assigned to scalar amounts
    pub default_unit: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            preset: TransformPreset::None,
            rules: Vec::new(),
            unit_key: DEFAULT_UNIT_KEY.to_string(),
            default_unit: DEFAULT_UNIT.to_string(),
        }
    }
}

impl TransformConfig {
    /// Config for a preset with default naming
    pub fn preset(preset: TransformPreset) -> Self {
        Self {
            preset,
            ..Self::default()
        }
    }

    /// All rules, preset first
    pub fn all_rules(&self) -> Vec<AmountRule> {
        let mut rules = self.preset.rules();
        rules.extend(self.rules.iter().cloned());
        rules
    }
}
