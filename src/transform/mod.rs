//! Transform module
//!
//! Reshapes validated records before they reach a sink. The shipped
//! transformer folds amount-like fields, which arrive either as a scalar of the
//! native unit or as a structured `{currency, issuer, value}` object, into the
//! structured shape.

mod transformer;
mod types;

pub use transformer::{build_transformer, AmountTransformer, PassthroughTransformer, Transformer};
pub use types::{AmountRule, TransformConfig, TransformPreset, DEFAULT_UNIT, DEFAULT_UNIT_KEY};
