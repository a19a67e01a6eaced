//! Validation module
//!
//! Prunes record fields that a declared schema does not permit. Pruning is
//! path-sensitive: `TakerGets.value` and a top-level `value` are checked
//! against their own entries.

mod validator;

pub use validator::{
    validate_record, DropReason, DroppedField, PassthroughValidator, SchemaValidator, Validated,
    Validator,
};

#[cfg(test)]
mod tests;
