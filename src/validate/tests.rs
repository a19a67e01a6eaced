//! Validator tests

use super::*;
use crate::schema::{load_builtin_schema, SchemaMapping};
use crate::types::{Kind, Record};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

/// Every field path reachable through nested objects
///
/// Arrays are kept or dropped whole by the validator, so their elements are
/// not walked here either.
fn field_paths(record: &Record) -> Vec<String> {
    let mut paths = Vec::new();
    let mut stack: Vec<(String, &Record)> = vec![(String::new(), record)];
    while let Some((prefix, fields)) = stack.pop() {
        for (key, value) in fields {
            let path = crate::schema::join_path(&prefix, key);
            if let Value::Object(nested) = value {
                stack.push((path.clone(), nested));
            }
            paths.push(path);
        }
    }
    paths
}

#[test]
fn test_validate_ledger_object() {
    let input = record(json!({
        "TakerGets": {
            "currency": "value as dict",
            "issuer": "value as dict",
            "value": "value as dict",
            "notInSchema": "value not in schema",
        },
        "NotInTheSchema": "Hello Not Here",
        "SignerEntries": ["signer_01", "signer_02"],
    }));
    let original = input.clone();

    let validator = SchemaValidator::new(load_builtin_schema("ledger_object").unwrap());
    let validated = validator.validate(&input);

    // input is untouched
    assert_eq!(input, original);
    assert!(input["TakerGets"].get("notInSchema").is_some());

    assert_eq!(validated.len(), 2);
    assert!(validated.get("NotInTheSchema").is_none());
    assert!(validated["TakerGets"].get("notInSchema").is_none());
    for key in ["currency", "issuer", "value"] {
        assert_eq!(validated["TakerGets"][key], input["TakerGets"][key]);
    }
    assert_eq!(validated["SignerEntries"], json!(["signer_01", "signer_02"]));
}

#[test]
fn test_validate_reports_reasons() {
    let declared = SchemaMapping::new()
        .with("a", [Kind::String])
        .with("b", [Kind::Object]);
    let input = record(json!({"a": 1, "b": {"c": true}, "d": null}));

    let validated = validate_record(&input, &declared);

    assert_eq!(validated.record, record(json!({"b": {}})));
    let mut dropped = validated.dropped;
    dropped.sort_by(|x, y| x.path.cmp(&y.path));
    assert_eq!(
        dropped,
        vec![
            DroppedField {
                path: "a".into(),
                reason: DropReason::DisallowedKind(Kind::Integer),
            },
            DroppedField {
                path: "b.c".into(),
                reason: DropReason::Undeclared,
            },
            DroppedField {
                path: "d".into(),
                reason: DropReason::Undeclared,
            },
        ]
    );
}

#[test]
fn test_validate_does_not_descend_into_dropped() {
    let declared = SchemaMapping::new().with("keep", [Kind::String]);
    let input = record(json!({"keep": "x", "gone": {"deep": {"deeper": 1}}}));

    let validated = validate_record(&input, &declared);

    assert_eq!(validated.record, record(json!({"keep": "x"})));
    assert_eq!(validated.dropped.len(), 1);
    assert_eq!(validated.dropped[0].path, "gone");
}

#[test]
fn test_validate_is_path_sensitive() {
    let declared = SchemaMapping::new()
        .with("value", [Kind::Integer])
        .with("TakerGets", [Kind::Object])
        .with("TakerGets.value", [Kind::String]);

    let input = record(json!({"value": "5", "TakerGets": {"value": "5"}}));
    let validated = validator_output(&declared, &input);
    assert_eq!(validated, record(json!({"TakerGets": {"value": "5"}})));

    let input = record(json!({"value": 5, "TakerGets": {"value": 5}}));
    let validated = validator_output(&declared, &input);
    assert_eq!(validated, record(json!({"value": 5, "TakerGets": {}})));
}

fn validator_output(declared: &SchemaMapping, input: &Record) -> Record {
    SchemaValidator::new(declared.clone()).validate(input)
}

#[test]
fn test_validated_paths_subset_of_declared() {
    let declared = load_builtin_schema("ledger_transaction").unwrap();
    let samples = [
        json!({
            "Account": "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh",
            "Amount": {"currency": "USD", "issuer": "r1", "value": "5", "extra": 1},
            "Fee": 12,
            "metaData": {
                "TransactionResult": "tesSUCCESS",
                "AffectedNodes": [{"ModifiedNode": {}}],
                "Unknown": {"x": 1}
            },
            "Surprise": [1, 2, 3]
        }),
        json!({"metaData": "not an object", "hash": "ABC"}),
        json!({}),
    ];

    for sample in samples {
        let validated = validate_record(&record(sample), &declared);
        for path in field_paths(&validated.record) {
            assert!(
                declared.contains_path(&path),
                "undeclared path survived: {path}"
            );
        }
    }
}

#[test]
fn test_kept_arrays_are_not_pruned() {
    let declared = SchemaMapping::new()
        .with("metaData", [Kind::Object])
        .with("metaData.AffectedNodes", [Kind::Array]);
    let input = record(json!({
        "metaData": {
            "AffectedNodes": [{"ModifiedNode": {"LedgerEntryType": "Offer", "Garbage": 1}}],
            "Unknown": {"x": 1}
        }
    }));

    let validated = validate_record(&input, &declared);

    // undeclared fields inside array elements survive
    assert_eq!(
        validated.record["metaData"]["AffectedNodes"],
        input["metaData"]["AffectedNodes"]
    );
    let node = &validated.record["metaData"]["AffectedNodes"][0]["ModifiedNode"];
    assert_eq!(node["Garbage"], json!(1));
    assert_eq!(
        validated.dropped,
        vec![DroppedField {
            path: "metaData.Unknown".into(),
            reason: DropReason::Undeclared,
        }]
    );
}

#[test]
fn test_passthrough_validator() {
    let input = record(json!({"anything": {"goes": [1, 2]}}));
    assert_eq!(PassthroughValidator.validate(&input), input);
}

#[test]
fn test_validate_empty_schema_drops_everything() {
    let input = record(json!({"a": 1, "b": "two"}));
    let validated = validate_record(&input, &SchemaMapping::new());
    assert!(validated.record.is_empty());
    assert_eq!(validated.dropped.len(), 2);
}
