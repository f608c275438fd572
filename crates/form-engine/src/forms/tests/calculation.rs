use serde_json::json;

use super::common::answers;
use crate::forms::{CalculationEngine, CalculationFormula, FormulaError};

fn formula(source: &str) -> CalculationFormula {
    CalculationFormula::parse(source).expect("formula parses")
}

#[test]
fn rejects_empty_and_malformed_sources() {
    assert_eq!(CalculationFormula::parse("   "), Err(FormulaError::Empty));
    assert_eq!(
        CalculationFormula::parse("a + $b"),
        Err(FormulaError::UnexpectedCharacter('$'))
    );
    assert_eq!(
        CalculationFormula::parse("(a + b"),
        Err(FormulaError::UnexpectedEnd)
    );
    assert!(matches!(
        CalculationFormula::parse("a + b)"),
        Err(FormulaError::UnexpectedToken(_))
    ));
    assert!(matches!(
        CalculationFormula::parse("a b"),
        Err(FormulaError::UnexpectedToken(_))
    ));

    let long = "a+".repeat(300) + "a";
    assert_eq!(CalculationFormula::parse(&long), Err(FormulaError::TooLong));
}

#[test]
fn source_is_trimmed() {
    assert_eq!(formula("  a + b  ").source(), "a + b");
}

#[test]
fn referenced_fields_dedup_in_first_appearance_order() {
    let formula = formula("width * height + width");
    assert_eq!(formula.referenced_fields(), vec!["width", "height"]);
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    let engine = CalculationEngine;
    let sum = formula("a + b * c");
    let answers = answers(&[("a", json!(2)), ("b", json!(3)), ("c", json!(4))]);
    assert_eq!(engine.evaluate(&sum, &answers), Some(14.0));

    let grouped = formula("(a + b) * c");
    assert_eq!(engine.evaluate(&grouped, &answers), Some(20.0));
}

#[test]
fn unary_minus() {
    let engine = CalculationEngine;
    let negated = formula("-a + 10");
    assert_eq!(
        engine.evaluate(&negated, &answers(&[("a", json!(4))])),
        Some(6.0)
    );
}

#[test]
fn missing_reference_yields_none() {
    let engine = CalculationEngine;
    let sum = formula("a + b");
    assert_eq!(engine.evaluate(&sum, &answers(&[("a", json!(2))])), None);
}

#[test]
fn non_numeric_reference_yields_none() {
    let engine = CalculationEngine;
    let sum = formula("a + b");
    let answers = answers(&[("a", json!(2)), ("b", json!("three"))]);
    assert_eq!(engine.evaluate(&sum, &answers), None);
}

#[test]
fn division_by_zero_yields_none() {
    let engine = CalculationEngine;
    let ratio = formula("a / b");
    let answers = answers(&[("a", json!(1)), ("b", json!(0))]);
    assert_eq!(engine.evaluate(&ratio, &answers), None);
}

#[test]
fn serializes_as_its_source_string() {
    let formula = formula("base * rate");
    assert_eq!(serde_json::to_value(&formula).expect("serializes"), json!("base * rate"));

    let parsed: CalculationFormula =
        serde_json::from_value(json!("base * rate")).expect("deserializes");
    assert_eq!(parsed, formula);
}

#[test]
fn malformed_source_fails_deserialization() {
    let result: Result<CalculationFormula, _> = serde_json::from_value(json!("a +"));
    assert!(result.is_err());
}
