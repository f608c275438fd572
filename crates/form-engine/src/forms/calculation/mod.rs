//! Formula parsing and evaluation for calculated fields.
//!
//! The expression language is deliberately tiny: numeric literals, field-id
//! identifiers, the four arithmetic operators, unary minus, and parentheses.
//! Evaluation never fails loudly — any missing or non-numeric reference, and
//! any non-finite result, yields `None` so callers can decide whether the
//! calculated field is populatable yet.

mod parser;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use self::parser::{BinaryOp, Expr};
use super::AnswerSet;

/// Hard cap on formula source length; anything longer is a configuration
/// mistake, not a form.
const MAX_FORMULA_LENGTH: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormulaError {
    #[error("formula is empty")]
    Empty,
    #[error("formula exceeds {MAX_FORMULA_LENGTH} characters")]
    TooLong,
    #[error("unexpected character '{0}' in formula")]
    UnexpectedCharacter(char),
    #[error("invalid numeric literal '{0}'")]
    InvalidNumber(String),
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("formula ended unexpectedly")]
    UnexpectedEnd,
}

/// A validated arithmetic formula referencing other field ids.
///
/// Parsed once at construction; serializes as its source string.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationFormula {
    source: String,
    expr: Expr,
}

impl CalculationFormula {
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(FormulaError::Empty);
        }
        if trimmed.len() > MAX_FORMULA_LENGTH {
            return Err(FormulaError::TooLong);
        }

        let expr = parser::parse(trimmed)?;
        Ok(Self {
            source: trimmed.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Field ids the formula reads, in first-appearance order.
    pub fn referenced_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        parser::referenced_fields(&self.expr, &mut fields);
        fields
    }
}

impl Serialize for CalculationFormula {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for CalculationFormula {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let source = String::deserialize(deserializer)?;
        Self::parse(&source).map_err(D::Error::custom)
    }
}

/// Stateless, side-effect-free formula evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalculationEngine;

impl CalculationEngine {
    /// Evaluates `formula` against the current answers.
    ///
    /// Returns `None` when any referenced field is absent, empty, or
    /// non-numeric, or when the arithmetic result is not a finite number.
    pub fn evaluate(&self, formula: &CalculationFormula, answers: &AnswerSet) -> Option<f64> {
        let result = evaluate_expr(&formula.expr, answers)?;
        result.is_finite().then_some(result)
    }
}

fn evaluate_expr(expr: &Expr, answers: &AnswerSet) -> Option<f64> {
    match expr {
        Expr::Number(value) => Some(*value),
        Expr::Field(id) => answers.get(id).and_then(|value| value.as_f64()),
        Expr::Negate(inner) => evaluate_expr(inner, answers).map(|value| -value),
        Expr::Binary { op, left, right } => {
            let left = evaluate_expr(left, answers)?;
            let right = evaluate_expr(right, answers)?;
            let result = match op {
                BinaryOp::Add => left + right,
                BinaryOp::Subtract => left - right,
                BinaryOp::Multiply => left * right,
                BinaryOp::Divide => left / right,
            };
            result.is_finite().then_some(result)
        }
    }
}
