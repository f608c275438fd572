use serde::{Deserialize, Serialize};

use super::value::FieldValue;
use super::AnswerSet;

/// Comparison applied between the target field's current answer and the
/// rule's expected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    In,
}

/// Whether a satisfied condition shows or hides the owning field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisibilityAction {
    Show,
    Hide,
}

/// Conditional visibility rule attached to a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalRule {
    pub target_field_id: String,
    pub operator: ConditionOperator,
    pub expected: FieldValue,
    pub action: VisibilityAction,
}

/// Stateless visibility evaluator.
///
/// Safe to call repeatedly against partial answer sets: an unanswered or
/// empty target resolves the condition to not-satisfied for every operator,
/// so a SHOW rule keeps its field hidden until the target is answered.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogicEvaluator;

impl LogicEvaluator {
    pub fn is_visible(&self, rule: &ConditionalRule, answers: &AnswerSet) -> bool {
        let satisfied = self.is_satisfied(rule, answers);
        match rule.action {
            VisibilityAction::Show => satisfied,
            VisibilityAction::Hide => !satisfied,
        }
    }

    pub fn is_satisfied(&self, rule: &ConditionalRule, answers: &AnswerSet) -> bool {
        let target = match answers.get(&rule.target_field_id) {
            Some(value) if !value.is_empty() => value,
            _ => return false,
        };

        match rule.operator {
            ConditionOperator::Equals => target == &rule.expected,
            ConditionOperator::NotEquals => target != &rule.expected,
            ConditionOperator::GreaterThan => match (target.as_f64(), rule.expected.as_f64()) {
                (Some(actual), Some(expected)) => actual > expected,
                _ => false,
            },
            ConditionOperator::LessThan => match (target.as_f64(), rule.expected.as_f64()) {
                (Some(actual), Some(expected)) => actual < expected,
                _ => false,
            },
            ConditionOperator::Contains => match target.value() {
                serde_json::Value::String(text) => rule
                    .expected
                    .as_str()
                    .map(|needle| text.contains(needle))
                    .unwrap_or(false),
                serde_json::Value::Array(items) => items.contains(rule.expected.value()),
                _ => false,
            },
            ConditionOperator::In => match rule.expected.value() {
                serde_json::Value::Array(allowed) => allowed.contains(target.value()),
                _ => false,
            },
        }
    }
}
