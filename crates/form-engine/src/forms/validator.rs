use serde::{Deserialize, Serialize};

use super::logic::LogicEvaluator;
use super::template::FormTemplate;
use super::AnswerSet;

/// One field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field_id: String,
    pub message: String,
}

impl FieldError {
    fn new(field_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            message: message.into(),
        }
    }
}

/// Visibility-aware, exhaustive submission validator.
///
/// Validation runs in two passes because a field can be required yet
/// unanswered independently of being answered but wrong; both kinds of
/// failure are collected rather than stopping at the first.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormValidator {
    logic: LogicEvaluator,
}

impl FormValidator {
    pub fn validate(&self, answers: &AnswerSet, template: &FormTemplate) -> Vec<FieldError> {
        let mut errors = Vec::new();

        // Pass 1: required fields without an answer. Hidden fields are
        // exempt, and calculated fields are never user-supplied.
        for field in template.required_fields() {
            if field.is_calculated() {
                continue;
            }
            if !self.field_visible(template, field.id(), answers) {
                continue;
            }

            let answered = answers
                .get(field.id())
                .map(|value| !value.is_empty())
                .unwrap_or(false);
            if !answered {
                errors.push(FieldError::new(
                    field.id(),
                    format!("\"{}\" is required", field.label()),
                ));
            }
        }

        // Pass 2: answered fields that are unknown, hidden, or invalid.
        for (field_id, value) in answers {
            let field = match template.field(field_id) {
                Some(field) => field,
                None => {
                    errors.push(FieldError::new(
                        field_id.clone(),
                        "field does not exist on this template",
                    ));
                    continue;
                }
            };

            // Answers to hidden fields are ignored outright, and calculated
            // answers are recomputed on submit rather than validated here.
            if !self.field_visible(template, field_id, answers) {
                continue;
            }
            if field.is_calculated() {
                continue;
            }

            if let Err(message) = field.validate_value(value) {
                errors.push(FieldError::new(field_id.clone(), message));
            }
        }

        errors
    }

    fn field_visible(&self, template: &FormTemplate, field_id: &str, answers: &AnswerSet) -> bool {
        template
            .field(field_id)
            .and_then(|field| field.visibility())
            .map(|rule| self.logic.is_visible(rule, answers))
            .unwrap_or(true)
    }
}
