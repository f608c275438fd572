//! Form template and submission lifecycles plus their rule services.
//!
//! Leaf-first: [`FieldValue`] normalizes raw answers, [`FormField`] defines
//! one field, the evaluator/engine/validator trio applies the rules, and the
//! [`FormTemplate`] / [`FormSubmission`] aggregates own the state machines.

pub mod calculation;
pub mod events;
pub mod field;
pub mod logic;
pub mod repository;
pub mod service;
pub mod submission;
pub mod template;
pub mod validator;
pub mod value;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;

/// Current answers of a submission, keyed by field id.
pub type AnswerSet = BTreeMap<String, value::FieldValue>;

pub use calculation::{CalculationEngine, CalculationFormula, FormulaError};
pub use events::FormEvent;
pub use field::{
    FieldConfigError, FieldPatch, FieldPolicy, FieldSpec, FieldType, FormField, ValidationRule,
};
pub use logic::{ConditionOperator, ConditionalRule, LogicEvaluator, VisibilityAction};
pub use repository::{
    EventPublisher, PublishError, RepositoryError, SubmissionRepository, TemplateRepository,
};
pub use service::{FormService, ServiceError, SubmissionContext};
pub use submission::{
    FormSubmission, FormSubmissionId, NewSubmission, SubmissionError, SubmissionSnapshot,
    SubmissionStatus,
};
pub use template::{
    FormTemplate, FormTemplateId, NewTemplate, TemplateError, TemplateSnapshot, TemplateStatus,
    TemplateVersion,
};
pub use validator::{FieldError, FormValidator};
pub use value::FieldValue;
