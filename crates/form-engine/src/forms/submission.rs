use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::calculation::CalculationEngine;
use super::events::FormEvent;
use super::template::{FormTemplate, FormTemplateId, TemplateVersion};
use super::validator::{FieldError, FormValidator};
use super::value::FieldValue;
use super::AnswerSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormSubmissionId(Uuid);

impl FormSubmissionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(value).map(Self)
    }
}

impl fmt::Display for FormSubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Submission lifecycle: answers are mutable only while INCOMPLETE, and a
/// submission is reviewed exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Incomplete,
    Submitted,
    Validated,
}

impl SubmissionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Incomplete => "INCOMPLETE",
            SubmissionStatus::Submitted => "SUBMITTED",
            SubmissionStatus::Validated => "VALIDATED",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmissionError {
    #[error("answers cannot change after submission")]
    AnswersLocked,
    #[error("form was already submitted")]
    AlreadySubmitted,
    #[error("only submitted forms can be reviewed")]
    NotSubmitted,
    #[error("template {actual} does not match the pinned template {expected}")]
    TemplateMismatch {
        expected: FormTemplateId,
        actual: FormTemplateId,
    },
    #[error("submission failed validation with {} error(s)", errors.len())]
    ValidationFailed { errors: Vec<FieldError> },
}

/// Creation properties for a submission against a published template.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub template_id: FormTemplateId,
    pub template_version: TemplateVersion,
    pub context_type: String,
    pub context_id: Option<String>,
    pub submitted_by: String,
}

/// Persisted shape of a submission; answers flatten to a plain
/// fieldId→value object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionSnapshot {
    pub id: FormSubmissionId,
    pub template_id: FormTemplateId,
    pub template_version: TemplateVersion,
    pub answers: BTreeMap<String, Value>,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub validation_errors: Vec<FieldError>,
    pub context_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    pub submitted_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_by: Option<String>,
}

/// Aggregate root: one answer set bound to a single template version.
///
/// The template version is pinned at creation; a submission is never
/// silently re-validated against a newer template.
#[derive(Debug, Clone)]
pub struct FormSubmission {
    id: FormSubmissionId,
    template_id: FormTemplateId,
    template_version: TemplateVersion,
    answers: AnswerSet,
    status: SubmissionStatus,
    validation_errors: Vec<FieldError>,
    context_type: String,
    context_id: Option<String>,
    submitted_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    validated_at: Option<DateTime<Utc>>,
    validated_by: Option<String>,
    events: Vec<FormEvent>,
}

impl FormSubmission {
    pub fn create(props: NewSubmission) -> Self {
        let now = Utc::now();
        Self {
            id: FormSubmissionId::generate(),
            template_id: props.template_id,
            template_version: props.template_version,
            answers: AnswerSet::new(),
            status: SubmissionStatus::Incomplete,
            validation_errors: Vec::new(),
            context_type: props.context_type,
            context_id: props.context_id,
            submitted_by: props.submitted_by,
            created_at: now,
            updated_at: now,
            submitted_at: None,
            validated_at: None,
            validated_by: None,
            events: Vec::new(),
        }
    }

    pub fn from_snapshot(snapshot: SubmissionSnapshot) -> Self {
        let answers = snapshot
            .answers
            .into_iter()
            .map(|(field_id, value)| (field_id, FieldValue::new(value)))
            .collect();

        Self {
            id: snapshot.id,
            template_id: snapshot.template_id,
            template_version: snapshot.template_version,
            answers,
            status: snapshot.status,
            validation_errors: snapshot.validation_errors,
            context_type: snapshot.context_type,
            context_id: snapshot.context_id,
            submitted_by: snapshot.submitted_by,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
            submitted_at: snapshot.submitted_at,
            validated_at: snapshot.validated_at,
            validated_by: snapshot.validated_by,
            events: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> SubmissionSnapshot {
        SubmissionSnapshot {
            id: self.id,
            template_id: self.template_id,
            template_version: self.template_version,
            answers: self.answers_object(),
            status: self.status,
            validation_errors: self.validation_errors.clone(),
            context_type: self.context_type.clone(),
            context_id: self.context_id.clone(),
            submitted_by: self.submitted_by.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            submitted_at: self.submitted_at,
            validated_at: self.validated_at,
            validated_by: self.validated_by.clone(),
        }
    }

    /// Records a raw answer, normalizing it on the way in.
    pub fn set_answer(&mut self, field_id: &str, value: Value) -> Result<(), SubmissionError> {
        if self.is_complete() {
            return Err(SubmissionError::AnswersLocked);
        }

        self.answers
            .insert(field_id.to_string(), FieldValue::new(value));
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Submits the answer set against the pinned template version.
    ///
    /// Order matters: defaults are backfilled first, then validation runs
    /// over the full answer set, then calculated fields whose dependencies
    /// are complete are computed. On validation failure the backfilled
    /// defaults are retained and the stored errors replaced, so a corrected
    /// resubmission does not need to re-supply defaults.
    pub fn submit(
        &mut self,
        template: &FormTemplate,
        validator: &FormValidator,
        engine: &CalculationEngine,
    ) -> Result<(), SubmissionError> {
        if self.is_complete() {
            return Err(SubmissionError::AlreadySubmitted);
        }
        if template.id() != self.template_id {
            return Err(SubmissionError::TemplateMismatch {
                expected: self.template_id,
                actual: template.id(),
            });
        }

        self.apply_defaults(template);

        let errors = validator.validate(&self.answers, template);
        if !errors.is_empty() {
            self.validation_errors = errors.clone();
            self.updated_at = Utc::now();
            return Err(SubmissionError::ValidationFailed { errors });
        }
        self.validation_errors.clear();

        self.compute_calculated_fields(template, engine);

        self.status = SubmissionStatus::Submitted;
        let now = Utc::now();
        self.submitted_at = Some(now);
        self.updated_at = now;

        self.events.push(FormEvent::SubmissionReceived {
            submission_id: self.id,
            template_id: self.template_id,
            submitted_by: self.submitted_by.clone(),
            context_type: self.context_type.clone(),
            context_id: self.context_id.clone(),
            occurred_at: now,
        });
        Ok(())
    }

    /// Reviewer sign-off; only legal from SUBMITTED.
    pub fn validate(&mut self, validated_by: &str) -> Result<(), SubmissionError> {
        if self.status != SubmissionStatus::Submitted {
            return Err(SubmissionError::NotSubmitted);
        }

        self.status = SubmissionStatus::Validated;
        let now = Utc::now();
        self.validated_at = Some(now);
        self.validated_by = Some(validated_by.to_string());
        self.updated_at = now;

        self.events.push(FormEvent::SubmissionValidated {
            submission_id: self.id,
            template_id: self.template_id,
            validated_by: validated_by.to_string(),
            occurred_at: now,
        });
        Ok(())
    }

    fn apply_defaults(&mut self, template: &FormTemplate) {
        for field in template.fields() {
            if self.answers.contains_key(field.id()) {
                continue;
            }
            if let Some(default) = field.default_value() {
                if !default.is_empty() {
                    self.answers.insert(field.id().to_string(), default.clone());
                }
            }
        }
    }

    // Calculated fields with incomplete dependencies are left unset; they
    // were excluded from required-field validation, so this is not an error.
    fn compute_calculated_fields(&mut self, template: &FormTemplate, engine: &CalculationEngine) {
        for field in template.calculated_fields() {
            let formula = match field.formula() {
                Some(formula) => formula,
                None => continue,
            };

            let dependencies_complete = formula.referenced_fields().iter().all(|reference| {
                self.answers
                    .get(reference)
                    .map(|value| !value.is_empty())
                    .unwrap_or(false)
            });
            if !dependencies_complete {
                continue;
            }

            if let Some(result) = engine.evaluate(formula, &self.answers) {
                self.answers
                    .insert(field.id().to_string(), FieldValue::from_f64(result));
            }
        }
    }

    pub fn id(&self) -> FormSubmissionId {
        self.id
    }

    pub fn template_id(&self) -> FormTemplateId {
        self.template_id
    }

    pub fn template_version(&self) -> TemplateVersion {
        self.template_version
    }

    pub fn answer(&self, field_id: &str) -> Option<&FieldValue> {
        self.answers.get(field_id)
    }

    pub fn has_answer(&self, field_id: &str) -> bool {
        self.answers.contains_key(field_id)
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    /// Plain fieldId→value projection of the answers.
    pub fn answers_object(&self) -> BTreeMap<String, Value> {
        self.answers
            .iter()
            .map(|(field_id, value)| (field_id.clone(), value.value().clone()))
            .collect()
    }

    pub fn status(&self) -> SubmissionStatus {
        self.status
    }

    pub fn validation_errors(&self) -> &[FieldError] {
        &self.validation_errors
    }

    pub fn has_validation_errors(&self) -> bool {
        !self.validation_errors.is_empty()
    }

    pub fn context_type(&self) -> &str {
        &self.context_type
    }

    pub fn context_id(&self) -> Option<&str> {
        self.context_id.as_deref()
    }

    pub fn submitted_by(&self) -> &str {
        &self.submitted_by
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    pub fn validated_at(&self) -> Option<DateTime<Utc>> {
        self.validated_at
    }

    pub fn validated_by(&self) -> Option<&str> {
        self.validated_by.as_deref()
    }

    pub fn is_incomplete(&self) -> bool {
        self.status == SubmissionStatus::Incomplete
    }

    pub fn is_submitted(&self) -> bool {
        self.status == SubmissionStatus::Submitted
    }

    pub fn is_validated(&self) -> bool {
        self.status == SubmissionStatus::Validated
    }

    pub fn is_complete(&self) -> bool {
        self.is_submitted() || self.is_validated()
    }

    pub fn pending_events(&self) -> &[FormEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<FormEvent> {
        std::mem::take(&mut self.events)
    }
}
