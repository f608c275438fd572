use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::forms::repository::{
    EventPublisher, PublishError, RepositoryError, SubmissionRepository, TemplateRepository,
};
use crate::forms::submission::{FormSubmission, FormSubmissionId, SubmissionSnapshot};
use crate::forms::template::{
    FormTemplate, FormTemplateId, NewTemplate, TemplateSnapshot, TemplateStatus,
};
use crate::forms::{
    AnswerSet, ConditionOperator, ConditionalRule, FieldSpec, FieldType, FieldValue, FormEvent,
    FormField, FormService, VisibilityAction,
};

pub(super) fn text(id: &str, label: &str) -> FormField {
    FormField::create(FieldSpec::new(FieldType::Text, label).with_id(id)).expect("valid text field")
}

pub(super) fn required_text(id: &str, label: &str) -> FormField {
    FormField::create(FieldSpec::new(FieldType::Text, label).with_id(id).required())
        .expect("valid required text field")
}

pub(super) fn number(id: &str, label: &str) -> FormField {
    FormField::create(FieldSpec::new(FieldType::Number, label).with_id(id))
        .expect("valid number field")
}

pub(super) fn required_number_with_default(id: &str, label: &str, default: f64) -> FormField {
    FormField::create(
        FieldSpec::new(FieldType::Number, label)
            .with_id(id)
            .required()
            .with_default(Value::from(default)),
    )
    .expect("valid defaulted number field")
}

pub(super) fn calculated(id: &str, label: &str, formula: &str) -> FormField {
    FormField::create(
        FieldSpec::new(FieldType::Calculated, label)
            .with_id(id)
            .with_formula(formula),
    )
    .expect("valid calculated field")
}

/// Required text field shown only when `target` equals `expected`.
pub(super) fn shown_if_equals(id: &str, label: &str, target: &str, expected: &str) -> FormField {
    FormField::create(
        FieldSpec::new(FieldType::Text, label)
            .with_id(id)
            .required()
            .with_visibility(ConditionalRule {
                target_field_id: target.to_string(),
                operator: ConditionOperator::Equals,
                expected: FieldValue::new(Value::from(expected)),
                action: VisibilityAction::Show,
            }),
    )
    .expect("valid conditional field")
}

pub(super) fn select(id: &str, label: &str, options: &[&str]) -> FormField {
    FormField::create(
        FieldSpec::new(FieldType::Select, label)
            .with_id(id)
            .with_options(options.iter().copied()),
    )
    .expect("valid select field")
}

pub(super) fn new_template() -> NewTemplate {
    NewTemplate {
        name: "Safety Inspection".to_string(),
        description: Some("Pre-work site inspection".to_string()),
        context_type: "orden".to_string(),
        created_by: "ops-lead".to_string(),
    }
}

pub(super) fn draft_with(fields: Vec<FormField>) -> FormTemplate {
    let mut template = FormTemplate::create(new_template()).expect("template creates");
    for field in fields {
        template.add_field(field).expect("field adds");
    }
    template
}

pub(super) fn published_with(fields: Vec<FormField>) -> FormTemplate {
    let mut template = draft_with(fields);
    template.publish().expect("template publishes");
    template
}

pub(super) fn answers(pairs: &[(&str, Value)]) -> AnswerSet {
    pairs
        .iter()
        .map(|(id, value)| (id.to_string(), FieldValue::new(value.clone())))
        .collect()
}

/// Snapshot-backed template store; rebuilding from snapshots strips pending
/// events the way a real persistence round-trip would.
#[derive(Default)]
pub(super) struct MemoryTemplates {
    rows: Mutex<HashMap<FormTemplateId, TemplateSnapshot>>,
}

impl TemplateRepository for MemoryTemplates {
    fn save(&self, template: &FormTemplate) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().expect("template mutex poisoned");
        rows.insert(template.id(), template.snapshot());
        Ok(())
    }

    fn find_by_id(&self, id: &FormTemplateId) -> Result<Option<FormTemplate>, RepositoryError> {
        let rows = self.rows.lock().expect("template mutex poisoned");
        rows.get(id)
            .cloned()
            .map(|snapshot| {
                FormTemplate::from_snapshot(snapshot)
                    .map_err(|error| RepositoryError::Unavailable(error.to_string()))
            })
            .transpose()
    }

    fn find_by_context(&self, context_type: &str) -> Result<Vec<FormTemplate>, RepositoryError> {
        self.select(|snapshot| snapshot.context_type == context_type)
    }

    fn find_latest_version(&self, name: &str) -> Result<Option<FormTemplate>, RepositoryError> {
        Ok(self
            .select(|snapshot| snapshot.name == name && snapshot.is_latest_version)?
            .into_iter()
            .next())
    }

    fn find_all_versions(&self, name: &str) -> Result<Vec<FormTemplate>, RepositoryError> {
        let mut versions = self.select(|snapshot| snapshot.name == name)?;
        versions.sort_by_key(|template| template.version());
        Ok(versions)
    }

    fn exists(&self, name: &str) -> Result<bool, RepositoryError> {
        let rows = self.rows.lock().expect("template mutex poisoned");
        Ok(rows.values().any(|snapshot| snapshot.name == name))
    }

    fn find_all_active(&self) -> Result<Vec<FormTemplate>, RepositoryError> {
        self.select(|snapshot| snapshot.status != TemplateStatus::Archived)
    }

    fn find_published(&self) -> Result<Vec<FormTemplate>, RepositoryError> {
        self.select(|snapshot| snapshot.status == TemplateStatus::Published)
    }

    fn delete(&self, id: &FormTemplateId) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().expect("template mutex poisoned");
        rows.remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

impl MemoryTemplates {
    fn select<F>(&self, keep: F) -> Result<Vec<FormTemplate>, RepositoryError>
    where
        F: Fn(&TemplateSnapshot) -> bool,
    {
        let rows = self.rows.lock().expect("template mutex poisoned");
        rows.values()
            .filter(|snapshot| keep(snapshot))
            .cloned()
            .map(|snapshot| {
                FormTemplate::from_snapshot(snapshot)
                    .map_err(|error| RepositoryError::Unavailable(error.to_string()))
            })
            .collect()
    }
}

#[derive(Default)]
pub(super) struct MemorySubmissions {
    rows: Mutex<HashMap<FormSubmissionId, SubmissionSnapshot>>,
}

impl SubmissionRepository for MemorySubmissions {
    fn save(&self, submission: &FormSubmission) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().expect("submission mutex poisoned");
        rows.insert(submission.id(), submission.snapshot());
        Ok(())
    }

    fn find_by_id(
        &self,
        id: &FormSubmissionId,
    ) -> Result<Option<FormSubmission>, RepositoryError> {
        let rows = self.rows.lock().expect("submission mutex poisoned");
        Ok(rows.get(id).cloned().map(FormSubmission::from_snapshot))
    }

    fn find_by_template(
        &self,
        template_id: &FormTemplateId,
    ) -> Result<Vec<FormSubmission>, RepositoryError> {
        let rows = self.rows.lock().expect("submission mutex poisoned");
        Ok(rows
            .values()
            .filter(|snapshot| snapshot.template_id == *template_id)
            .cloned()
            .map(FormSubmission::from_snapshot)
            .collect())
    }

    fn find_by_context(
        &self,
        context_type: &str,
        context_id: &str,
    ) -> Result<Vec<FormSubmission>, RepositoryError> {
        let rows = self.rows.lock().expect("submission mutex poisoned");
        Ok(rows
            .values()
            .filter(|snapshot| {
                snapshot.context_type == context_type
                    && snapshot.context_id.as_deref() == Some(context_id)
            })
            .cloned()
            .map(FormSubmission::from_snapshot)
            .collect())
    }

    fn count_submissions(&self, template_id: &FormTemplateId) -> Result<u64, RepositoryError> {
        let rows = self.rows.lock().expect("submission mutex poisoned");
        Ok(rows
            .values()
            .filter(|snapshot| snapshot.template_id == *template_id)
            .count() as u64)
    }

    fn find_all(&self) -> Result<Vec<FormSubmission>, RepositoryError> {
        let rows = self.rows.lock().expect("submission mutex poisoned");
        Ok(rows
            .values()
            .cloned()
            .map(FormSubmission::from_snapshot)
            .collect())
    }

    fn delete(&self, id: &FormSubmissionId) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().expect("submission mutex poisoned");
        rows.remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

#[derive(Default)]
pub(super) struct MemoryEvents {
    events: Mutex<Vec<FormEvent>>,
}

impl MemoryEvents {
    pub(super) fn events(&self) -> Vec<FormEvent> {
        self.events.lock().expect("event mutex poisoned").clone()
    }
}

impl EventPublisher for MemoryEvents {
    fn publish(&self, event: &FormEvent) -> Result<(), PublishError> {
        self.events
            .lock()
            .expect("event mutex poisoned")
            .push(event.clone());
        Ok(())
    }
}

pub(super) type TestService = FormService<MemoryTemplates, MemorySubmissions, MemoryEvents>;

/// Opt-in log output while debugging tests (`RUST_LOG=debug cargo test`).
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .with_test_writer()
        .try_init();
}

pub(super) fn build_service() -> (
    TestService,
    Arc<MemoryTemplates>,
    Arc<MemorySubmissions>,
    Arc<MemoryEvents>,
) {
    init_logging();
    let templates = Arc::new(MemoryTemplates::default());
    let submissions = Arc::new(MemorySubmissions::default());
    let events = Arc::new(MemoryEvents::default());
    let service = FormService::new(templates.clone(), submissions.clone(), events.clone());
    (service, templates, submissions, events)
}
