use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use super::calculation::CalculationEngine;
use super::field::{FieldConfigError, FieldPatch, FieldSpec, FormField};
use super::repository::{
    EventPublisher, PublishError, RepositoryError, SubmissionRepository, TemplateRepository,
};
use super::submission::{FormSubmission, FormSubmissionId, NewSubmission, SubmissionError};
use super::template::{FormTemplate, FormTemplateId, NewTemplate, TemplateError, TemplateStatus};
use super::validator::FormValidator;

/// Error raised by the form use cases.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("template {0} not found")]
    TemplateNotFound(FormTemplateId),
    #[error("submission {0} not found")]
    SubmissionNotFound(FormSubmissionId),
    #[error("a template named \"{0}\" already exists")]
    DuplicateName(String),
    #[error("template {id} is {status}, only published templates accept submissions")]
    TemplateNotAccepting {
        id: FormTemplateId,
        status: TemplateStatus,
    },
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Field(#[from] FieldConfigError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Context a submission is attached to (order, checklist, ...).
#[derive(Debug, Clone)]
pub struct SubmissionContext {
    pub context_id: Option<String>,
    pub submitted_by: String,
}

/// Thin use-case orchestration over the aggregates: load, perform one
/// logical operation, save, then drain and publish pending domain events.
pub struct FormService<T, S, P> {
    templates: Arc<T>,
    submissions: Arc<S>,
    publisher: Arc<P>,
    validator: FormValidator,
    engine: CalculationEngine,
}

impl<T, S, P> FormService<T, S, P>
where
    T: TemplateRepository + 'static,
    S: SubmissionRepository + 'static,
    P: EventPublisher + 'static,
{
    pub fn new(templates: Arc<T>, submissions: Arc<S>, publisher: Arc<P>) -> Self {
        Self {
            templates,
            submissions,
            publisher,
            validator: FormValidator::default(),
            engine: CalculationEngine::default(),
        }
    }

    pub fn create_template(&self, props: NewTemplate) -> Result<FormTemplate, ServiceError> {
        if self.templates.exists(props.name.trim())? {
            return Err(ServiceError::DuplicateName(props.name.trim().to_string()));
        }

        let mut template = FormTemplate::create(props)?;
        self.templates.save(&template)?;
        self.drain_template_events(&mut template)?;

        info!(template_id = %template.id(), name = template.name(), "template created");
        Ok(template)
    }

    pub fn add_field(
        &self,
        template_id: &FormTemplateId,
        spec: FieldSpec,
    ) -> Result<FormTemplate, ServiceError> {
        let mut template = self.load_template(template_id)?;
        let field = FormField::create(spec)?;
        template.add_field(field)?;
        self.templates.save(&template)?;
        Ok(template)
    }

    pub fn update_field(
        &self,
        template_id: &FormTemplateId,
        field_id: &str,
        patch: FieldPatch,
    ) -> Result<FormTemplate, ServiceError> {
        let mut template = self.load_template(template_id)?;
        template.update_field(field_id, patch)?;
        self.templates.save(&template)?;
        Ok(template)
    }

    pub fn remove_field(
        &self,
        template_id: &FormTemplateId,
        field_id: &str,
    ) -> Result<FormTemplate, ServiceError> {
        let mut template = self.load_template(template_id)?;
        template.remove_field(field_id)?;
        self.templates.save(&template)?;
        Ok(template)
    }

    pub fn publish_template(
        &self,
        template_id: &FormTemplateId,
    ) -> Result<FormTemplate, ServiceError> {
        let mut template = self.load_template(template_id)?;
        template.publish()?;
        self.templates.save(&template)?;
        self.drain_template_events(&mut template)?;

        info!(
            template_id = %template.id(),
            version = %template.version(),
            "template published"
        );
        Ok(template)
    }

    pub fn archive_template(
        &self,
        template_id: &FormTemplateId,
    ) -> Result<FormTemplate, ServiceError> {
        let mut template = self.load_template(template_id)?;
        template.archive()?;
        self.templates.save(&template)?;
        self.drain_template_events(&mut template)?;
        Ok(template)
    }

    /// Forks a published template into a fresh DRAFT with the next minor
    /// version; both the old and new rows are persisted.
    pub fn create_new_version(
        &self,
        template_id: &FormTemplateId,
        created_by: &str,
    ) -> Result<FormTemplate, ServiceError> {
        let mut current = self.load_template(template_id)?;
        let mut next = current.create_new_version(created_by)?;

        self.templates.save(&current)?;
        self.templates.save(&next)?;
        self.drain_template_events(&mut next)?;

        info!(
            previous = %current.id(),
            next = %next.id(),
            version = %next.version(),
            "template version forked"
        );
        Ok(next)
    }

    /// Starts an empty submission against a published template, pinning its
    /// version and context type.
    pub fn start_submission(
        &self,
        template_id: &FormTemplateId,
        context: SubmissionContext,
    ) -> Result<FormSubmission, ServiceError> {
        let template = self.load_template(template_id)?;
        if !template.is_published() {
            return Err(ServiceError::TemplateNotAccepting {
                id: template.id(),
                status: template.status(),
            });
        }

        let submission = FormSubmission::create(NewSubmission {
            template_id: template.id(),
            template_version: template.version(),
            context_type: template.context_type().to_string(),
            context_id: context.context_id,
            submitted_by: context.submitted_by,
        });
        self.submissions.save(&submission)?;
        Ok(submission)
    }

    pub fn record_answer(
        &self,
        submission_id: &FormSubmissionId,
        field_id: &str,
        value: Value,
    ) -> Result<FormSubmission, ServiceError> {
        let mut submission = self.load_submission(submission_id)?;
        submission.set_answer(field_id, value)?;
        self.submissions.save(&submission)?;
        Ok(submission)
    }

    /// Runs the full submit pipeline. A validation failure is persisted (the
    /// stored errors and backfilled defaults survive for the retry) before
    /// the error propagates.
    pub fn submit_submission(
        &self,
        submission_id: &FormSubmissionId,
    ) -> Result<FormSubmission, ServiceError> {
        let mut submission = self.load_submission(submission_id)?;
        let template_id = submission.template_id();
        let template = self.load_template(&template_id)?;

        match submission.submit(&template, &self.validator, &self.engine) {
            Ok(()) => {
                self.submissions.save(&submission)?;
                self.drain_submission_events(&mut submission)?;
                info!(submission_id = %submission.id(), "submission received");
                Ok(submission)
            }
            Err(error) => {
                if let SubmissionError::ValidationFailed { errors } = &error {
                    debug!(
                        submission_id = %submission.id(),
                        error_count = errors.len(),
                        "submission failed validation"
                    );
                    self.submissions.save(&submission)?;
                }
                Err(error.into())
            }
        }
    }

    /// Reviewer sign-off on a submitted form.
    pub fn review_submission(
        &self,
        submission_id: &FormSubmissionId,
        reviewer: &str,
    ) -> Result<FormSubmission, ServiceError> {
        let mut submission = self.load_submission(submission_id)?;
        submission.validate(reviewer)?;
        self.submissions.save(&submission)?;
        self.drain_submission_events(&mut submission)?;
        Ok(submission)
    }

    pub fn template(&self, template_id: &FormTemplateId) -> Result<FormTemplate, ServiceError> {
        self.load_template(template_id)
    }

    pub fn submission(
        &self,
        submission_id: &FormSubmissionId,
    ) -> Result<FormSubmission, ServiceError> {
        self.load_submission(submission_id)
    }

    pub fn submissions_for_template(
        &self,
        template_id: &FormTemplateId,
    ) -> Result<Vec<FormSubmission>, ServiceError> {
        Ok(self.submissions.find_by_template(template_id)?)
    }

    pub fn submissions_for_context(
        &self,
        context_type: &str,
        context_id: &str,
    ) -> Result<Vec<FormSubmission>, ServiceError> {
        Ok(self.submissions.find_by_context(context_type, context_id)?)
    }

    pub fn templates_for_context(
        &self,
        context_type: &str,
    ) -> Result<Vec<FormTemplate>, ServiceError> {
        Ok(self.templates.find_by_context(context_type)?)
    }

    fn load_template(&self, id: &FormTemplateId) -> Result<FormTemplate, ServiceError> {
        self.templates
            .find_by_id(id)?
            .ok_or(ServiceError::TemplateNotFound(*id))
    }

    fn load_submission(&self, id: &FormSubmissionId) -> Result<FormSubmission, ServiceError> {
        self.submissions
            .find_by_id(id)?
            .ok_or(ServiceError::SubmissionNotFound(*id))
    }

    fn drain_template_events(&self, template: &mut FormTemplate) -> Result<(), ServiceError> {
        for event in template.take_events() {
            self.publisher.publish(&event)?;
        }
        Ok(())
    }

    fn drain_submission_events(&self, submission: &mut FormSubmission) -> Result<(), ServiceError> {
        for event in submission.take_events() {
            self.publisher.publish(&event)?;
        }
        Ok(())
    }
}
