use super::events::FormEvent;
use super::submission::{FormSubmission, FormSubmissionId};
use super::template::{FormTemplate, FormTemplateId};

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Storage contract for template aggregates, implemented externally (e.g. by
/// an ORM-backed adapter). Each template version is its own row.
pub trait TemplateRepository: Send + Sync {
    fn save(&self, template: &FormTemplate) -> Result<(), RepositoryError>;
    fn find_by_id(&self, id: &FormTemplateId) -> Result<Option<FormTemplate>, RepositoryError>;
    fn find_by_context(&self, context_type: &str) -> Result<Vec<FormTemplate>, RepositoryError>;
    fn find_latest_version(&self, name: &str) -> Result<Option<FormTemplate>, RepositoryError>;
    fn find_all_versions(&self, name: &str) -> Result<Vec<FormTemplate>, RepositoryError>;
    fn exists(&self, name: &str) -> Result<bool, RepositoryError>;
    fn find_all_active(&self) -> Result<Vec<FormTemplate>, RepositoryError>;
    fn find_published(&self) -> Result<Vec<FormTemplate>, RepositoryError>;
    fn delete(&self, id: &FormTemplateId) -> Result<(), RepositoryError>;
}

/// Storage contract for submission aggregates.
pub trait SubmissionRepository: Send + Sync {
    fn save(&self, submission: &FormSubmission) -> Result<(), RepositoryError>;
    fn find_by_id(&self, id: &FormSubmissionId)
        -> Result<Option<FormSubmission>, RepositoryError>;
    fn find_by_template(
        &self,
        template_id: &FormTemplateId,
    ) -> Result<Vec<FormSubmission>, RepositoryError>;
    fn find_by_context(
        &self,
        context_type: &str,
        context_id: &str,
    ) -> Result<Vec<FormSubmission>, RepositoryError>;
    fn count_submissions(&self, template_id: &FormTemplateId) -> Result<u64, RepositoryError>;
    fn find_all(&self) -> Result<Vec<FormSubmission>, RepositoryError>;
    fn delete(&self, id: &FormSubmissionId) -> Result<(), RepositoryError>;
}

/// Event dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("event transport unavailable: {0}")]
    Transport(String),
}

/// Outbound hook for drained domain events (message bus, audit log, ...).
/// The service layer publishes only after a successful save.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &FormEvent) -> Result<(), PublishError>;
}
