use chrono::{DateTime, Utc};
use serde::Serialize;

use super::submission::FormSubmissionId;
use super::template::FormTemplateId;

/// Domain events collected on the aggregates.
///
/// Aggregates only append to their pending buffer; the use-case layer drains
/// it after a successful save and hands the events to an
/// [`EventPublisher`](super::repository::EventPublisher). Nothing is ever
/// dispatched from inside an aggregate method.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FormEvent {
    TemplateCreated {
        template_id: FormTemplateId,
        name: String,
        context_type: String,
        created_by: String,
        occurred_at: DateTime<Utc>,
    },
    TemplatePublished {
        template_id: FormTemplateId,
        name: String,
        version: String,
        occurred_at: DateTime<Utc>,
    },
    TemplateArchived {
        template_id: FormTemplateId,
        name: String,
        occurred_at: DateTime<Utc>,
    },
    SubmissionReceived {
        submission_id: FormSubmissionId,
        template_id: FormTemplateId,
        submitted_by: String,
        context_type: String,
        context_id: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    SubmissionValidated {
        submission_id: FormSubmissionId,
        template_id: FormTemplateId,
        validated_by: String,
        occurred_at: DateTime<Utc>,
    },
}
