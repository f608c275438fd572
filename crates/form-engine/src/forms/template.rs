use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::events::FormEvent;
use super::field::{FieldConfigError, FieldPatch, FormField};

/// Identifier for one template version row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormTemplateId(Uuid);

impl FormTemplateId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(value).map(Self)
    }
}

impl fmt::Display for FormTemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Minor-incrementing semantic version, rendered as "major.minor".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TemplateVersion {
    major: u32,
    minor: u32,
}

impl TemplateVersion {
    pub const fn initial() -> Self {
        Self { major: 1, minor: 0 }
    }

    pub const fn increment_minor(self) -> Self {
        Self {
            major: self.major,
            minor: self.minor + 1,
        }
    }

    pub const fn major(self) -> u32 {
        self.major
    }

    pub const fn minor(self) -> u32 {
        self.minor
    }
}

impl fmt::Display for TemplateVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid template version '{0}'")]
pub struct VersionParseError(String);

impl FromStr for TemplateVersion {
    type Err = VersionParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (major, minor) = value
            .split_once('.')
            .ok_or_else(|| VersionParseError(value.to_string()))?;
        let major = major
            .parse::<u32>()
            .map_err(|_| VersionParseError(value.to_string()))?;
        let minor = minor
            .parse::<u32>()
            .map_err(|_| VersionParseError(value.to_string()))?;
        Ok(Self { major, minor })
    }
}

impl From<TemplateVersion> for String {
    fn from(version: TemplateVersion) -> Self {
        version.to_string()
    }
}

impl TryFrom<String> for TemplateVersion {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Publish lifecycle of a template. Transitions are monotonic; there is no
/// way back from PUBLISHED or ARCHIVED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateStatus {
    Draft,
    Published,
    Archived,
}

impl TemplateStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            TemplateStatus::Draft => "DRAFT",
            TemplateStatus::Published => "PUBLISHED",
            TemplateStatus::Archived => "ARCHIVED",
        }
    }

    pub const fn can_transition_to(self, next: TemplateStatus) -> bool {
        matches!(
            (self, next),
            (TemplateStatus::Draft, TemplateStatus::Published)
                | (TemplateStatus::Draft, TemplateStatus::Archived)
                | (TemplateStatus::Published, TemplateStatus::Archived)
        )
    }
}

impl fmt::Display for TemplateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TemplateError {
    #[error("template name is required")]
    EmptyName,
    #[error("cannot edit a {status} template")]
    NotEditable { status: TemplateStatus },
    #[error("field with id {0} already exists")]
    DuplicateField(String),
    #[error("field with id {0} not found")]
    FieldNotFound(String),
    #[error("template cannot be published: {}", reasons.join("; "))]
    NotPublishable { reasons: Vec<String> },
    #[error("cannot transition from {from} to {to}")]
    InvalidTransition {
        from: TemplateStatus,
        to: TemplateStatus,
    },
    #[error("template is already archived")]
    AlreadyArchived,
    #[error("only published templates can be versioned")]
    NotPublished,
    #[error(transparent)]
    Field(#[from] FieldConfigError),
}

/// Creation properties for a fresh template.
#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub name: String,
    pub description: Option<String>,
    pub context_type: String,
    pub created_by: String,
}

/// Persisted shape of a template, matching the logical serialization of the
/// aggregate. Round-trips losslessly through `snapshot`/`from_snapshot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSnapshot {
    pub id: FormTemplateId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub version: TemplateVersion,
    pub status: TemplateStatus,
    pub fields: Vec<FormField>,
    pub schema: Value,
    pub context_type: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version_id: Option<FormTemplateId>,
    #[serde(default = "default_latest")]
    pub is_latest_version: bool,
}

fn default_latest() -> bool {
    true
}

/// Aggregate root: a versioned, ordered collection of fields with a publish
/// lifecycle and a derived JSON schema.
#[derive(Debug, Clone)]
pub struct FormTemplate {
    id: FormTemplateId,
    name: String,
    description: Option<String>,
    version: TemplateVersion,
    status: TemplateStatus,
    fields: Vec<FormField>,
    schema: Value,
    context_type: String,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_by: Option<String>,
    updated_at: Option<DateTime<Utc>>,
    published_at: Option<DateTime<Utc>>,
    archived_at: Option<DateTime<Utc>>,
    previous_version_id: Option<FormTemplateId>,
    is_latest_version: bool,
    events: Vec<FormEvent>,
}

impl FormTemplate {
    pub fn create(props: NewTemplate) -> Result<Self, TemplateError> {
        Self::create_version(props, TemplateVersion::initial(), None, Vec::new())
    }

    fn create_version(
        props: NewTemplate,
        version: TemplateVersion,
        previous_version_id: Option<FormTemplateId>,
        fields: Vec<FormField>,
    ) -> Result<Self, TemplateError> {
        let name = props.name.trim().to_string();
        if name.is_empty() {
            return Err(TemplateError::EmptyName);
        }

        let id = FormTemplateId::generate();
        let mut template = Self {
            id,
            name: name.clone(),
            description: props.description.map(|d| d.trim().to_string()),
            version,
            status: TemplateStatus::Draft,
            fields,
            schema: Value::Null,
            context_type: props.context_type,
            created_by: props.created_by.clone(),
            created_at: Utc::now(),
            updated_by: None,
            updated_at: None,
            published_at: None,
            archived_at: None,
            previous_version_id,
            is_latest_version: true,
            events: Vec::new(),
        };

        template.regenerate_schema();
        template.events.push(FormEvent::TemplateCreated {
            template_id: id,
            name,
            context_type: template.context_type.clone(),
            created_by: props.created_by,
            occurred_at: template.created_at,
        });

        Ok(template)
    }

    pub fn from_snapshot(snapshot: TemplateSnapshot) -> Result<Self, TemplateError> {
        if snapshot.name.trim().is_empty() {
            return Err(TemplateError::EmptyName);
        }

        Ok(Self {
            id: snapshot.id,
            name: snapshot.name,
            description: snapshot.description,
            version: snapshot.version,
            status: snapshot.status,
            fields: snapshot.fields,
            schema: snapshot.schema,
            context_type: snapshot.context_type,
            created_by: snapshot.created_by,
            created_at: snapshot.created_at,
            updated_by: snapshot.updated_by,
            updated_at: snapshot.updated_at,
            published_at: snapshot.published_at,
            archived_at: snapshot.archived_at,
            previous_version_id: snapshot.previous_version_id,
            is_latest_version: snapshot.is_latest_version,
            events: Vec::new(),
        })
    }

    pub fn snapshot(&self) -> TemplateSnapshot {
        TemplateSnapshot {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            version: self.version,
            status: self.status,
            fields: self.fields.clone(),
            schema: self.schema.clone(),
            context_type: self.context_type.clone(),
            created_by: self.created_by.clone(),
            created_at: self.created_at,
            updated_by: self.updated_by.clone(),
            updated_at: self.updated_at,
            published_at: self.published_at,
            archived_at: self.archived_at,
            previous_version_id: self.previous_version_id,
            is_latest_version: self.is_latest_version,
        }
    }

    pub fn add_field(&mut self, field: FormField) -> Result<(), TemplateError> {
        self.ensure_editable()?;
        if self.fields.iter().any(|existing| existing.id() == field.id()) {
            return Err(TemplateError::DuplicateField(field.id().to_string()));
        }

        self.fields.push(field);
        self.regenerate_schema();
        self.mark_updated(None);
        Ok(())
    }

    pub fn remove_field(&mut self, field_id: &str) -> Result<(), TemplateError> {
        self.ensure_editable()?;
        let before = self.fields.len();
        self.fields.retain(|field| field.id() != field_id);
        if self.fields.len() == before {
            return Err(TemplateError::FieldNotFound(field_id.to_string()));
        }

        self.regenerate_schema();
        self.mark_updated(None);
        Ok(())
    }

    pub fn update_field(&mut self, field_id: &str, patch: FieldPatch) -> Result<(), TemplateError> {
        self.ensure_editable()?;
        let index = self
            .fields
            .iter()
            .position(|field| field.id() == field_id)
            .ok_or_else(|| TemplateError::FieldNotFound(field_id.to_string()))?;

        let updated = self.fields[index].apply(patch)?;
        self.fields[index] = updated;
        self.regenerate_schema();
        self.mark_updated(None);
        Ok(())
    }

    /// Renames or re-describes a draft template.
    pub fn update_info(
        &mut self,
        name: Option<String>,
        description: Option<String>,
        updated_by: &str,
    ) -> Result<(), TemplateError> {
        self.ensure_editable()?;

        if let Some(name) = name {
            let trimmed = name.trim().to_string();
            if trimmed.is_empty() {
                return Err(TemplateError::EmptyName);
            }
            self.name = trimmed;
        }
        if let Some(description) = description {
            self.description = Some(description.trim().to_string());
        }

        self.mark_updated(Some(updated_by));
        Ok(())
    }

    /// Freezes the template, generating its final schema. Fails with every
    /// unmet precondition listed, never just the first.
    pub fn publish(&mut self) -> Result<(), TemplateError> {
        let reasons = self.publish_blockers();
        if !reasons.is_empty() {
            return Err(TemplateError::NotPublishable { reasons });
        }

        if !self.status.can_transition_to(TemplateStatus::Published) {
            return Err(TemplateError::InvalidTransition {
                from: self.status,
                to: TemplateStatus::Published,
            });
        }

        self.status = TemplateStatus::Published;
        self.published_at = Some(Utc::now());
        self.regenerate_schema();
        self.mark_updated(None);

        self.events.push(FormEvent::TemplatePublished {
            template_id: self.id,
            name: self.name.clone(),
            version: self.version.to_string(),
            occurred_at: self.published_at.unwrap_or_else(Utc::now),
        });
        Ok(())
    }

    pub fn archive(&mut self) -> Result<(), TemplateError> {
        if self.status == TemplateStatus::Archived {
            return Err(TemplateError::AlreadyArchived);
        }
        if !self.status.can_transition_to(TemplateStatus::Archived) {
            return Err(TemplateError::InvalidTransition {
                from: self.status,
                to: TemplateStatus::Archived,
            });
        }

        self.status = TemplateStatus::Archived;
        self.archived_at = Some(Utc::now());
        self.mark_updated(None);

        self.events.push(FormEvent::TemplateArchived {
            template_id: self.id,
            name: self.name.clone(),
            occurred_at: self.archived_at.unwrap_or_else(Utc::now),
        });
        Ok(())
    }

    /// Forks a new DRAFT with the next minor version. Field ids are kept so
    /// conditional-logic targets and formula references stay valid across
    /// versions. The current template stops being the latest version.
    pub fn create_new_version(&mut self, created_by: &str) -> Result<Self, TemplateError> {
        if self.status != TemplateStatus::Published {
            return Err(TemplateError::NotPublished);
        }

        let next = Self::create_version(
            NewTemplate {
                name: self.name.clone(),
                description: self.description.clone(),
                context_type: self.context_type.clone(),
                created_by: created_by.to_string(),
            },
            self.version.increment_minor(),
            Some(self.id),
            self.fields.clone(),
        )?;

        self.is_latest_version = false;
        self.mark_updated(Some(created_by));
        Ok(next)
    }

    fn ensure_editable(&self) -> Result<(), TemplateError> {
        if self.status == TemplateStatus::Draft {
            Ok(())
        } else {
            Err(TemplateError::NotEditable {
                status: self.status,
            })
        }
    }

    fn publish_blockers(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        if self.fields.is_empty() {
            reasons.push("template must have at least one field".to_string());
        }
        for field in &self.fields {
            reasons.extend(field.publish_blockers());
        }
        reasons
    }

    fn mark_updated(&mut self, updated_by: Option<&str>) {
        self.updated_by = Some(
            updated_by
                .map(str::to_string)
                .unwrap_or_else(|| self.created_by.clone()),
        );
        self.updated_at = Some(Utc::now());
    }

    // JSON-schema-like derivation, regenerated after every structural edit.
    fn regenerate_schema(&mut self) {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for field in &self.fields {
            let mut field_schema = serde_json::Map::new();
            field_schema.insert(
                "type".to_string(),
                Value::from(field.kind().json_schema_type()),
            );
            field_schema.insert("title".to_string(), Value::from(field.label()));
            if let Some(help) = field.help_text() {
                field_schema.insert("description".to_string(), Value::from(help));
            }

            for rule in field.rules() {
                rule.apply_to_schema(&mut field_schema);
            }

            if field.kind().requires_options() {
                field_schema.insert(
                    "enum".to_string(),
                    Value::Array(field.options().iter().map(|o| Value::from(o.clone())).collect()),
                );
            }

            properties.insert(field.id().to_string(), Value::Object(field_schema));
            if field.is_required() {
                required.push(Value::from(field.id()));
            }
        }

        self.schema = serde_json::json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "properties": properties,
            "required": required,
        });
    }

    pub fn id(&self) -> FormTemplateId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn version(&self) -> TemplateVersion {
        self.version
    }

    pub fn status(&self) -> TemplateStatus {
        self.status
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn context_type(&self) -> &str {
        &self.context_type
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn archived_at(&self) -> Option<DateTime<Utc>> {
        self.archived_at
    }

    pub fn previous_version_id(&self) -> Option<FormTemplateId> {
        self.previous_version_id
    }

    pub fn is_latest_version(&self) -> bool {
        self.is_latest_version
    }

    pub fn is_draft(&self) -> bool {
        self.status == TemplateStatus::Draft
    }

    pub fn is_published(&self) -> bool {
        self.status == TemplateStatus::Published
    }

    pub fn is_archived(&self) -> bool {
        self.status == TemplateStatus::Archived
    }

    pub fn field(&self, field_id: &str) -> Option<&FormField> {
        self.fields.iter().find(|field| field.id() == field_id)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FormField> {
        self.fields.iter().filter(|field| field.is_required())
    }

    pub fn calculated_fields(&self) -> impl Iterator<Item = &FormField> {
        self.fields.iter().filter(|field| field.is_calculated())
    }

    pub fn fields_with_visibility_rules(&self) -> impl Iterator<Item = &FormField> {
        self.fields.iter().filter(|field| field.has_visibility_rule())
    }

    pub fn pending_events(&self) -> &[FormEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<FormEvent> {
        std::mem::take(&mut self.events)
    }
}
