use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::calculation::{CalculationFormula, FormulaError};
use super::logic::ConditionalRule;
use super::value::FieldValue;

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Closed set of supported field kinds. Each kind knows its JSON-schema
/// primitive and whether it needs an options list; new kinds extend this
/// enum rather than subclassing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    Text,
    #[serde(rename = "TEXTAREA")]
    TextArea,
    Number,
    Date,
    Select,
    Radio,
    #[serde(rename = "MULTISELECT")]
    MultiSelect,
    Checkbox,
    Calculated,
}

impl FieldType {
    pub const fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "TEXT",
            FieldType::TextArea => "TEXTAREA",
            FieldType::Number => "NUMBER",
            FieldType::Date => "DATE",
            FieldType::Select => "SELECT",
            FieldType::Radio => "RADIO",
            FieldType::MultiSelect => "MULTISELECT",
            FieldType::Checkbox => "CHECKBOX",
            FieldType::Calculated => "CALCULATED",
        }
    }

    pub const fn json_schema_type(self) -> &'static str {
        match self {
            FieldType::Text | FieldType::TextArea | FieldType::Date => "string",
            FieldType::Number | FieldType::Calculated => "number",
            FieldType::Select | FieldType::Radio => "string",
            FieldType::MultiSelect => "array",
            FieldType::Checkbox => "boolean",
        }
    }

    pub const fn requires_options(self) -> bool {
        matches!(
            self,
            FieldType::Select | FieldType::Radio | FieldType::MultiSelect
        )
    }

    /// Structural type check for a normalized, non-empty value.
    fn accepts(self, value: &FieldValue) -> bool {
        match self {
            FieldType::Text | FieldType::TextArea | FieldType::Select | FieldType::Radio => {
                value.is_string()
            }
            FieldType::Number | FieldType::Calculated => value.is_number(),
            FieldType::Checkbox => value.is_boolean(),
            FieldType::MultiSelect => match value.value() {
                Value::Array(items) => items.iter().all(Value::is_string),
                _ => false,
            },
            FieldType::Date => value.as_str().map(is_iso_date).unwrap_or(false),
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_iso_date(text: &str) -> bool {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
        || DateTime::parse_from_rfc3339(text).is_ok()
}

/// Declarative per-field validation rule with a JSON-schema keyword mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationRule {
    MinLength(usize),
    MaxLength(usize),
    MinValue(f64),
    MaxValue(f64),
    Email,
    Url,
    Pattern(String),
}

impl ValidationRule {
    /// Checks a normalized, non-empty value. Type mismatches are left to the
    /// field-type check; a rule that does not apply passes.
    pub fn check(&self, value: &FieldValue) -> Result<(), String> {
        match self {
            ValidationRule::MinLength(min) => match value.as_str() {
                Some(text) if text.chars().count() < *min => {
                    Err(format!("must be at least {min} characters"))
                }
                _ => Ok(()),
            },
            ValidationRule::MaxLength(max) => match value.as_str() {
                Some(text) if text.chars().count() > *max => {
                    Err(format!("must be at most {max} characters"))
                }
                _ => Ok(()),
            },
            ValidationRule::MinValue(min) => match value.as_f64() {
                Some(number) if number < *min => Err(format!("must be at least {min}")),
                _ => Ok(()),
            },
            ValidationRule::MaxValue(max) => match value.as_f64() {
                Some(number) if number > *max => Err(format!("must be at most {max}")),
                _ => Ok(()),
            },
            ValidationRule::Email => match value.as_str() {
                Some(text) if !EMAIL_REGEX.is_match(text) => {
                    Err("must be a valid email address".to_string())
                }
                _ => Ok(()),
            },
            ValidationRule::Url => match value.as_str() {
                Some(text) => url::Url::parse(text)
                    .map(|_| ())
                    .map_err(|_| "must be a valid URL".to_string()),
                None => Ok(()),
            },
            // User patterns serialize as plain strings, so the compiled form
            // is rebuilt per check; well_formed() guarantees it compiles.
            ValidationRule::Pattern(pattern) => match value.as_str() {
                Some(text) => {
                    let compiled = Regex::new(pattern)
                        .map_err(|_| "pattern is not a valid regular expression".to_string())?;
                    if compiled.is_match(text) {
                        Ok(())
                    } else {
                        Err("does not match the required format".to_string())
                    }
                }
                None => Ok(()),
            },
        }
    }

    /// Folds this rule's constraint keyword into a field schema object.
    pub fn apply_to_schema(&self, schema: &mut serde_json::Map<String, Value>) {
        match self {
            ValidationRule::MinLength(min) => {
                schema.insert("minLength".to_string(), Value::from(*min));
            }
            ValidationRule::MaxLength(max) => {
                schema.insert("maxLength".to_string(), Value::from(*max));
            }
            ValidationRule::MinValue(min) => {
                schema.insert("minimum".to_string(), Value::from(*min));
            }
            ValidationRule::MaxValue(max) => {
                schema.insert("maximum".to_string(), Value::from(*max));
            }
            ValidationRule::Email => {
                schema.insert("format".to_string(), Value::from("email"));
            }
            ValidationRule::Url => {
                schema.insert("format".to_string(), Value::from("uri"));
            }
            ValidationRule::Pattern(pattern) => {
                schema.insert("pattern".to_string(), Value::from(pattern.clone()));
            }
        }
    }

    fn well_formed(&self) -> Result<(), FieldConfigError> {
        if let ValidationRule::Pattern(pattern) = self {
            Regex::new(pattern).map_err(|_| FieldConfigError::InvalidPattern(pattern.clone()))?;
        }
        Ok(())
    }
}

/// Tunable construction limits, injected rather than read from globals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPolicy {
    pub max_label_length: usize,
}

impl Default for FieldPolicy {
    fn default() -> Self {
        Self {
            max_label_length: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldConfigError {
    #[error("field label is required")]
    EmptyLabel,
    #[error("field label exceeds {max} characters")]
    LabelTooLong { max: usize },
    #[error("field type {0} requires at least one option")]
    MissingOptions(FieldType),
    #[error("field options must not be blank")]
    BlankOption,
    #[error("calculated fields require a formula")]
    MissingFormula,
    #[error("field type {0} cannot carry a formula")]
    FormulaNotAllowed(FieldType),
    #[error("invalid calculation formula: {0}")]
    Formula(#[from] FormulaError),
    #[error("invalid validation pattern '{0}'")]
    InvalidPattern(String),
}

/// Construction properties for a field. Missing ids are generated.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub id: Option<String>,
    pub kind: FieldType,
    pub label: String,
    pub placeholder: Option<String>,
    pub help_text: Option<String>,
    pub default_value: Option<Value>,
    pub rules: Vec<ValidationRule>,
    pub visibility: Option<ConditionalRule>,
    pub formula: Option<String>,
    pub options: Vec<String>,
    pub order: u32,
    pub required: bool,
}

impl FieldSpec {
    pub fn new(kind: FieldType, label: impl Into<String>) -> Self {
        Self {
            id: None,
            kind,
            label: label.into(),
            placeholder: None,
            help_text: None,
            default_value: None,
            rules: Vec::new(),
            visibility: None,
            formula: None,
            options: Vec::new(),
            order: 0,
            required: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_options(mut self, options: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_rules(mut self, rules: impl IntoIterator<Item = ValidationRule>) -> Self {
        self.rules = rules.into_iter().collect();
        self
    }

    pub fn with_visibility(mut self, rule: ConditionalRule) -> Self {
        self.visibility = Some(rule);
        self
    }

    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }
}

/// Partial update applied to an existing field. `None` keeps the current
/// value; the field's id and type never change after creation.
#[derive(Debug, Clone, Default)]
pub struct FieldPatch {
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub help_text: Option<String>,
    pub default_value: Option<Value>,
    pub rules: Option<Vec<ValidationRule>>,
    pub visibility: Option<ConditionalRule>,
    pub formula: Option<String>,
    pub options: Option<Vec<String>>,
    pub order: Option<u32>,
    pub required: Option<bool>,
}

/// One field definition inside a template.
///
/// Immutable once the owning template is published; structural edits go
/// through a new template version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    id: String,
    kind: FieldType,
    label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    help_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_value: Option<FieldValue>,
    #[serde(default)]
    rules: Vec<ValidationRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    visibility: Option<ConditionalRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    formula: Option<CalculationFormula>,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    order: u32,
    #[serde(default)]
    required: bool,
}

impl FormField {
    pub fn create(spec: FieldSpec) -> Result<Self, FieldConfigError> {
        Self::create_with_policy(spec, &FieldPolicy::default())
    }

    pub fn create_with_policy(
        spec: FieldSpec,
        policy: &FieldPolicy,
    ) -> Result<Self, FieldConfigError> {
        let label = spec.label.trim().to_string();
        if label.is_empty() {
            return Err(FieldConfigError::EmptyLabel);
        }
        if label.chars().count() > policy.max_label_length {
            return Err(FieldConfigError::LabelTooLong {
                max: policy.max_label_length,
            });
        }

        if spec.kind.requires_options() {
            if spec.options.is_empty() {
                return Err(FieldConfigError::MissingOptions(spec.kind));
            }
            if spec.options.iter().any(|option| option.trim().is_empty()) {
                return Err(FieldConfigError::BlankOption);
            }
        }

        let formula = match (spec.kind, spec.formula) {
            (FieldType::Calculated, Some(source)) => Some(CalculationFormula::parse(&source)?),
            (FieldType::Calculated, None) => return Err(FieldConfigError::MissingFormula),
            (kind, Some(_)) => return Err(FieldConfigError::FormulaNotAllowed(kind)),
            (_, None) => None,
        };

        for rule in &spec.rules {
            rule.well_formed()?;
        }

        let id = spec
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let default_value = spec
            .default_value
            .map(FieldValue::new)
            .filter(|value| !value.is_empty());

        // Calculated fields are never manually answered, so requiredness
        // does not apply to them.
        let required = spec.required && spec.kind != FieldType::Calculated;

        Ok(Self {
            id,
            kind: spec.kind,
            label,
            placeholder: spec.placeholder.map(|p| p.trim().to_string()),
            help_text: spec.help_text.map(|h| h.trim().to_string()),
            default_value,
            rules: spec.rules,
            visibility: spec.visibility,
            formula,
            options: spec.options,
            order: spec.order,
            required,
        })
    }

    /// Produces an updated copy; the replacement is by value, the original
    /// is untouched.
    pub fn apply(&self, patch: FieldPatch) -> Result<Self, FieldConfigError> {
        let spec = FieldSpec {
            id: Some(self.id.clone()),
            kind: self.kind,
            label: patch.label.unwrap_or_else(|| self.label.clone()),
            placeholder: patch.placeholder.or_else(|| self.placeholder.clone()),
            help_text: patch.help_text.or_else(|| self.help_text.clone()),
            default_value: patch.default_value.or_else(|| {
                self.default_value
                    .clone()
                    .map(FieldValue::into_value)
            }),
            rules: patch.rules.unwrap_or_else(|| self.rules.clone()),
            visibility: patch.visibility.or_else(|| self.visibility.clone()),
            formula: patch
                .formula
                .or_else(|| self.formula.as_ref().map(|f| f.source().to_string())),
            options: patch.options.unwrap_or_else(|| self.options.clone()),
            order: patch.order.unwrap_or(self.order),
            required: patch.required.unwrap_or(self.required),
        };

        Self::create(spec)
    }

    /// Structural check of a normalized answer against this field's type,
    /// options, and declared rules. Requiredness and visibility are the
    /// validator's concern; an empty value always passes here.
    pub fn validate_value(&self, value: &FieldValue) -> Result<(), String> {
        if value.is_empty() {
            return Ok(());
        }

        if !self.kind.accepts(value) {
            return Err(format!("expected a {} value", self.kind));
        }

        if self.kind.requires_options() && !self.matches_options(value) {
            return Err("not one of the configured options".to_string());
        }

        for rule in &self.rules {
            rule.check(value)?;
        }

        Ok(())
    }

    fn matches_options(&self, value: &FieldValue) -> bool {
        match value.value() {
            Value::String(choice) => self.options.iter().any(|option| option == choice),
            Value::Array(choices) => choices.iter().all(|choice| {
                choice
                    .as_str()
                    .map(|text| self.options.iter().any(|option| option == text))
                    .unwrap_or(false)
            }),
            _ => false,
        }
    }

    /// Reasons this field would block a publish. Construction enforces most
    /// invariants, but persisted data may predate them.
    pub fn publish_blockers(&self) -> Vec<String> {
        let mut reasons = Vec::new();

        if self.label.trim().is_empty() {
            reasons.push(format!("field {} has no label", self.id));
        }
        if self.kind.requires_options() && self.options.is_empty() {
            reasons.push(format!(
                "field \"{}\" requires at least one option",
                self.label
            ));
        }
        if self.kind == FieldType::Calculated && self.formula.is_none() {
            reasons.push(format!("field \"{}\" is missing its formula", self.label));
        }
        for rule in &self.rules {
            if rule.well_formed().is_err() {
                reasons.push(format!(
                    "field \"{}\" has an invalid validation pattern",
                    self.label
                ));
            }
        }

        reasons
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> FieldType {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn placeholder(&self) -> Option<&str> {
        self.placeholder.as_deref()
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help_text.as_deref()
    }

    pub fn default_value(&self) -> Option<&FieldValue> {
        self.default_value.as_ref()
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    pub fn visibility(&self) -> Option<&ConditionalRule> {
        self.visibility.as_ref()
    }

    pub fn formula(&self) -> Option<&CalculationFormula> {
        self.formula.as_ref()
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_calculated(&self) -> bool {
        self.kind == FieldType::Calculated
    }

    pub fn has_visibility_rule(&self) -> bool {
        self.visibility.is_some()
    }
}
