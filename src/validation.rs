use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::ans_version::AnsVersion;
use crate::client::AnsViolation;
use crate::content_type::ContentType;
use crate::document::{get_path, remove_path, set_path};

/// Validation report for a transformed document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub deprecated_fields: Vec<String>,
    pub missing_required_fields: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            deprecated_fields: Vec::new(),
            missing_required_fields: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    pub fn add_deprecated_field(&mut self, field_path: String) {
        self.deprecated_fields.push(field_path);
    }

    pub fn add_missing_required_field(&mut self, field_path: String) {
        self.is_valid = false;
        self.missing_required_fields.push(field_path);
    }

    /// Record the target organization's verdict on the document.
    pub fn add_target_violations(&mut self, violations: Vec<AnsViolation>) {
        for violation in violations {
            self.add_error(ValidationError::new(
                violation.path,
                ValidationErrorType::RejectedByTarget,
                violation.message,
            ));
        }
    }

    /// True when the target's ANS validator refused the document.
    pub fn rejected_by_target(&self) -> bool {
        self.errors
            .iter()
            .any(|e| e.error_type == ValidationErrorType::RejectedByTarget)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty() || !self.missing_required_fields.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty() || !self.deprecated_fields.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len() + self.missing_required_fields.len()
    }

    /// One line per problem, for surfacing a failed validation as warnings.
    pub fn problems(&self) -> Vec<String> {
        let mut problems: Vec<String> = self
            .missing_required_fields
            .iter()
            .map(|f| format!("missing required field {f}"))
            .collect();
        problems.extend(self.errors.iter().map(|e| format!("{}: {}", e.field_path, e.message)));
        problems
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub field_path: String,
    pub error_type: ValidationErrorType,
    pub message: String,
    pub suggested_fix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationErrorType {
    MissingRequiredField,
    InvalidFieldType,
    InvalidFieldValue,
    SchemaViolation,
    RejectedByTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub field_path: String,
    pub warning_type: ValidationWarningType,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationWarningType {
    DeprecatedField,
}

impl ValidationError {
    pub fn new(field_path: String, error_type: ValidationErrorType, message: String) -> Self {
        Self {
            field_path,
            error_type,
            message,
            suggested_fix: None,
        }
    }

    pub fn with_suggested_fix(mut self, fix: String) -> Self {
        self.suggested_fix = Some(fix);
        self
    }
}

impl ValidationWarning {
    pub fn new(field_path: String, warning_type: ValidationWarningType, message: String) -> Self {
        Self {
            field_path,
            warning_type,
            message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FieldType {
    String,
    Array,
    Object,
}

impl FieldType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
        }
    }
}

/// Required and deprecated fields of one content type's target payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub content_type: ContentType,
    pub version: Option<AnsVersion>,
    pub required_fields: Vec<String>,
    pub deprecated_fields: Vec<String>,
    pub field_types: HashMap<String, FieldType>,
}

impl SchemaDefinition {
    pub fn new(content_type: ContentType) -> Self {
        Self {
            content_type,
            version: content_type.ans_version(),
            required_fields: Vec::new(),
            deprecated_fields: Vec::new(),
            field_types: HashMap::new(),
        }
    }

    pub fn add_required_field(&mut self, field_path: &str, field_type: FieldType) {
        self.required_fields.push(field_path.to_string());
        self.field_types.insert(field_path.to_string(), field_type);
    }

    pub fn add_deprecated_field(&mut self, field_path: &str) {
        self.deprecated_fields.push(field_path.to_string());
    }

    pub fn add_field_type(&mut self, field_path: &str, field_type: FieldType) {
        self.field_types.insert(field_path.to_string(), field_type);
    }

    /// Built-in definition for a content type.
    pub fn for_content_type(content_type: ContentType) -> Self {
        let mut schema = Self::new(content_type);
        match content_type {
            ContentType::Story | ContentType::Video | ContentType::Gallery | ContentType::Image => {
                schema.add_required_field("_id", FieldType::String);
                schema.add_required_field("type", FieldType::String);
                schema.add_required_field("version", FieldType::String);
                schema.add_required_field("owner.id", FieldType::String);
                schema.add_field_type("content_elements", FieldType::Array);
                schema.add_field_type("additional_properties", FieldType::Object);
                schema.add_deprecated_field("taxonomy.primary_site");
                schema.add_deprecated_field("taxonomy.sites");
                if content_type == ContentType::Story {
                    schema.add_required_field("canonical_website", FieldType::String);
                    schema.add_field_type("circulations", FieldType::Array);
                }
            }
            ContentType::Author => {
                schema.add_required_field("_id", FieldType::String);
                schema.add_required_field("byline", FieldType::String);
            }
            ContentType::Redirect => {
                schema.add_required_field("website", FieldType::String);
                schema.add_required_field("website_url", FieldType::String);
                schema.add_required_field("document_id", FieldType::String);
            }
            ContentType::Lightbox => {
                schema.add_required_field("name", FieldType::String);
                schema.add_field_type("photos", FieldType::Array);
            }
            ContentType::Collection => {
                schema.add_required_field("name", FieldType::String);
                schema.add_required_field("canonical_website", FieldType::String);
                schema.add_field_type("document", FieldType::Object);
            }
        }
        schema
    }
}

/// Properties the photo API accepts on images that the ANS schema does not.
pub const PHOTO_CENTER_ONLY_FIELDS: &[&str] = &["usage_instructions", "photographer", "creditIPTC"];

/// Move Photo-Center-only image fields under `additional_properties`,
/// returning what was moved.
pub fn park_photo_center_fields(document: &mut Value) -> Vec<(String, Value)> {
    let mut parked = Vec::new();
    for field in PHOTO_CENTER_ONLY_FIELDS {
        if let Some(value) = remove_path(document, field) {
            set_path(document, &format!("additional_properties.{field}"), value.clone());
            parked.push((field.to_string(), value));
        }
    }
    parked
}

/// Shape a document the way the ANS schema expects it. Undo with
/// [`restore_parked_fields`].
pub fn prepare_for_validation(content_type: ContentType, document: &mut Value) -> Vec<(String, Value)> {
    if content_type == ContentType::Image {
        park_photo_center_fields(document)
    } else {
        Vec::new()
    }
}

/// Put parked fields back at the top level.
pub fn restore_parked_fields(document: &mut Value, parked: Vec<(String, Value)>) {
    for (field, value) in parked {
        remove_path(document, &format!("additional_properties.{field}"));
        set_path(document, &field, value);
    }
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read schema file: {0}")]
    Io(#[from] std::io::Error),

    #[error("schema file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to compile schema: {0}")]
    Compile(String),
}

/// JSON-Schema validation of transformed documents
pub struct SchemaValidator {
    compiled: jsonschema::JSONSchema,
}

impl SchemaValidator {
    pub fn from_value(schema: &Value) -> Result<Self, SchemaError> {
        let compiled = jsonschema::JSONSchema::compile(schema)
            .map_err(|e| SchemaError::Compile(e.to_string()))?;
        Ok(Self { compiled })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let contents = std::fs::read_to_string(path)?;
        let schema: Value = serde_json::from_str(&contents)?;
        Self::from_value(&schema)
    }

    pub fn validate(&self, document: &Value, report: &mut ValidationReport) {
        if let Err(errors) = self.compiled.validate(document) {
            for error in errors {
                report.add_error(ValidationError::new(
                    error.instance_path.to_string(),
                    ValidationErrorType::SchemaViolation,
                    error.to_string(),
                ));
            }
        }
    }
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator").finish_non_exhaustive()
    }
}

/// Local validation of transformed documents, with an optional JSON schema.
#[derive(Debug, Default)]
pub struct AnsValidator {
    schema: Option<SchemaValidator>,
}

impl AnsValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, schema: SchemaValidator) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn validate(&self, content_type: ContentType, document: &mut Value) -> ValidationReport {
        let parked = prepare_for_validation(content_type, document);
        let report = self.validate_prepared(content_type, document);
        restore_parked_fields(document, parked);
        report
    }

    /// Validate a document already passed through [`prepare_for_validation`].
    pub fn validate_prepared(&self, content_type: ContentType, document: &Value) -> ValidationReport {
        let definition = SchemaDefinition::for_content_type(content_type);
        let mut report = ValidationReport::new();

        for required_field in &definition.required_fields {
            if get_path(document, required_field).map_or(true, Value::is_null) {
                report.add_missing_required_field(required_field.clone());
            }
        }

        for (path, field_type) in &definition.field_types {
            if let Some(value) = get_path(document, path).filter(|v| !v.is_null()) {
                if !field_type.matches(value) {
                    report.add_error(ValidationError::new(
                        path.clone(),
                        ValidationErrorType::InvalidFieldType,
                        format!("expected {field_type:?}"),
                    ));
                }
            }
        }

        if let Some(expected) = &definition.version {
            if let Some(actual) = get_path(document, "version").and_then(Value::as_str) {
                if actual != expected.to_string() {
                    report.add_error(
                        ValidationError::new(
                            "version".to_string(),
                            ValidationErrorType::InvalidFieldValue,
                            format!("ANS version {actual} is not the pinned {expected}"),
                        )
                        .with_suggested_fix(format!("set version to {expected}")),
                    );
                }
            }
        }

        for deprecated_field in &definition.deprecated_fields {
            if get_path(document, deprecated_field).is_some() {
                report.add_deprecated_field(deprecated_field.clone());
                report.add_warning(ValidationWarning::new(
                    deprecated_field.clone(),
                    ValidationWarningType::DeprecatedField,
                    "field is ignored by the target organization".to_string(),
                ));
            }
        }

        if let Some(schema) = &self.schema {
            schema.validate(document, &mut report);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn story() -> Value {
        json!({
            "_id": "S1",
            "type": "story",
            "version": "0.10.9",
            "owner": {"id": "orgb"},
            "canonical_website": "site-b",
            "content_elements": []
        })
    }

    #[test]
    fn test_validation_report_creation() {
        let report = ValidationReport::new();
        assert!(report.is_valid);
        assert!(!report.has_errors());
        assert!(!report.has_warnings());
        assert_eq!(report.error_count(), 0);
    }

    #[test]
    fn test_valid_story() {
        let report = AnsValidator::new().validate(ContentType::Story, &mut story());
        assert!(report.is_valid, "{:?}", report.problems());
    }

    #[test]
    fn test_missing_required_fields_and_bad_types() {
        let mut doc = story();
        doc["owner"] = json!({});
        doc["content_elements"] = json!("not an array");

        let report = AnsValidator::new().validate(ContentType::Story, &mut doc);
        assert!(!report.is_valid);
        assert_eq!(report.missing_required_fields, vec!["owner.id".to_string()]);
        assert_eq!(report.errors[0].error_type, ValidationErrorType::InvalidFieldType);
        assert_eq!(report.error_count(), 2);
    }

    #[test]
    fn test_wrong_ans_version_is_an_error() {
        let mut doc = story();
        doc["version"] = json!("0.10.7");
        let report = AnsValidator::new().validate(ContentType::Story, &mut doc);
        assert!(report.has_errors());
        assert_eq!(report.errors[0].suggested_fix.as_deref(), Some("set version to 0.10.9"));
    }

    #[test]
    fn test_deprecated_taxonomy_fields_warn() {
        let mut doc = story();
        doc["taxonomy"] = json!({"sites": []});
        let report = AnsValidator::new().validate(ContentType::Story, &mut doc);
        assert!(report.is_valid);
        assert!(report.has_warnings());
        assert_eq!(report.deprecated_fields, vec!["taxonomy.sites".to_string()]);
    }

    #[test]
    fn test_image_fields_are_parked_and_restored() {
        let mut image = json!({
            "_id": "I1",
            "type": "image",
            "version": "0.10.9",
            "owner": {"id": "orgb"},
            "photographer": "Jane",
            "additional_properties": {}
        });
        let schema = SchemaValidator::from_value(&json!({
            "type": "object",
            "not": {"required": ["photographer"]}
        }))
        .unwrap();

        let report = AnsValidator::new().with_schema(schema).validate(ContentType::Image, &mut image);

        assert!(report.is_valid, "{:?}", report.problems());
        assert_eq!(image["photographer"], "Jane");
        assert!(image["additional_properties"].get("photographer").is_none());
    }

    #[test]
    fn test_schema_violations_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"type": "object", "properties": {{"name": {{"type": "integer"}}}}}}"#).unwrap();
        let schema = SchemaValidator::from_file(file.path()).unwrap();

        let mut lightbox = json!({"name": "Favorites"});
        let report = AnsValidator::new().with_schema(schema).validate(ContentType::Lightbox, &mut lightbox);
        assert!(!report.is_valid);
        assert_eq!(report.errors[0].error_type, ValidationErrorType::SchemaViolation);
        assert_eq!(report.errors[0].field_path, "/name");
    }

    #[test]
    fn test_target_violations_are_errors() {
        let mut report = ValidationReport::new();
        report.add_target_violations(vec![AnsViolation {
            path: ".distributor".to_string(),
            message: "should be string".to_string(),
        }]);
        assert!(!report.is_valid);
        assert!(report.rejected_by_target());
        assert_eq!(report.problems(), vec![".distributor: should be string".to_string()]);
    }

    #[test]
    fn test_schema_file_errors() {
        assert!(matches!(SchemaValidator::from_file("/nonexistent/schema.json"), Err(SchemaError::Io(_))));
    }
}
