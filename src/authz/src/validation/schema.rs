//! Compiled schemas and their memoization

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use dashmap::DashMap;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::descriptor::{FieldDescriptor, FieldType};
use super::rules::{cast, compile_step, is_known_validator, Rule, Step};
use crate::error::Result;

/// Path reported for failures of the input as a whole
pub const ROOT_PATH: &str = "this";

/// Failed checks, first message per input path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Error)]
#[error("{} field(s) failed validation", .0.len())]
#[serde(transparent)]
pub struct ValidationErrors(IndexMap<String, String>);

impl ValidationErrors {
    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(path, message)| (path.as_str(), message.as_str()))
    }

    fn add(&mut self, path: &str, message: String) {
        self.0.entry(path.to_string()).or_insert(message);
    }
}

impl IntoResponse for ValidationErrors {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(json!({ "errors": self }))).into_response()
    }
}

/// Compiled checks of one field
#[derive(Debug, Clone)]
struct FieldSchema {
    attribute: String,
    field_type: FieldType,
    /// The field itself must be present
    required: bool,
    /// Each list element must be present (same as `required` for single values)
    item_required: bool,
    nullable: bool,
    allow_empty: bool,
    multiple: bool,
    one_of: Vec<Value>,
    rules: Vec<Rule>,
}

impl FieldSchema {
    /// `Ok(None)` when the declared type is unknown
    fn compile(descriptor: &FieldDescriptor) -> Result<Option<Self>> {
        let Some(field_type) = FieldType::parse(&descriptor.field_type) else {
            debug!(
                attribute = %descriptor.attribute,
                field_type = %descriptor.field_type,
                "Skipping field with unknown type"
            );
            return Ok(None);
        };

        let mut schema = Self {
            attribute: descriptor.attribute.clone(),
            field_type,
            required: descriptor.required,
            item_required: false,
            nullable: false,
            allow_empty: false,
            multiple: descriptor.multiple,
            one_of: Vec::new(),
            rules: Vec::new(),
        };

        for (name, arg) in &descriptor.validations {
            if !is_known_validator(name) || !field_type.supports(name) {
                debug!(attribute = %descriptor.attribute, validator = %name, "Ignoring validator");
                continue;
            }
            match compile_step(&descriptor.attribute, field_type, name, arg)? {
                Some(Step::Required) => schema.item_required = true,
                Some(Step::Nullable) => schema.nullable = true,
                Some(Step::AllowEmpty) => schema.allow_empty = true,
                Some(Step::OneOf(values)) => schema.one_of.extend(values),
                Some(Step::Check(rule)) => schema.rules.push(rule),
                None => {}
            }
        }

        schema
            .one_of
            .extend(descriptor.values.iter().map(|v| v.value.clone()));

        if !schema.multiple {
            schema.required |= schema.item_required;
        }

        Ok(Some(schema))
    }

    fn validate_into(&self, value: Option<&Value>, errors: &mut ValidationErrors) {
        let path = self.attribute.as_str();
        if !self.multiple {
            self.validate_item(value, path, self.required, errors);
            return;
        }

        match value {
            None => {
                if self.required {
                    errors.add(path, format!("{} is a required field", path));
                }
            }
            Some(Value::Null) if self.required => {
                errors.add(path, format!("{} is a required field", path));
            }
            Some(Value::Null) => errors.add(path, format!("{} cannot be null", path)),
            Some(Value::Array(items)) => {
                for (index, item) in items.iter().enumerate() {
                    let item_path = format!("{}[{}]", path, index);
                    self.validate_item(Some(item), &item_path, self.item_required, errors);
                }
            }
            Some(_) => errors.add(path, format!("{} must be a `array` type", path)),
        }
    }

    fn validate_item(
        &self,
        value: Option<&Value>,
        path: &str,
        required: bool,
        errors: &mut ValidationErrors,
    ) {
        let value = match value {
            Some(Value::String(text)) if self.allow_empty && text.is_empty() => None,
            other => other,
        };

        let Some(value) = value else {
            if required {
                errors.add(path, format!("{} is a required field", path));
            }
            return;
        };

        if value.is_null() {
            if required {
                errors.add(path, format!("{} is a required field", path));
            } else if !self.nullable {
                errors.add(path, format!("{} cannot be null", path));
            }
            return;
        }

        let Some(typed) = cast(self.field_type, value) else {
            errors.add(path, format!("{} must be a `{}` type", path, self.field_type));
            return;
        };

        if required && typed.is_empty_text() {
            errors.add(path, format!("{} is a required field", path));
            return;
        }

        for rule in &self.rules {
            if let Some(message) = rule.check(&typed, path) {
                errors.add(path, message);
            }
        }

        if !self.one_of.is_empty() && !self.one_of.iter().any(|allowed| typed.equals(allowed)) {
            let allowed: Vec<String> = self
                .one_of
                .iter()
                .map(|allowed| match allowed {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect();
            errors.add(
                path,
                format!(
                    "{} must be one of the following values: {}",
                    path,
                    allowed.join(", ")
                ),
            );
        }
    }
}

/// Validator for an input object, compiled from field descriptors
///
/// # Examples
///
/// ```
/// use portal_authz::validation::{FieldDescriptor, Schema};
/// use serde_json::json;
///
/// let schema = Schema::compile(&[
///     FieldDescriptor::new("mail", "string").required().with_validation("email", true),
///     FieldDescriptor::new("shell", "string").with_values(["/bin/bash", "/bin/zsh"]),
/// ])
/// .unwrap();
///
/// assert!(schema.validate(&json!({ "mail": "jdoe@example.com" })).is_ok());
///
/// let errors = schema.validate(&json!({ "shell": "/bin/sh" })).unwrap_err();
/// assert_eq!(errors.get("mail"), Some("mail is a required field"));
/// assert!(errors.get("shell").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<FieldSchema>,
}

impl Schema {
    /// Compiles `descriptors` in order
    ///
    /// A later descriptor for the same attribute replaces the earlier one.
    /// Fields of unknown type are dropped.
    ///
    /// # Errors
    ///
    /// [`AuthzError::InvalidSchema`](crate::AuthzError::InvalidSchema) when a
    /// known validator has an unusable argument.
    pub fn compile(descriptors: &[FieldDescriptor]) -> Result<Self> {
        let mut fields: IndexMap<String, Option<FieldSchema>> = IndexMap::new();
        for descriptor in descriptors {
            fields.insert(descriptor.attribute.clone(), FieldSchema::compile(descriptor)?);
        }

        Ok(Self {
            fields: fields.into_values().flatten().collect(),
        })
    }

    /// Validated attributes, in declaration order
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.attribute.as_str())
    }

    /// Checks every field of `input`, collecting all failures
    pub fn validate(&self, input: &Value) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        match input {
            Value::Object(object) => {
                for field in &self.fields {
                    field.validate_into(object.get(&field.attribute), &mut errors);
                }
            }
            Value::Null => errors.add(ROOT_PATH, format!("{} is a required field", ROOT_PATH)),
            _ => errors.add(ROOT_PATH, format!("{} must be a `object` type", ROOT_PATH)),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Compiled schemas keyed by the signature of their descriptors
///
/// Descriptor order does not affect the key. Entries are never evicted.
#[derive(Debug, Default)]
pub struct SchemaCache {
    schemas: DashMap<String, Arc<Schema>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached schema for `descriptors`, compiled on first use
    pub fn get_or_compile(&self, descriptors: &[FieldDescriptor]) -> Result<Arc<Schema>> {
        let key = signature(descriptors);
        if let Some(schema) = self.schemas.get(&key) {
            return Ok(Arc::clone(schema.value()));
        }

        let schema = Arc::new(Schema::compile(descriptors)?);
        debug!(fields = descriptors.len(), "Compiled validation schema");
        self.schemas.insert(key, Arc::clone(&schema));
        Ok(schema)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Order-independent key of a descriptor list
pub fn signature(descriptors: &[FieldDescriptor]) -> String {
    let mut parts: Vec<String> = descriptors.iter().map(FieldDescriptor::signature).collect();
    parts.sort();
    parts.join("_")
}
