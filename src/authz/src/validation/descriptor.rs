//! Declarative field descriptors

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Value types a field may be declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Mixed,
    Array,
    Object,
}

impl FieldType {
    /// Parses a declared type name; matching is case-sensitive
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(FieldType::String),
            "number" => Some(FieldType::Number),
            "boolean" => Some(FieldType::Boolean),
            "date" => Some(FieldType::Date),
            "mixed" => Some(FieldType::Mixed),
            "array" => Some(FieldType::Array),
            "object" => Some(FieldType::Object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Mixed => "mixed",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }

    /// Whether `validator` applies to values of this type
    pub fn supports(&self, validator: &str) -> bool {
        match validator {
            "required" | "nullable" | "oneOf" => true,
            "min" | "max" => matches!(
                self,
                FieldType::String | FieldType::Number | FieldType::Date | FieldType::Array
            ),
            "length" => matches!(self, FieldType::String | FieldType::Array),
            "lessThan" | "moreThan" | "integer" | "positive" | "negative" => {
                *self == FieldType::Number
            }
            "allowEmpty" | "complexity" | "email" | "ipv4" | "ipv6" | "lowercase" | "matches"
            | "password" | "uppercase" | "url" => *self == FieldType::String,
            _ => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One allowed value of an enumerated field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub value: Value,
}

/// Declarative description of one input field
///
/// ```
/// use portal_authz::validation::FieldDescriptor;
///
/// let field: FieldDescriptor = serde_json::from_value(serde_json::json!({
///     "attribute": "username",
///     "type": "string",
///     "required": true,
///     "validations": { "min": 3, "matches": "/^[a-z.]+$/i" }
/// }))
/// .unwrap();
///
/// assert_eq!(field.validations.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Input property the field validates
    pub attribute: String,
    /// Declared type name; fields with an unknown type are skipped
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    /// The input holds a list of values of `field_type`
    #[serde(default)]
    pub multiple: bool,
    /// Enumerated allowed values
    #[serde(default)]
    pub values: Vec<FieldValue>,
    /// Validator name to argument, applied in declaration order
    #[serde(default)]
    pub validations: IndexMap<String, Value>,
}

impl FieldDescriptor {
    pub fn new(attribute: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            field_type: field_type.into(),
            required: false,
            multiple: false,
            values: Vec::new(),
            validations: IndexMap::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    pub fn with_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.values = values
            .into_iter()
            .map(|value| FieldValue {
                value: value.into(),
            })
            .collect();
        self
    }

    pub fn with_validation(mut self, name: impl Into<String>, arg: impl Into<Value>) -> Self {
        self.validations.insert(name.into(), arg.into());
        self
    }

    /// Stable text form of the descriptor, independent of object key order
    pub fn signature(&self) -> String {
        let values: Vec<String> = self.values.iter().map(|v| canonical_json(&v.value)).collect();
        let mut validations: Vec<String> = self
            .validations
            .iter()
            .map(|(name, arg)| format!("{}:{}", name, canonical_json(arg)))
            .collect();
        validations.sort();

        format!(
            "{}:{}:{}:{}:[{}]:{{{}}}",
            self.attribute,
            self.field_type,
            self.required,
            self.multiple,
            values.join(","),
            validations.join(";")
        )
    }
}

/// JSON text with object keys sorted at every level
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let body: Vec<String> = entries
                .into_iter()
                .map(|(key, value)| format!("{}:{}", Value::from(key.as_str()), canonical_json(value)))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}
