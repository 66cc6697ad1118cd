//! Declarative input schemas for tools
//!
//! Schemas are plain data. They render to the JSON-Schema subset the function-calling
//! APIs accept and validate incoming arguments without runtime reflection.

use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl PropertyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::String => "string",
            PropertyKind::Integer => "integer",
            PropertyKind::Number => "number",
            PropertyKind::Boolean => "boolean",
            PropertyKind::Array => "array",
            PropertyKind::Object => "object",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            PropertyKind::String => value.is_string(),
            PropertyKind::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|n| n.fract() == 0.0)
            }
            PropertyKind::Number => value.is_number(),
            PropertyKind::Boolean => value.is_boolean(),
            PropertyKind::Array => value.is_array(),
            PropertyKind::Object => value.is_object(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertySchema {
    pub kind: PropertyKind,
    pub description: String,
    pub enum_values: Option<Vec<String>>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    /// Strings only: reject empty or whitespace-only values
    pub non_empty: bool,
    pub items: Option<Box<PropertySchema>>,
}

impl PropertySchema {
    fn of(kind: PropertyKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            enum_values: None,
            minimum: None,
            maximum: None,
            non_empty: false,
            items: None,
        }
    }

    pub fn string(description: impl Into<String>) -> Self {
        Self::of(PropertyKind::String, description)
    }

    pub fn integer(description: impl Into<String>) -> Self {
        Self::of(PropertyKind::Integer, description)
    }

    pub fn number(description: impl Into<String>) -> Self {
        Self::of(PropertyKind::Number, description)
    }

    pub fn boolean(description: impl Into<String>) -> Self {
        Self::of(PropertyKind::Boolean, description)
    }

    pub fn object(description: impl Into<String>) -> Self {
        Self::of(PropertyKind::Object, description)
    }

    pub fn array(description: impl Into<String>, items: PropertySchema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::of(PropertyKind::Array, description)
        }
    }

    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    pub fn non_empty(mut self) -> Self {
        self.non_empty = true;
        self
    }

    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".into(), json!(self.kind.as_str()));
        if !self.description.is_empty() {
            out.insert("description".into(), json!(self.description));
        }
        if let Some(values) = &self.enum_values {
            out.insert("enum".into(), json!(values));
        }
        if let Some(min) = self.minimum {
            out.insert("minimum".into(), number(min));
        }
        if let Some(max) = self.maximum {
            out.insert("maximum".into(), number(max));
        }
        if self.non_empty {
            out.insert("minLength".into(), json!(1));
        }
        if let Some(items) = &self.items {
            out.insert("items".into(), items.to_json());
        }
        Value::Object(out)
    }

    fn check(&self, path: &str, value: &Value) -> Result<(), SchemaViolation> {
        if !self.kind.matches(value) {
            return Err(SchemaViolation::new(
                path,
                format!("expected {}, got {}", self.kind.as_str(), type_name(value)),
            ));
        }
        if let (Some(allowed), Some(text)) = (&self.enum_values, value.as_str()) {
            if !allowed.iter().any(|candidate| candidate == text) {
                return Err(SchemaViolation::new(
                    path,
                    format!("must be one of {allowed:?}, got {text:?}"),
                ));
            }
        }
        if self.non_empty && value.as_str().is_some_and(|text| text.trim().is_empty()) {
            return Err(SchemaViolation::new(path, "must not be empty"));
        }
        if let Some(n) = value.as_f64() {
            if let Some(min) = self.minimum.filter(|min| n < *min) {
                return Err(SchemaViolation::new(path, format!("must be >= {min}")));
            }
            if let Some(max) = self.maximum.filter(|max| n > *max) {
                return Err(SchemaViolation::new(path, format!("must be <= {max}")));
            }
        }
        if let (Some(items), Some(elements)) = (&self.items, value.as_array()) {
            for (index, element) in elements.iter().enumerate() {
                items.check(&format!("{path}[{index}]"), element)?;
            }
        }
        Ok(())
    }
}

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A single schema violation, naming the offending property when there is one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub property: Option<String>,
    pub message: String,
}

impl SchemaViolation {
    fn new(property: &str, message: impl Into<String>) -> Self {
        Self {
            property: (!property.is_empty()).then(|| property.to_string()),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.property {
            Some(property) => write!(f, "'{property}' {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Object schema of a tool's input
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolSchema {
    pub properties: IndexMap<String, PropertySchema>,
    pub required: Vec<String>,
}

impl ToolSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &str, property: PropertySchema) -> Self {
        self.properties.insert(name.to_string(), property);
        self.required.push(name.to_string());
        self
    }

    pub fn optional(mut self, name: &str, property: PropertySchema) -> Self {
        self.properties.insert(name.to_string(), property);
        self
    }

    pub fn to_json(&self) -> Value {
        let properties: Map<String, Value> = self
            .properties
            .iter()
            .map(|(name, property)| (name.clone(), property.to_json()))
            .collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
            "additionalProperties": false,
        })
    }

    /// Structural check of `input`: object shape, required keys, types, enums,
    /// ranges, and no unknown keys. `null` optional values are accepted.
    pub fn validate(&self, input: &Value) -> Result<(), SchemaViolation> {
        let Some(object) = input.as_object() else {
            return Err(SchemaViolation::new(
                "",
                format!("arguments must be a JSON object, got {}", type_name(input)),
            ));
        };

        for name in &self.required {
            match object.get(name) {
                None | Some(Value::Null) => {
                    return Err(SchemaViolation::new(name, "is required"));
                }
                Some(_) => {}
            }
        }

        for (name, value) in object {
            let Some(property) = self.properties.get(name) else {
                return Err(SchemaViolation::new(name, "is not a recognised argument"));
            };
            if value.is_null() && !self.required.contains(name) {
                continue;
            }
            property.check(name, value)?;
        }
        Ok(())
    }

    /// One-line argument summary used in the textual tool catalog
    pub fn signature(&self) -> String {
        self.properties
            .iter()
            .map(|(name, property)| {
                let marker = if self.required.contains(name) {
                    ""
                } else {
                    "?"
                };
                format!("{name}{marker}: {}", property.kind.as_str())
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
