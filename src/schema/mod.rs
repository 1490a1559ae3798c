//! Declarative schemas for request bodies and query strings.
//!
//! A [`Schema`] is an ordered list of named [`Field`]s. Validation walks a
//! decoded `serde_json::Value`, fills in declared defaults and reports every
//! violated constraint instead of stopping at the first one.
//!
//! ```
//! use ginza::schema::{Field, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::new()
//!     .field("name", Field::string().required().min_length(2))
//!     .field("role", Field::string().one_of(["admin", "user"]).default("user"));
//!
//! let mut value = json!({ "name": "A" });
//! let errors = schema.validate(&mut value);
//! assert_eq!(errors[0].message, "name must be at least 2 characters");
//! assert_eq!(value["role"], "user");
//! ```

mod field;

pub use field::{Constraint, Field, Kind};
pub use regex::Regex;

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

/// One failed check. Serialized as `{"field", "message"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    pub field: String,
    #[serde(skip)]
    pub constraint: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(
        field: impl Into<String>,
        constraint: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            constraint: constraint.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<(String, Field)>,
    description: Option<String>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field. Fields are validated in the order they are added; a
    /// repeated name replaces the earlier definition in place.
    pub fn field(mut self, name: &str, field: Field) -> Self {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = field,
            None => self.fields.push((name.to_string(), field)),
        }
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    /// Validates `value` in place, inserting defaults for absent optional
    /// fields. Returns every violation found; empty means valid.
    ///
    /// A value that is not an object fails with a single `type` error.
    pub fn validate(&self, value: &mut Value) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        match value {
            Value::Object(map) => self.validate_object(map, "", &mut errors),
            _ => errors.push(ValidationError::new("", "type", "body must be an object")),
        }
        errors
    }

    pub(crate) fn validate_object(
        &self,
        map: &mut Map<String, Value>,
        prefix: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        for (name, field) in &self.fields {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}.{name}")
            };

            let absent = map.get(name).map_or(true, Value::is_null);
            if absent {
                if field.is_required() {
                    errors.push(ValidationError::new(
                        &path,
                        "required",
                        format!("{path} is required"),
                    ));
                } else if let Some(default) = field.default_value() {
                    map.insert(name.clone(), default.clone());
                }
                continue;
            }

            if let Some(present) = map.get_mut(name) {
                field.check(&path, present, errors);
            }
        }
    }

    /// Builds an object from query parameters, converting values of scalar
    /// fields to their declared kind. Unknown parameters pass through as
    /// strings.
    pub fn coerce(&self, query: &HashMap<String, String>) -> Value {
        let map = query
            .iter()
            .map(|(k, v)| {
                let mut value = Value::String(v.clone());
                if let Some(field) = self.get(k) {
                    field.coerce(&mut value);
                }
                (k.clone(), value)
            })
            .collect();
        Value::Object(map)
    }
}
