use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{Schema, ValidationError};

#[derive(Debug, Clone)]
pub enum Kind {
    String,
    Integer,
    Number,
    Boolean,
    Object(Schema),
    Array(Box<Field>),
}

impl Kind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Kind::String => value.is_string(),
            Kind::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            Kind::Number => value.is_number(),
            Kind::Boolean => value.is_boolean(),
            Kind::Object(_) => value.is_object(),
            Kind::Array(_) => value.is_array(),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Kind::String => "a string",
            Kind::Integer => "an integer",
            Kind::Number => "a number",
            Kind::Boolean => "a boolean",
            Kind::Object(_) => "an object",
            Kind::Array(_) => "an array",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Constraint {
    MinLength(usize),
    MaxLength(usize),
    Min(f64),
    Max(f64),
    MinItems(usize),
    MaxItems(usize),
    OneOf(Vec<Value>),
    Pattern(Regex),
    Email,
    Uuid,
}

impl Constraint {
    pub fn name(&self) -> &'static str {
        match self {
            Constraint::MinLength(_) => "min_length",
            Constraint::MaxLength(_) => "max_length",
            Constraint::Min(_) => "min",
            Constraint::Max(_) => "max",
            Constraint::MinItems(_) => "min_items",
            Constraint::MaxItems(_) => "max_items",
            Constraint::OneOf(_) => "enum",
            Constraint::Pattern(_) => "pattern",
            Constraint::Email => "email",
            Constraint::Uuid => "uuid",
        }
    }

    /// `None` when satisfied, or when the constraint does not apply to the
    /// value's type.
    fn violation(&self, path: &str, value: &Value) -> Option<String> {
        match (self, value) {
            (Constraint::MinLength(n), Value::String(s)) if s.chars().count() < *n => {
                Some(format!("{path} must be at least {n} characters"))
            }
            (Constraint::MaxLength(n), Value::String(s)) if s.chars().count() > *n => {
                Some(format!("{path} must be at most {n} characters"))
            }
            (Constraint::Min(min), Value::Number(num)) if num.as_f64().is_some_and(|v| v < *min) => {
                Some(format!("{path} must be at least {}", format_number(*min)))
            }
            (Constraint::Max(max), Value::Number(num)) if num.as_f64().is_some_and(|v| v > *max) => {
                Some(format!("{path} must be at most {}", format_number(*max)))
            }
            (Constraint::MinItems(n), Value::Array(items)) if items.len() < *n => {
                Some(format!("{path} must contain at least {n} items"))
            }
            (Constraint::MaxItems(n), Value::Array(items)) if items.len() > *n => {
                Some(format!("{path} must contain at most {n} items"))
            }
            (Constraint::OneOf(allowed), v) if !allowed.contains(v) => {
                let options = allowed
                    .iter()
                    .map(|a| match a {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                Some(format!("{path} must be one of: {options}"))
            }
            (Constraint::Pattern(re), Value::String(s)) if !re.is_match(s) => {
                Some(format!("{path} does not match pattern {}", re.as_str()))
            }
            (Constraint::Email, Value::String(s)) if !is_email(s) => {
                Some(format!("{path} must be a valid email address"))
            }
            (Constraint::Uuid, Value::String(s)) if uuid::Uuid::parse_str(s).is_err() => {
                Some(format!("{path} must be a valid UUID"))
            }
            _ => None,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("email regex should be valid")
});

fn is_email(s: &str) -> bool {
    EMAIL.is_match(s)
}

/// Description of one expected value: its kind, whether it must be present,
/// a default, and the constraints checked when it is present.
///
/// ```
/// use ginza::schema::Field;
///
/// let role = Field::string().one_of(["admin", "user", "guest"]).default("user");
/// let age = Field::integer().min(18).max(120);
/// ```
#[derive(Debug, Clone)]
pub struct Field {
    kind: Kind,
    required: bool,
    default: Option<Value>,
    constraints: Vec<Constraint>,
    description: Option<String>,
}

impl Field {
    fn of(kind: Kind) -> Self {
        Self {
            kind,
            required: false,
            default: None,
            constraints: Vec::new(),
            description: None,
        }
    }

    pub fn string() -> Self {
        Self::of(Kind::String)
    }

    pub fn integer() -> Self {
        Self::of(Kind::Integer)
    }

    pub fn number() -> Self {
        Self::of(Kind::Number)
    }

    pub fn boolean() -> Self {
        Self::of(Kind::Boolean)
    }

    pub fn object(schema: Schema) -> Self {
        Self::of(Kind::Object(schema))
    }

    pub fn array(element: Field) -> Self {
        Self::of(Kind::Array(Box::new(element)))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn min_length(self, n: usize) -> Self {
        self.constraint(Constraint::MinLength(n))
    }

    pub fn max_length(self, n: usize) -> Self {
        self.constraint(Constraint::MaxLength(n))
    }

    pub fn min(self, n: impl Into<f64>) -> Self {
        self.constraint(Constraint::Min(n.into()))
    }

    pub fn max(self, n: impl Into<f64>) -> Self {
        self.constraint(Constraint::Max(n.into()))
    }

    pub fn min_items(self, n: usize) -> Self {
        self.constraint(Constraint::MinItems(n))
    }

    pub fn max_items(self, n: usize) -> Self {
        self.constraint(Constraint::MaxItems(n))
    }

    pub fn one_of<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.constraint(Constraint::OneOf(values.into_iter().map(Into::into).collect()))
    }

    pub fn pattern(self, regex: Regex) -> Self {
        self.constraint(Constraint::Pattern(regex))
    }

    pub fn email(self) -> Self {
        self.constraint(Constraint::Email)
    }

    pub fn uuid(self) -> Self {
        self.constraint(Constraint::Uuid)
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Checks a present value. A kind mismatch is reported once and ends the
    /// checks for this field; otherwise every constraint is evaluated and
    /// nested objects and arrays are walked.
    pub(crate) fn check(&self, path: &str, value: &mut Value, errors: &mut Vec<ValidationError>) {
        if !self.kind.matches(value) {
            errors.push(ValidationError::new(
                path,
                "type",
                format!("{path} must be {}", self.kind.describe()),
            ));
            return;
        }

        for constraint in &self.constraints {
            if let Some(message) = constraint.violation(path, value) {
                errors.push(ValidationError::new(path, constraint.name(), message));
            }
        }

        match (&self.kind, value) {
            (Kind::Object(schema), Value::Object(map)) => schema.validate_object(map, path, errors),
            (Kind::Array(element), Value::Array(items)) => {
                for (i, item) in items.iter_mut().enumerate() {
                    element.check(&format!("{path}[{i}]"), item, errors);
                }
            }
            _ => {}
        }
    }

    /// Converts a string value to this field's scalar kind when it parses.
    pub(crate) fn coerce(&self, value: &mut Value) {
        let Value::String(raw) = value else {
            return;
        };
        let coerced = match self.kind {
            Kind::Integer => raw.parse::<i64>().ok().map(Value::from),
            Kind::Number => raw
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            Kind::Boolean => match raw.as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        };
        if let Some(coerced) = coerced {
            *value = coerced;
        }
    }
}
