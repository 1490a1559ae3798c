//! Request body and query binding.
//!
//! Everything goes through `serde_json::Value` first: the body is decoded
//! according to its declared content type, optionally validated against a
//! [`Schema`] (which may fill in defaults), and only then deserialized into
//! the caller's type.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::http::request::parse_query;
use crate::http::Body;
use crate::schema::Schema;

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Decodes a body into a JSON value. Form bodies become an object of string
/// values; anything else is parsed as JSON.
pub fn decode(body: &Body) -> Result<Value> {
    if body.is_empty() {
        return Err(Error::Decode("request body is empty".to_string()));
    }

    if body.media_type() == FORM_URLENCODED {
        let text = std::str::from_utf8(body.as_bytes())
            .map_err(|e| Error::Decode(format!("form body is not UTF-8: {e}")))?;
        return Ok(strings_to_object(&parse_query(text)));
    }

    serde_json::from_slice(body.as_bytes()).map_err(|e| Error::Decode(e.to_string()))
}

pub fn bind<T: DeserializeOwned>(body: &Body) -> Result<T> {
    from_value(decode(body)?)
}

/// Decodes, validates with defaults applied, then deserializes.
pub fn bind_and_validate<T: DeserializeOwned>(body: &Body, schema: &Schema) -> Result<T> {
    let mut value = decode(body)?;
    validated(&mut value, schema)?;
    from_value(value)
}

/// Deserializes query parameters. Values are strings, so target fields
/// should be strings unless a schema is used to coerce them.
pub fn bind_query<T: DeserializeOwned>(query: &HashMap<String, String>) -> Result<T> {
    from_value(strings_to_object(query))
}

/// Coerces query values to the kinds the schema declares, validates, then
/// deserializes.
pub fn bind_query_and_validate<T: DeserializeOwned>(
    query: &HashMap<String, String>,
    schema: &Schema,
) -> Result<T> {
    let mut value = schema.coerce(query);
    validated(&mut value, schema)?;
    from_value(value)
}

fn validated(value: &mut Value, schema: &Schema) -> Result<()> {
    let errors = schema.validate(value);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors))
    }
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::Decode(e.to_string()))
}

fn strings_to_object(pairs: &HashMap<String, String>) -> Value {
    let map: Map<String, Value> = pairs
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    Value::Object(map)
}
