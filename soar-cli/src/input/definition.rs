use std::collections::HashMap;

use serde_json::{Map, Value};

use super::InputError;

/// How a raw input string is coerced into JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    String,
    /// `a,b,c` becomes `["a","b","c"]`.
    StringArray,
    /// The literal `null` becomes JSON null.
    NullableString,
    Integer,
    Boolean,
}

/// Fields a payload must carry. Every field is required.
pub type Definition = &'static [(&'static str, Kind)];

/// Coerces `parsed` into a JSON object holding exactly the defined fields.
pub fn marshal(def: Definition, parsed: &HashMap<String, String>) -> Result<Vec<u8>, InputError> {
    let mut body = Map::with_capacity(def.len());

    for &(field, kind) in def {
        let raw = parsed
            .get(field)
            .ok_or_else(|| InputError::MissingField(field.to_string()))?;
        body.insert(field.to_string(), coerce(kind, raw)?);
    }

    serde_json::to_vec(&Value::Object(body)).map_err(|e| InputError::InvalidJson(e.to_string()))
}

/// Checks a JSON payload against `def`: it must be an object holding every
/// defined field. The payload is forwarded unchanged.
pub fn from_json(def: Definition, raw: &[u8]) -> Result<Vec<u8>, InputError> {
    let value: Value =
        serde_json::from_slice(raw).map_err(|e| InputError::InvalidJson(e.to_string()))?;
    let Some(object) = value.as_object() else {
        return Err(InputError::InvalidJson("expected a json object".into()));
    };

    if let Some(&(field, _)) = def.iter().find(|(field, _)| !object.contains_key(*field)) {
        return Err(InputError::MissingField(field.to_string()));
    }

    Ok(raw.to_vec())
}

fn coerce(kind: Kind, raw: &str) -> Result<Value, InputError> {
    let value = match kind {
        Kind::String => Value::String(raw.to_string()),
        Kind::StringArray => Value::Array(
            raw.split(',')
                .map(|part| Value::String(part.to_string()))
                .collect(),
        ),
        Kind::NullableString if raw == "null" => Value::Null,
        Kind::NullableString => Value::String(raw.to_string()),
        Kind::Integer => raw
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| InputError::InvalidInteger(raw.to_string()))?,
        Kind::Boolean => raw
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|_| InputError::InvalidBoolean(raw.to_string()))?,
    };

    Ok(value)
}
