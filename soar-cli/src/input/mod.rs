//! Shorthand payload input: `key=value key2="quoted value"`.
//!
//! [`parse`] turns the text into a flat string map and
//! [`definition::marshal`] coerces that map into a typed JSON body.

pub mod definition;

use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

pub use definition::{from_json, marshal, Definition, Kind};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("missing '=' for key \"{0}\"")]
    MissingKey(String),
    #[error("missing value for key \"{0}\"")]
    MissingValue(String),
    #[error("missing key in input for definition: \"{0}\"")]
    MissingField(String),
    #[error("invalid integer \"{0}\"")]
    InvalidInteger(String),
    #[error("invalid boolean \"{0}\"")]
    InvalidBoolean(String),
    #[error("invalid json input: {0}")]
    InvalidJson(String),
}

/// Scans whitespace separated `key=value` pairs. A repeated key keeps the
/// last value.
pub fn parse(input: &str) -> Result<HashMap<String, String>, InputError> {
    let mut pairs = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        skip_spaces(&mut chars);
        if chars.peek().is_none() {
            break;
        }

        let key = read_key(&mut chars)?;

        skip_spaces(&mut chars);
        if chars.peek().is_none() {
            return Err(InputError::MissingValue(key));
        }

        let value = read_value(&mut chars);
        pairs.insert(key, value);
    }

    Ok(pairs)
}

fn skip_spaces(chars: &mut Peekable<Chars<'_>>) {
    while chars.next_if_eq(&' ').is_some() {}
}

fn read_key(chars: &mut Peekable<Chars<'_>>) -> Result<String, InputError> {
    let mut key = String::new();
    for c in chars.by_ref() {
        if c == '=' {
            return Ok(key);
        }
        key.push(c);
    }

    Err(InputError::MissingKey(key))
}

fn read_value(chars: &mut Peekable<Chars<'_>>) -> String {
    let quoted = chars.next_if_eq(&'"').is_some();
    let mut value = String::new();

    for c in chars.by_ref() {
        if (quoted && c == '"') || (!quoted && c == ' ') {
            break;
        }
        value.push(c);
    }

    value
}
