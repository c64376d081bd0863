//! Response envelope normalization.
//!
//! Panel resources arrive wrapped as `{object, attributes}` or, for lists,
//! `{object, data: [{object, attributes}]}`. These helpers either strip that
//! wrapping or re-serialize the envelope as received, honoring the
//! indentation setting either way.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::OutputPolicy;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("failed to parse response: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("failed to render response: {0}")]
    Render(#[source] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct Item {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    object: Option<String>,
    attributes: Value,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Collection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    object: Option<String>,
    data: Vec<Item>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DataObject {
    data: Value,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

/// Normalizes a single resource envelope.
pub fn normalize_item(buf: &[u8], policy: &OutputPolicy) -> Result<Vec<u8>, NormalizeError> {
    let item: Item = serde_json::from_slice(buf).map_err(NormalizeError::Parse)?;

    if policy.unwrap_attributes {
        render(&item.attributes, policy)
    } else {
        render(&item, policy)
    }
}

/// Normalizes a collection envelope. Unwrapped output keeps wire order.
pub fn normalize_collection(buf: &[u8], policy: &OutputPolicy) -> Result<Vec<u8>, NormalizeError> {
    let list: Collection = serde_json::from_slice(buf).map_err(NormalizeError::Parse)?;

    if policy.unwrap_attributes {
        let inner: Vec<&Value> = list.data.iter().map(|item| &item.attributes).collect();
        render(&inner, policy)
    } else {
        render(&list, policy)
    }
}

/// Normalizes a `{data: {...}}` payload, as returned by the websocket and
/// two-factor endpoints.
pub fn normalize_data(buf: &[u8], policy: &OutputPolicy) -> Result<Vec<u8>, NormalizeError> {
    let object: DataObject = serde_json::from_slice(buf).map_err(NormalizeError::Parse)?;

    if policy.unwrap_attributes {
        render(&object.data, policy)
    } else {
        render(&object, policy)
    }
}

/// Re-serializes arbitrary JSON with the configured indentation.
pub fn reformat(buf: &[u8], policy: &OutputPolicy) -> Result<Vec<u8>, NormalizeError> {
    let value: Value = serde_json::from_slice(buf).map_err(NormalizeError::Parse)?;
    render(&value, policy)
}

fn render<T: Serialize + ?Sized>(value: &T, policy: &OutputPolicy) -> Result<Vec<u8>, NormalizeError> {
    let out = if policy.pretty_print {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    };
    out.map_err(NormalizeError::Render)
}
