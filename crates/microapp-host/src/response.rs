//! Generator response decoding
//!
//! Turns the text a generator returned into a blueprint, a data bag and
//! some metadata. The generator is unreliable, so decoding is lenient:
//!
//! - text around the JSON object (prose, code fences) is cut away by
//!   slicing from the first `{` to the last `}`;
//! - the blueprint and data may arrive under several names, and either may
//!   be a JSON document encoded as a string;
//! - a response with no usable blueprint is reported as
//!   [`HostError::MalformedResponse`] with a message fit for the user.

use blueprint_engine::{Archetype, Block, DataBag};
use serde_json::{Map, Value};

use crate::constants::defaults;
use crate::error::{HostError, Result};

const TITLE_KEYS: &[&str] = &["title", "name", "appName"];
const ARCHETYPE_KEYS: &[&str] = &["archetype", "appType", "kind"];
const BLUEPRINT_KEYS: &[&str] = &["blueprint", "ui", "components", "layout"];
const DATA_KEYS: &[&str] = &["data", "state", "initialData"];

/// A decoded generator response
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedApp {
    pub title: String,
    pub archetype: Option<Archetype>,
    /// Blueprint as generated (not yet normalized)
    pub blueprint: Vec<Block>,
    pub data: DataBag,
}

/// Decode a raw generator response
pub fn decode_response(raw: &str) -> Result<GeneratedApp> {
    let root = match parse_document(raw)? {
        Value::Object(map) => map,
        other => {
            return Err(HostError::malformed(format!(
                "The generated app was not a JSON object (got {}). Try rephrasing the request.",
                json_type_name(&other)
            )))
        }
    };

    let title = first_string(&root, TITLE_KEYS)
        .unwrap_or(defaults::APP_TITLE)
        .to_string();
    let archetype = first_string(&root, ARCHETYPE_KEYS).and_then(Archetype::parse);

    let Some(blueprint) = first_present(&root, BLUEPRINT_KEYS) else {
        return Err(HostError::malformed(
            "The generated app did not include a user interface. Try asking again.",
        ));
    };
    let blueprint = Block::list_from_json(unstring(blueprint.clone())).map_err(|e| {
        HostError::malformed(format!("The generated user interface could not be read: {}", e))
    })?;

    let data = match first_present(&root, DATA_KEYS) {
        Some(value) => DataBag::from_json(unstring(value.clone())),
        None => DataBag::new(),
    };

    log::debug!(
        "Decoded response '{}' with {} blocks and {} data entries",
        title,
        blueprint.len(),
        data.len()
    );
    Ok(GeneratedApp {
        title,
        archetype,
        blueprint,
        data,
    })
}

/// Parse the response text, recovering from surrounding noise
fn parse_document(raw: &str) -> Result<Value> {
    let trimmed = raw.trim();
    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(strict_err) => {
            let Some(slice) = brace_slice(trimmed) else {
                return Err(HostError::malformed(format!(
                    "The generator's reply did not contain a JSON object ({}).",
                    strict_err
                )));
            };
            log::debug!("Strict parse failed ({}), retrying on brace slice", strict_err);
            serde_json::from_str::<Value>(slice).map_err(|e| {
                HostError::malformed(format!("The generator's reply was not valid JSON ({}).", e))
            })?
        }
    };
    // a whole response encoded as a JSON string
    Ok(unstring(value))
}

/// Text from the first `{` to the last `}`, inclusive
fn brace_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Decode a string that holds a JSON object or array; other values pass through
fn unstring(value: Value) -> Value {
    let Value::String(text) = &value else {
        return value;
    };
    let inner = text.trim();
    if !(inner.starts_with('{') || inner.starts_with('[')) {
        return value;
    }
    match serde_json::from_str::<Value>(inner) {
        Ok(decoded) => decoded,
        Err(e) => {
            log::warn!("Embedded JSON string did not parse: {}", e);
            value
        }
    }
}

fn first_present<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .find(|v| !v.is_null())
}

fn first_string<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| map.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "text",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
