//! Ephemeral form state and input references
//!
//! A payload value may point at a text entry instead of carrying a literal
//! ("take whatever the user typed into `new-task`"). References are written
//! as the string `"$input:<id>"` or the object `{"$input": "<id>"}` and are
//! resolved against the form state supplied by the host UI.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// String prefix marking an input reference
pub const INPUT_REF_PREFIX: &str = "$input:";

/// Object key marking an input reference
pub const INPUT_REF_KEY: &str = "$input";

/// Currently typed text, keyed by input id
///
/// Owned by the UI layer; the engine only reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormState {
    entries: HashMap<String, String>,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the text currently typed into an input
    pub fn set(&mut self, input_id: impl Into<String>, text: impl Into<String>) {
        self.entries.insert(input_id.into(), text.into());
    }

    pub fn get(&self, input_id: &str) -> Option<&str> {
        self.entries.get(input_id).map(String::as_str)
    }

    /// Forget an input's text (typically after a successful submit)
    pub fn clear(&mut self, input_id: &str) -> Option<String> {
        self.entries.remove(input_id)
    }

    /// The input's text, trimmed, if it holds anything besides whitespace
    pub fn filled(&self, input_id: &str) -> Option<&str> {
        self.get(input_id).map(str::trim).filter(|s| !s.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormState {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut state = FormState::new();
        for (k, v) in iter {
            state.set(k, v);
        }
        state
    }
}

/// Outcome of resolving a payload value
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// A usable value (a literal, or the referenced input's text)
    Value(Value),
    /// The referenced input is unset or blank
    Unresolved { input_id: String },
}

/// Build a reference to an input
pub fn input_ref(input_id: &str) -> Value {
    Value::String(format!("{}{}", INPUT_REF_PREFIX, input_id))
}

/// The input id a value refers to, if it is a reference
pub fn input_reference(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => s.strip_prefix(INPUT_REF_PREFIX).map(str::trim),
        Value::Object(map) if map.len() == 1 => map.get(INPUT_REF_KEY).and_then(Value::as_str),
        _ => None,
    }
}

/// Resolve a payload value against the form state
pub fn resolve(value: &Value, forms: &FormState) -> Resolved {
    match input_reference(value) {
        Some(input_id) => match forms.filled(input_id) {
            Some(text) => Resolved::Value(Value::String(text.to_string())),
            None => Resolved::Unresolved {
                input_id: input_id.to_string(),
            },
        },
        None => Resolved::Value(value.clone()),
    }
}
