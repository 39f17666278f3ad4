//! Data bag values
//!
//! Generated apps carry an open-ended key/value state ("data bag"). Instead of
//! poking at raw JSON at runtime, every entry is held as a small tagged union
//! so that lookups like "the first numeric field" are typed operations.
//!
//! Entries keep insertion (document) order. Key resolution depends on it.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Largest integer an f64 holds exactly
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Keys that may carry a list item's primary label, in priority order
const LABEL_KEYS: &[&str] = &["label", "text", "name", "title", "value"];

/// Keys that may carry a list item's completion flag
const CHECKED_KEYS: &[&str] = &["checked", "done", "completed", "isChecked"];

/// Type tag of a data bag entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Null,
    Boolean,
    Number,
    Text,
    List,
    Object,
}

impl DataKind {
    /// The value a freshly created entry of this kind starts with
    pub fn default_value(&self) -> DataValue {
        match self {
            DataKind::Null => DataValue::Null,
            DataKind::Boolean => DataValue::Bool(false),
            DataKind::Number => DataValue::Number(0.0),
            DataKind::Text => DataValue::Text(String::new()),
            DataKind::List => DataValue::List(Vec::new()),
            DataKind::Object => DataValue::Object(Map::new()),
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataKind::Null => "null",
            DataKind::Boolean => "boolean",
            DataKind::Number => "number",
            DataKind::Text => "text",
            DataKind::List => "list",
            DataKind::Object => "object",
        };
        f.write_str(name)
    }
}

/// One value in a data bag
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<ListItem>),
    Object(Map<String, Value>),
}

impl DataValue {
    /// Type tag of this value
    pub fn kind(&self) -> DataKind {
        match self {
            DataValue::Null => DataKind::Null,
            DataValue::Bool(_) => DataKind::Boolean,
            DataValue::Number(_) => DataKind::Number,
            DataValue::Text(_) => DataKind::Text,
            DataValue::List(_) => DataKind::List,
            DataValue::Object(_) => DataKind::Object,
        }
    }

    /// Numeric view of this value
    ///
    /// Text is parsed; anything that does not parse (and every non-text,
    /// non-number value) reads as 0.
    pub fn as_number_lossy(&self) -> f64 {
        match self {
            DataValue::Number(n) => *n,
            DataValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()).unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Boolean view of this value
    pub fn as_bool_lossy(&self) -> bool {
        match self {
            DataValue::Null => false,
            DataValue::Bool(b) => *b,
            DataValue::Number(n) => *n != 0.0 && !n.is_nan(),
            DataValue::Text(s) => !s.is_empty(),
            DataValue::List(items) => !items.is_empty(),
            DataValue::Object(_) => true,
        }
    }

    /// Text view of this value, for display
    pub fn display_text(&self) -> String {
        match self {
            DataValue::Null => String::new(),
            DataValue::Bool(b) => b.to_string(),
            DataValue::Number(n) => number_to_json(*n).to_string(),
            DataValue::Text(s) => s.clone(),
            DataValue::List(items) => items.len().to_string(),
            DataValue::Object(map) => Value::Object(map.clone()).to_string(),
        }
    }

    pub fn as_list(&self) -> Option<&Vec<ListItem>> {
        match self {
            DataValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<ListItem>> {
        match self {
            DataValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Convert back into plain JSON
    pub fn to_json(&self) -> Value {
        match self {
            DataValue::Null => Value::Null,
            DataValue::Bool(b) => Value::Bool(*b),
            DataValue::Number(n) => number_to_json(*n),
            DataValue::Text(s) => Value::String(s.clone()),
            DataValue::List(items) => Value::Array(items.iter().map(ListItem::to_json).collect()),
            DataValue::Object(map) => Value::Object(map.clone()),
        }
    }
}

impl From<Value> for DataValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => DataValue::Null,
            Value::Bool(b) => DataValue::Bool(b),
            Value::Number(n) => DataValue::Number(n.as_f64().unwrap_or(0.0)),
            Value::String(s) => DataValue::Text(s),
            Value::Array(items) => DataValue::List(items.into_iter().map(ListItem::from_value).collect()),
            Value::Object(map) => DataValue::Object(map),
        }
    }
}

impl From<f64> for DataValue {
    fn from(n: f64) -> Self {
        DataValue::Number(n)
    }
}

impl From<bool> for DataValue {
    fn from(b: bool) -> Self {
        DataValue::Bool(b)
    }
}

impl From<&str> for DataValue {
    fn from(s: &str) -> Self {
        DataValue::Text(s.to_string())
    }
}

impl Serialize for DataValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DataValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(DataValue::from)
    }
}

/// Integral values go out as JSON integers so that `8.0` stays `8`
fn number_to_json(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// An element of a list-valued data entry (checklist row, log line, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListItem {
    /// Stable identity used for edit/delete addressing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub label: String,
    pub checked: bool,
    /// Secondary fields (category, badge, amounts, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ListItem {
    /// Create an unchecked item with a fresh identifier
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: Some(new_item_id()),
            label: label.into(),
            checked: false,
            extra: Map::new(),
        }
    }

    /// Decode a list element from whatever shape the generator produced
    ///
    /// Bare scalars become the label. For objects the label is taken from
    /// the first of `label`, `text`, `name`, `title`, `value`.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(mut map) => {
                let id = map.remove("id").and_then(|v| match v {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                });
                let label = LABEL_KEYS
                    .iter()
                    .find_map(|k| match map.get(*k) {
                        Some(Value::String(_)) | Some(Value::Number(_)) => Some(*k),
                        _ => None,
                    })
                    .and_then(|k| map.remove(k))
                    .map(|v| match v {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .unwrap_or_default();
                let checked = CHECKED_KEYS
                    .iter()
                    .find(|k| map.contains_key(**k))
                    .and_then(|k| map.remove(*k))
                    .map(|v| DataValue::from(v).as_bool_lossy())
                    .unwrap_or(false);
                Self {
                    id,
                    label,
                    checked,
                    extra: map,
                }
            }
            Value::String(s) => Self {
                label: s,
                ..Self::default()
            },
            Value::Null => Self::default(),
            other => Self {
                label: other.to_string(),
                ..Self::default()
            },
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl<'de> Deserialize<'de> for ListItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(ListItem::from_value)
    }
}

/// Generate a fresh list item identifier
pub fn new_item_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Insertion-ordered key/value application state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataBag {
    entries: Vec<(String, DataValue)>,
}

impl DataBag {
    /// Create an empty data bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bag from decoded JSON
    ///
    /// Anything other than an object yields an empty bag.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => map.into_iter().map(|(k, v)| (k, DataValue::from(v))).collect(),
            Value::Null => Self::new(),
            other => {
                log::warn!("Data bag is not an object ({}), starting empty", kind_name(&other));
                Self::new()
            }
        }
    }

    /// Convert into a JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut DataValue> {
        self.entries.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace an entry
    ///
    /// Replacing keeps the entry's position; new keys are appended.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<DataValue>) -> Option<DataValue> {
        let key = key.into();
        let value = value.into();
        match self.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<DataValue> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// First key (in insertion order) whose value has the given kind
    pub fn first_key_of_kind(&self, kind: DataKind) -> Option<&str> {
        self.first_key_matching(kind, |_| true)
    }

    /// First key of the given kind that also passes `filter`
    pub fn first_key_matching(&self, kind: DataKind, filter: impl Fn(&str) -> bool) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, v)| v.kind() == kind && filter(k.as_str()))
            .map(|(k, _)| k.as_str())
    }

    /// Give every list item that lacks an identifier a fresh one
    ///
    /// Returns the number of identifiers assigned.
    pub fn assign_missing_item_ids(&mut self) -> usize {
        let mut assigned = 0;
        for (_, value) in self.entries.iter_mut() {
            if let DataValue::List(items) = value {
                for item in items.iter_mut().filter(|i| i.id.is_none()) {
                    item.id = Some(new_item_id());
                    assigned += 1;
                }
            }
        }
        assigned
    }
}

impl FromIterator<(String, DataValue)> for DataBag {
    fn from_iter<I: IntoIterator<Item = (String, DataValue)>>(iter: I) -> Self {
        let mut bag = DataBag::new();
        for (k, v) in iter {
            bag.insert(k, v);
        }
        bag
    }
}

impl Serialize for DataBag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DataBag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BagVisitor;

        impl<'de> Visitor<'de> for BagVisitor {
            type Value = DataBag;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object of data entries")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<DataBag, A::Error> {
                let mut bag = DataBag::new();
                while let Some((key, value)) = access.next_entry::<String, DataValue>()? {
                    bag.insert(key, value);
                }
                Ok(bag)
            }
        }

        deserializer.deserialize_map(BagVisitor)
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bag_preserves_document_order() {
        let bag: DataBag = serde_json::from_str(r#"{"zeta": 1, "alpha": true, "mid": []}"#).unwrap();
        let keys: Vec<&str> = bag.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(bag.first_key_of_kind(DataKind::Boolean), Some("alpha"));
    }

    #[test]
    fn test_integral_numbers_serialize_as_integers() {
        let mut bag = DataBag::new();
        bag.insert("count", 8.0);
        bag.insert("ratio", 0.5);
        assert_eq!(serde_json::to_string(&bag).unwrap(), r#"{"count":8,"ratio":0.5}"#);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut bag = DataBag::from_json(json!({"a": 1, "b": 2}));
        let old = bag.insert("a", 10.0);
        assert_eq!(old, Some(DataValue::Number(1.0)));
        let keys: Vec<&str> = bag.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(bag.get("a"), Some(&DataValue::Number(10.0)));
    }

    #[test]
    fn test_lossy_number_coercion() {
        assert_eq!(DataValue::Text("12.5".into()).as_number_lossy(), 12.5);
        assert_eq!(DataValue::Text("abc".into()).as_number_lossy(), 0.0);
        assert_eq!(DataValue::Bool(true).as_number_lossy(), 0.0);
        assert_eq!(DataValue::Null.as_number_lossy(), 0.0);
    }

    #[test]
    fn test_lossy_bool_coercion() {
        assert!(DataValue::Number(3.0).as_bool_lossy());
        assert!(!DataValue::Number(0.0).as_bool_lossy());
        assert!(!DataValue::Text(String::new()).as_bool_lossy());
        assert!(DataValue::Text("no".into()).as_bool_lossy());
        assert!(!DataValue::List(vec![]).as_bool_lossy());
    }

    #[test]
    fn test_list_item_from_scalar_and_aliases() {
        let item = ListItem::from_value(json!("Buy milk"));
        assert_eq!(item.label, "Buy milk");
        assert!(!item.checked);
        assert!(item.id.is_none());

        let item = ListItem::from_value(json!({"text": "Walk dog", "done": true, "id": 1700000000, "category": "chores"}));
        assert_eq!(item.label, "Walk dog");
        assert!(item.checked);
        assert_eq!(item.id.as_deref(), Some("1700000000"));
        assert_eq!(item.extra.get("category"), Some(&json!("chores")));
        assert!(!item.extra.contains_key("text"));
    }

    #[test]
    fn test_non_object_data_is_empty_bag() {
        assert!(DataBag::from_json(json!([1, 2, 3])).is_empty());
        assert!(DataBag::from_json(Value::Null).is_empty());
    }

    #[test]
    fn test_assign_missing_item_ids() {
        let mut bag = DataBag::from_json(json!({"items": ["a", {"label": "b", "id": "keep"}]}));
        assert_eq!(bag.assign_missing_item_ids(), 1);
        let items = bag.get("items").and_then(DataValue::as_list).unwrap();
        assert!(items[0].id.is_some());
        assert_eq!(items[1].id.as_deref(), Some("keep"));
        assert_eq!(bag.assign_missing_item_ids(), 0);
    }
}
