//! Core types for micro-apps
//!
//! These types describe a generated app: its blueprint (a tree of blocks),
//! its data bag, and the action invocations that rendered controls emit.

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BlueprintError, Result};
use crate::value::DataBag;

/// Canonical block type tags
///
/// The normalizer folds synonyms onto these; the registry's built-ins are
/// keyed by them.
pub mod tags {
    pub const STACK: &str = "Stack";
    pub const ROW: &str = "Row";
    pub const CARD: &str = "Card";
    pub const HEADER: &str = "Header";
    pub const TEXT: &str = "Text";
    pub const STAT: &str = "Stat";
    pub const BTN: &str = "Btn";
    pub const BTN_ROW: &str = "BtnRow";
    pub const TOGGLE: &str = "Toggle";
    pub const TIMER: &str = "Timer";
    pub const INPUT: &str = "Input";
    pub const CHECKLIST: &str = "Checklist";
    pub const DATA_LIST: &str = "DataList";
}

/// Coarse behavioral classification of an app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Archetype {
    /// Counters and running totals
    #[serde(alias = "accumulator", alias = "counter")]
    Accumulator,
    /// Timers and countdowns
    #[serde(alias = "regulator", alias = "timer")]
    Regulator,
    /// Lists of checkable items
    #[serde(alias = "checklist")]
    Checklist,
    /// Free-form drafting
    #[serde(alias = "drafter", alias = "freeform")]
    Drafter,
}

impl Archetype {
    /// Lenient parse used when reading generated output
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "accumulator" | "counter" => Some(Self::Accumulator),
            "regulator" | "timer" => Some(Self::Regulator),
            "checklist" | "list" => Some(Self::Checklist),
            "drafter" | "freeform" | "draft" => Some(Self::Drafter),
            _ => None,
        }
    }
}

/// One visual unit of a blueprint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Type tag selecting the rendering rule
    #[serde(rename = "type", default)]
    pub block_type: String,
    /// Nested blocks (container tags only)
    #[serde(
        default,
        deserialize_with = "lenient_children",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub children: Vec<Block>,
    /// Everything else: label, value, icon, key, action, payload, ...
    #[serde(flatten)]
    pub props: Map<String, Value>,
}

impl Block {
    /// Create a block with no properties
    pub fn new(block_type: impl Into<String>) -> Self {
        Self {
            block_type: block_type.into(),
            children: Vec::new(),
            props: Map::new(),
        }
    }

    /// Set a property
    pub fn with_prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    /// Append a child block
    pub fn with_child(mut self, child: Block) -> Self {
        self.children.push(child);
        self
    }

    pub fn prop(&self, name: &str) -> Option<&Value> {
        self.props.get(name)
    }

    /// A property as a string slice, if it is a non-empty string
    pub fn str_prop(&self, name: &str) -> Option<&str> {
        self.props
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn label(&self) -> Option<&str> {
        self.str_prop("label")
    }

    pub fn text(&self) -> Option<&str> {
        self.str_prop("text")
    }

    pub fn icon(&self) -> Option<&str> {
        self.str_prop("icon")
    }

    pub fn variant(&self) -> Option<&str> {
        self.str_prop("variant").or_else(|| self.str_prop("style"))
    }

    /// Name of the data bag entry this block displays or controls
    pub fn data_key(&self) -> Option<&str> {
        self.str_prop("key")
    }

    pub fn action(&self) -> Option<&str> {
        self.str_prop("action")
    }

    pub fn payload(&self) -> Option<&Map<String, Value>> {
        self.props.get("payload").and_then(Value::as_object)
    }

    /// Identifier of the text entry this block owns or reads
    pub fn input_id(&self) -> Option<&str> {
        self.str_prop("inputId").or_else(|| self.str_prop("id"))
    }

    /// Button descriptors of a button row
    pub fn actions(&self) -> Option<&Vec<Value>> {
        self.props.get("actions").and_then(Value::as_array)
    }

    /// Decode a blueprint from generated JSON
    ///
    /// Accepts a bare array of blocks, an object wrapping one under
    /// `blocks`/`children`/`components`, or a single block object.
    pub fn list_from_json(value: Value) -> Result<Vec<Block>> {
        match value {
            Value::Array(items) => Ok(items.into_iter().filter_map(block_from_value).collect()),
            Value::Object(mut map) => {
                for wrapper in ["blocks", "children", "components"] {
                    if !map.contains_key("type") {
                        if let Some(Value::Array(items)) = map.remove(wrapper) {
                            return Ok(items.into_iter().filter_map(block_from_value).collect());
                        }
                    }
                }
                if map.contains_key("type") {
                    Ok(block_from_value(Value::Object(map)).into_iter().collect())
                } else {
                    Err(BlueprintError::invalid("object has neither a block type nor a block list"))
                }
            }
            other => Err(BlueprintError::invalid(format!(
                "expected an array of blocks, got {}",
                other
            ))),
        }
    }

    /// Depth-first search for a block of the given tag
    pub fn contains_tag(&self, tag: &str) -> bool {
        self.block_type == tag || self.children.iter().any(|c| c.contains_tag(tag))
    }
}

/// Decode one child entry; bare strings become text blocks
fn block_from_value(value: Value) -> Option<Block> {
    match value {
        Value::Object(_) => match serde_json::from_value::<Block>(value) {
            Ok(block) => Some(block),
            Err(e) => {
                log::warn!("Dropping undecodable block: {}", e);
                None
            }
        },
        Value::String(s) => Some(Block::new(tags::TEXT).with_prop("text", s)),
        Value::Null => None,
        other => {
            log::warn!("Dropping non-object block entry: {}", other);
            None
        }
    }
}

fn lenient_children<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<Block>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items.into_iter().filter_map(block_from_value).collect(),
        Value::Null => Vec::new(),
        single @ Value::Object(_) => block_from_value(single).into_iter().collect(),
        _ => Vec::new(),
    })
}

/// A named, persisted micro-app
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    /// Opaque identifier, stable for the app's lifetime
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archetype: Option<Archetype>,
    #[serde(default)]
    pub blueprint: Vec<Block>,
    #[serde(default)]
    pub data: DataBag,
}

impl App {
    /// Create an app with a fresh identifier
    pub fn new(
        title: impl Into<String>,
        archetype: Option<Archetype>,
        blueprint: Vec<Block>,
        data: DataBag,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            archetype,
            blueprint,
            data,
        }
    }

    /// Whether the periodic tick should advance this app's timer
    ///
    /// Regulators always qualify. Apps without a classification qualify
    /// when their blueprint shows a timer.
    pub fn is_timer_bearing(&self) -> bool {
        match self.archetype {
            Some(Archetype::Regulator) => true,
            Some(_) => false,
            None => self.blueprint.iter().any(|b| b.contains_tag(tags::TIMER)),
        }
    }
}

/// A user-triggered request to mutate the data bag
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionInvocation {
    /// Operation name, e.g. "increment-count"
    #[serde(alias = "tool")]
    pub action: String,
    #[serde(default)]
    pub payload: ActionPayload,
}

impl ActionInvocation {
    pub fn new(action: impl Into<String>, payload: ActionPayload) -> Self {
        Self {
            action: action.into(),
            payload,
        }
    }
}

/// Payload field names, canonical name first
const KEY_NAMES: &[&str] = &["key", "target", "field", "dataKey"];
const AMOUNT_NAMES: &[&str] = &["amount", "by", "step", "delta"];
const VALUE_NAMES: &[&str] = &["value", "text", "label"];
const INDEX_NAMES: &[&str] = &["index"];
const ID_NAMES: &[&str] = &["id", "itemId"];
const INITIAL_NAMES: &[&str] = &["initialValue", "initial", "duration", "seconds"];

/// Operands of an action invocation
///
/// Field names follow what generators commonly emit. Decoding takes the
/// first non-null name of each field, so a payload carrying both a field
/// and one of its aliases keeps the canonical one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPayload {
    /// Requested target key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Increment operand (numeric strings accepted)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Value>,
    /// Literal value or input reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// List position
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<Value>,
    /// Stable list item identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Timer reset value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_value: Option<Value>,
    /// Anything else the generator attached
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<'de> Deserialize<'de> for ActionPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Object(map) => Ok(Self::from_map(&map)),
            Value::Null => Ok(Self::default()),
            other => Err(serde::de::Error::custom(format!(
                "expected a payload object, got {}",
                other
            ))),
        }
    }
}

/// First non-null value among `names`
fn first_named(map: &Map<String, Value>, names: &[&str]) -> Option<Value> {
    names
        .iter()
        .filter_map(|n| map.get(*n))
        .find(|v| !v.is_null())
        .cloned()
}

impl ActionPayload {
    /// Payload targeting a key
    pub fn for_key(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(Value::from(amount));
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(Value::from(index));
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(Value::String(id.into()));
        self
    }

    pub fn with_initial_value(mut self, initial: f64) -> Self {
        self.initial_value = Some(Value::from(initial));
        self
    }

    /// Decode a payload map attached to a block
    ///
    /// Recognized names (canonical or alias) are consumed; every other
    /// entry lands in `extra`.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let key = match first_named(map, KEY_NAMES) {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(other) => {
                log::warn!("Ignoring non-text payload key {}", other);
                None
            }
            None => None,
        };

        let recognized = [KEY_NAMES, AMOUNT_NAMES, VALUE_NAMES, INDEX_NAMES, ID_NAMES, INITIAL_NAMES];
        let extra = map
            .iter()
            .filter(|(k, _)| !recognized.iter().any(|names| names.contains(&k.as_str())))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Self {
            key,
            amount: first_named(map, AMOUNT_NAMES),
            value: first_named(map, VALUE_NAMES),
            index: first_named(map, INDEX_NAMES),
            id: first_named(map, ID_NAMES),
            initial_value: first_named(map, INITIAL_NAMES),
            extra,
        }
    }

    /// List position as an index, when it is a non-negative integer
    pub fn index(&self) -> Option<usize> {
        match self.index.as_ref()? {
            Value::Number(n) => n.as_u64().map(|i| i as usize),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Item identifier as a string
    pub fn item_id(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Requested key, ignoring blanks
    pub fn requested_key(&self) -> Option<&str> {
        self.key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}
