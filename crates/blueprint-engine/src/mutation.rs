//! Data mutation engine
//!
//! Applies one named operation to a data bag and returns the next bag,
//! without another round trip to the generator. Each call is
//! `(action, payload, data) -> data'`; the engine keeps no state between
//! calls and never edits the caller's bag in place.
//!
//! # Outcomes
//!
//! - `Applied`: the operation's effect is in the returned bag.
//! - `NoOp`: nothing to do (timer already running, stale list index, ...).
//!   Key healing still happened, so a requested key exists afterwards.
//! - `Abandoned`: a referenced input was empty. The returned bag is
//!   identical to the input.
//!
//! The only error is an operation name outside the catalogue.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BlueprintError, Result};
use crate::events::{emit, EngineEvent, EventSink, HealStrategy, NullEventSink};
use crate::forms::{input_reference, resolve, FormState, Resolved};
use crate::heal::{resolve_key, FieldQuery, HealingPolicy, ResolvedKey};
use crate::tick::{TimerFields, TIME_KEYS};
use crate::types::{ActionInvocation, ActionPayload};
use crate::value::{new_item_id, DataBag, DataKind, DataValue, ListItem};

/// Label used when an added item carries no value
pub const DEFAULT_PLACEHOLDER_LABEL: &str = "New item";

/// Payload fields copied onto newly added list items
const ITEM_SECONDARY_FIELDS: &[&str] = &["category", "badge", "description"];

/// The closed set of local operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    IncrementCount,
    SetValue,
    ToggleState,
    StartTimer,
    StopTimer,
    ResetTimer,
    AddListItem,
    ToggleListItem,
    DeleteListItem,
    EditListItem,
}

impl Operation {
    pub const ALL: [Operation; 10] = [
        Operation::IncrementCount,
        Operation::SetValue,
        Operation::ToggleState,
        Operation::StartTimer,
        Operation::StopTimer,
        Operation::ResetTimer,
        Operation::AddListItem,
        Operation::ToggleListItem,
        Operation::DeleteListItem,
        Operation::EditListItem,
    ];

    /// Canonical kebab-case name
    pub fn name(&self) -> &'static str {
        match self {
            Operation::IncrementCount => "increment-count",
            Operation::SetValue => "set-value",
            Operation::ToggleState => "toggle-state",
            Operation::StartTimer => "start-timer",
            Operation::StopTimer => "stop-timer",
            Operation::ResetTimer => "reset-timer",
            Operation::AddListItem => "add-list-item",
            Operation::ToggleListItem => "toggle-list-item",
            Operation::DeleteListItem => "delete-list-item",
            Operation::EditListItem => "edit-list-item",
        }
    }

    /// Parse an operation name in kebab, snake or camel case
    pub fn parse(name: &str) -> Result<Self> {
        let folded = fold_name(name);
        Self::ALL
            .iter()
            .copied()
            .find(|op| fold_name(op.name()) == folded)
            .ok_or_else(|| BlueprintError::UnknownOperation(name.to_string()))
    }
}

impl FromStr for Operation {
    type Err = BlueprintError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn fold_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// What an application of an operation did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationOutcome {
    /// The effect is in the returned bag
    Applied,
    /// Nothing to do
    NoOp { reason: String },
    /// A referenced input was empty; the bag is unchanged
    Abandoned { input_id: String },
}

impl MutationOutcome {
    fn no_op(reason: impl Into<String>) -> Self {
        Self::NoOp {
            reason: reason.into(),
        }
    }
}

/// The next data bag plus how it came about
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub data: DataBag,
    pub outcome: MutationOutcome,
    /// Key the operation acted on, once resolved
    pub resolved_key: Option<String>,
}

impl Mutation {
    pub fn is_applied(&self) -> bool {
        matches!(self.outcome, MutationOutcome::Applied)
    }

    fn applied(data: DataBag, key: impl Into<String>) -> Self {
        Self {
            data,
            outcome: MutationOutcome::Applied,
            resolved_key: Some(key.into()),
        }
    }

    fn no_op(data: DataBag, key: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            data,
            outcome: MutationOutcome::no_op(reason),
            resolved_key: key,
        }
    }

    fn abandoned(data: &DataBag, input_id: String) -> Self {
        Self {
            data: data.clone(),
            outcome: MutationOutcome::Abandoned { input_id },
            resolved_key: None,
        }
    }
}

/// Applies operations to data bags
pub struct MutationEngine {
    policy: HealingPolicy,
    placeholder_label: String,
    events: Arc<dyn EventSink>,
}

impl MutationEngine {
    /// Create an engine with the default healing policy and no event sink
    pub fn new() -> Self {
        Self {
            policy: HealingPolicy::default(),
            placeholder_label: DEFAULT_PLACEHOLDER_LABEL.to_string(),
            events: Arc::new(NullEventSink),
        }
    }

    pub fn with_policy(mut self, policy: HealingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_placeholder_label(mut self, label: impl Into<String>) -> Self {
        self.placeholder_label = label.into();
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn policy(&self) -> HealingPolicy {
        self.policy
    }

    /// Apply an action invocation
    ///
    /// Fails only when the action names no known operation.
    pub fn apply(&self, invocation: &ActionInvocation, data: &DataBag, forms: &FormState) -> Result<Mutation> {
        let op = Operation::parse(&invocation.action)?;
        Ok(self.apply_operation(op, &invocation.payload, data, forms))
    }

    /// Apply an already-parsed operation
    pub fn apply_operation(
        &self,
        op: Operation,
        payload: &ActionPayload,
        data: &DataBag,
        forms: &FormState,
    ) -> Mutation {
        log::debug!("Applying {} with key {:?}", op, payload.key);
        let mutation = match op {
            Operation::IncrementCount => self.increment_count(payload, data, forms),
            Operation::SetValue => self.set_value(payload, data, forms),
            Operation::ToggleState => self.toggle_state(payload, data),
            Operation::StartTimer => self.start_timer(payload, data),
            Operation::StopTimer => self.stop_timer(payload, data),
            Operation::ResetTimer => self.reset_timer(payload, data),
            Operation::AddListItem => self.add_list_item(payload, data, forms),
            Operation::ToggleListItem | Operation::DeleteListItem | Operation::EditListItem => {
                self.update_list_item(op, payload, data, forms)
            }
        };
        if let MutationOutcome::Abandoned { input_id } = &mutation.outcome {
            emit(
                self.events.as_ref(),
                EngineEvent::InputUnresolved {
                    action: op.name().to_string(),
                    input_id: input_id.clone(),
                },
            );
        }
        mutation
    }

    /// Resolve a field, create it if needed, and report any healing
    fn heal(&self, op: Operation, next: &mut DataBag, query: FieldQuery<'_>) -> String {
        let resolved = resolve_key(next, query, self.policy);
        resolved.ensure(next, query.kind);
        self.report_heal(op, query.requested, &resolved);
        resolved.key
    }

    fn report_heal(&self, op: Operation, requested: Option<&str>, resolved: &ResolvedKey) {
        if resolved.strategy == HealStrategy::Exact {
            return;
        }
        log::debug!(
            "{}: requested {:?}, using '{}' ({:?})",
            op,
            requested,
            resolved.key,
            resolved.strategy
        );
        emit(
            self.events.as_ref(),
            EngineEvent::KeyHealed {
                action: op.name().to_string(),
                requested: requested.map(str::to_string),
                resolved: resolved.key.clone(),
                strategy: resolved.strategy,
            },
        );
    }

    fn increment_count(&self, payload: &ActionPayload, data: &DataBag, forms: &FormState) -> Mutation {
        let amount = match payload.amount.as_ref() {
            None => 1.0,
            Some(raw) => match resolve(raw, forms) {
                Resolved::Unresolved { input_id } => return Mutation::abandoned(data, input_id),
                Resolved::Value(value) => match numeric(&value) {
                    Some(n) => n,
                    // non-numeric typed text abandons; a literal falls back to 1
                    None => match input_reference(raw) {
                        Some(input_id) => return Mutation::abandoned(data, input_id.to_string()),
                        None => {
                            log::warn!("Non-numeric increment amount {}, using 1", value);
                            1.0
                        }
                    },
                },
            },
        };

        let mut next = data.clone();
        let key = self.heal(
            Operation::IncrementCount,
            &mut next,
            FieldQuery::new(payload.requested_key(), DataKind::Number, "count"),
        );
        let current = next.get(&key).map(DataValue::as_number_lossy).unwrap_or(0.0);
        next.insert(key.clone(), current + amount);
        Mutation::applied(next, key)
    }

    fn set_value(&self, payload: &ActionPayload, data: &DataBag, forms: &FormState) -> Mutation {
        let Some(raw) = payload.value.as_ref() else {
            return Mutation::no_op(data.clone(), None, "no value to set");
        };
        let value = match resolve(raw, forms) {
            Resolved::Unresolved { input_id } => return Mutation::abandoned(data, input_id),
            Resolved::Value(value) => DataValue::from(value),
        };

        let mut next = data.clone();
        let key = self.heal(
            Operation::SetValue,
            &mut next,
            FieldQuery::new(payload.requested_key(), value.kind(), "value"),
        );
        next.insert(key.clone(), value);
        Mutation::applied(next, key)
    }

    fn toggle_state(&self, payload: &ActionPayload, data: &DataBag) -> Mutation {
        let mut next = data.clone();
        let key = self.heal(
            Operation::ToggleState,
            &mut next,
            FieldQuery::new(payload.requested_key(), DataKind::Boolean, "enabled"),
        );
        let current = next.get(&key).map(DataValue::as_bool_lossy).unwrap_or(false);
        next.insert(key.clone(), !current);
        Mutation::applied(next, key)
    }

    /// Locate (and create) the timer fields for a timer operation
    ///
    /// A requested key names the running flag when it holds a boolean, or
    /// the countdown when it holds a number (or is a conventional time
    /// name). An explicit `timeKey` wins for the countdown.
    fn heal_timer(&self, op: Operation, payload: &ActionPayload, next: &mut DataBag) -> TimerFields {
        let explicit_time = payload.extra.get("timeKey").and_then(Value::as_str);
        let requested = payload.requested_key();
        let (running_key, time_key) = match requested {
            Some(key) => match next.get(key) {
                Some(DataValue::Bool(_)) => (Some(key), explicit_time),
                Some(DataValue::Number(_)) => (None, explicit_time.or(Some(key))),
                None if TIME_KEYS.contains(&key) => (None, explicit_time.or(Some(key))),
                None => (Some(key), explicit_time),
                Some(other) => {
                    log::debug!("Ignoring timer key '{}' holding a {}", key, other.kind());
                    (None, explicit_time)
                }
            },
            None => (None, explicit_time),
        };

        let fields = TimerFields::locate(next, running_key, time_key, self.policy);
        fields.ensure(next);
        self.report_heal(op, running_key, &fields.running);
        self.report_heal(op, time_key, &fields.time);
        fields
    }

    fn start_timer(&self, payload: &ActionPayload, data: &DataBag) -> Mutation {
        let mut next = data.clone();
        let fields = self.heal_timer(Operation::StartTimer, payload, &mut next);
        if fields.is_running(&next) {
            return Mutation::no_op(next, Some(fields.running.key), "timer already running");
        }
        next.insert(fields.running.key.clone(), true);
        next.insert(fields.finished.key.clone(), false);
        Mutation::applied(next, fields.running.key)
    }

    fn stop_timer(&self, payload: &ActionPayload, data: &DataBag) -> Mutation {
        let mut next = data.clone();
        let fields = self.heal_timer(Operation::StopTimer, payload, &mut next);
        if !fields.is_running(&next) {
            return Mutation::no_op(next, Some(fields.running.key), "timer already stopped");
        }
        next.insert(fields.running.key.clone(), false);
        Mutation::applied(next, fields.running.key)
    }

    fn reset_timer(&self, payload: &ActionPayload, data: &DataBag) -> Mutation {
        let initial = payload
            .initial_value
            .as_ref()
            .and_then(numeric)
            .unwrap_or(0.0)
            .max(0.0);

        let mut next = data.clone();
        let fields = self.heal_timer(Operation::ResetTimer, payload, &mut next);
        next.insert(fields.time.key.clone(), initial);
        next.insert(fields.running.key.clone(), false);
        next.insert(fields.finished.key.clone(), false);
        Mutation::applied(next, fields.time.key)
    }

    fn add_list_item(&self, payload: &ActionPayload, data: &DataBag, forms: &FormState) -> Mutation {
        let mut item = match payload.value.as_ref() {
            None => ListItem::new(self.placeholder_label.clone()),
            Some(raw) => match resolve(raw, forms) {
                Resolved::Unresolved { input_id } => return Mutation::abandoned(data, input_id),
                Resolved::Value(Value::Null) => ListItem::new(self.placeholder_label.clone()),
                Resolved::Value(Value::String(s)) if s.trim().is_empty() => {
                    ListItem::new(self.placeholder_label.clone())
                }
                Resolved::Value(Value::String(s)) => ListItem::new(s),
                Resolved::Value(object @ Value::Object(_)) => {
                    let mut item = ListItem::from_value(object);
                    if item.id.is_none() {
                        item.id = Some(new_item_id());
                    }
                    item
                }
                Resolved::Value(other) => ListItem::new(other.to_string()),
            },
        };
        for field in ITEM_SECONDARY_FIELDS {
            if let Some(value) = payload.extra.get(*field) {
                item.extra.insert(field.to_string(), value.clone());
            }
        }

        let mut next = data.clone();
        let key = self.heal(
            Operation::AddListItem,
            &mut next,
            FieldQuery::new(payload.requested_key(), DataKind::List, "items"),
        );
        match next.get_mut(&key) {
            Some(DataValue::List(items)) => items.push(item),
            Some(other) => {
                let previous = other.kind();
                *other = DataValue::List(vec![item]);
                emit(
                    self.events.as_ref(),
                    EngineEvent::ValueReplaced {
                        action: Operation::AddListItem.name().to_string(),
                        key: key.clone(),
                        previous,
                    },
                );
            }
            None => {
                next.insert(key.clone(), DataValue::List(vec![item]));
            }
        }
        Mutation::applied(next, key)
    }

    fn update_list_item(
        &self,
        op: Operation,
        payload: &ActionPayload,
        data: &DataBag,
        forms: &FormState,
    ) -> Mutation {
        // resolve the new label before touching anything
        let new_label = if op == Operation::EditListItem {
            match payload.value.as_ref() {
                None => return Mutation::no_op(data.clone(), None, "no replacement value"),
                Some(raw) => match resolve(raw, forms) {
                    Resolved::Unresolved { input_id } => return Mutation::abandoned(data, input_id),
                    Resolved::Value(Value::String(s)) => Some(s),
                    Resolved::Value(other) => Some(other.to_string()),
                },
            }
        } else {
            None
        };

        let mut next = data.clone();
        let key = self.heal(
            op,
            &mut next,
            FieldQuery::new(payload.requested_key(), DataKind::List, "items"),
        );

        let Some(items) = next.get_mut(&key).and_then(DataValue::as_list_mut) else {
            let reason = format!("'{}' is not a list", key);
            return Mutation::no_op(next, Some(key), reason);
        };

        let item_id = payload.item_id();
        let position = match item_id.as_deref() {
            Some(id) => items.iter().position(|i| i.id.as_deref() == Some(id)),
            None => payload.index().filter(|i| *i < items.len()),
        };
        let Some(position) = position else {
            let len = items.len();
            emit(
                self.events.as_ref(),
                EngineEvent::IndexOutOfRange {
                    action: op.name().to_string(),
                    key: key.clone(),
                    index: payload.index(),
                    item_id,
                    len,
                },
            );
            return Mutation::no_op(next, Some(key), "no such list item");
        };

        match op {
            Operation::ToggleListItem => items[position].checked = !items[position].checked,
            Operation::DeleteListItem => {
                items.remove(position);
            }
            _ => {
                if let Some(label) = new_label {
                    items[position].label = label;
                }
            }
        }
        Mutation::applied(next, key)
    }
}

impl Default for MutationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Numeric reading of a payload operand
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}
