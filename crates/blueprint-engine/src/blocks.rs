//! Built-in block renderers
//!
//! One rendering rule per canonical tag. Each rule reads its block's
//! properties, looks data up through the [`RenderContext`] (which supplies
//! defaults for missing entries) and attaches the bindings its controls need.

use serde_json::Value;

use crate::descriptor::{BlockCategory, BlockDescriptor};
use crate::forms::input_ref;
use crate::heal::HealingPolicy;
use crate::mutation::Operation;
use crate::registry::BlockRegistry;
use crate::render::{RenderContext, UiEvent, VisualItem, VisualKind, VisualNode};
use crate::tick::TimerFields;
use crate::types::{tags, ActionInvocation, ActionPayload, Block};
use crate::value::{DataKind, DataValue, ListItem};

/// Block properties that may carry a timer's starting value
const INITIAL_VALUE_PROPS: &[&str] = &["initialValue", "initial", "duration", "seconds"];

/// Register every built-in block type
pub fn register_builtins(registry: &mut BlockRegistry) {
    use BlockCategory::*;

    registry.register_fn(
        BlockDescriptor::new(tags::STACK, "Stack", "Vertical group of blocks", Layout).container(),
        |_block, children, _ctx| VisualNode::new(VisualKind::Stack).with_children(children),
    );
    registry.register_fn(
        BlockDescriptor::new(tags::ROW, "Row", "Horizontal group of blocks", Layout).container(),
        |_block, children, _ctx| VisualNode::new(VisualKind::Row).with_children(children),
    );
    registry.register_fn(
        BlockDescriptor::new(tags::CARD, "Card", "Framed group with an optional title", Layout).container(),
        render_card,
    );
    registry.register_fn(
        BlockDescriptor::new(tags::HEADER, "Header", "Title line", Display),
        render_header,
    );
    registry.register_fn(
        BlockDescriptor::new(tags::TEXT, "Text", "Static or data-bound text", Display).bound_to(DataKind::Text),
        render_text,
    );
    registry.register_fn(
        BlockDescriptor::new(tags::STAT, "Stat", "Labelled value", Display).bound_to(DataKind::Number),
        render_stat,
    );
    registry.register_fn(
        BlockDescriptor::new(tags::BTN, "Button", "Dispatches an action when pressed", Control),
        render_button,
    );
    registry.register_fn(
        BlockDescriptor::new(tags::BTN_ROW, "Button row", "Row of buttons", Control).container(),
        |_block, children, _ctx| VisualNode::new(VisualKind::ButtonRow).with_children(children),
    );
    registry.register_fn(
        BlockDescriptor::new(tags::TOGGLE, "Toggle", "On/off switch", Control).bound_to(DataKind::Boolean),
        render_toggle,
    );
    registry.register_fn(
        BlockDescriptor::new(tags::TIMER, "Timer", "Countdown with start, stop and reset", Control)
            .bound_to(DataKind::Number),
        render_timer,
    );
    registry.register_fn(
        BlockDescriptor::new(tags::INPUT, "Input", "Text entry", Control),
        render_input,
    );
    registry.register_fn(
        BlockDescriptor::new(tags::CHECKLIST, "Checklist", "Checkable items", Collection).bound_to(DataKind::List),
        render_checklist,
    );
    registry.register_fn(
        BlockDescriptor::new(tags::DATA_LIST, "Data list", "Read-only list of records", Collection)
            .bound_to(DataKind::List),
        render_data_list,
    );
}

fn render_card(block: &Block, children: Vec<VisualNode>, _ctx: &RenderContext<'_>) -> VisualNode {
    let title = block.label().or_else(|| block.str_prop("title")).map(str::to_string);
    VisualNode::new(VisualKind::Card { title }).with_children(children)
}

fn render_header(block: &Block, _children: Vec<VisualNode>, _ctx: &RenderContext<'_>) -> VisualNode {
    let text = block
        .text()
        .or_else(|| block.label())
        .or_else(|| block.str_prop("title"))
        .unwrap_or_default();
    VisualNode::new(VisualKind::Header {
        text: text.to_string(),
        icon: block.icon().map(str::to_string),
    })
}

fn render_text(block: &Block, _children: Vec<VisualNode>, ctx: &RenderContext<'_>) -> VisualNode {
    let text = match block.data_key() {
        Some(key) => ctx.text(Some(key)),
        None => block.text().or_else(|| block.label()).unwrap_or_default().to_string(),
    };
    VisualNode::new(VisualKind::Text { text })
}

fn render_stat(block: &Block, _children: Vec<VisualNode>, ctx: &RenderContext<'_>) -> VisualNode {
    let value = match (block.data_key(), block.prop("value")) {
        (Some(key), _) => ctx.value(Some(key), DataKind::Number),
        (None, Some(literal)) => DataValue::from(literal.clone()),
        (None, None) => DataKind::Number.default_value(),
    };
    VisualNode::new(VisualKind::Stat {
        label: block.label().unwrap_or_default().to_string(),
        value,
        icon: block.icon().map(str::to_string),
    })
}

fn render_button(block: &Block, _children: Vec<VisualNode>, _ctx: &RenderContext<'_>) -> VisualNode {
    let label = block.label().or_else(|| block.text()).unwrap_or("Button");
    let node = VisualNode::new(VisualKind::Button {
        label: label.to_string(),
        variant: block.variant().map(str::to_string),
        icon: block.icon().map(str::to_string),
    });
    match declared_invocation(block) {
        Some(invocation) => node.with_binding(UiEvent::Press, invocation),
        None => {
            log::debug!("Button '{}' declares no action", label);
            node
        }
    }
}

fn render_toggle(block: &Block, _children: Vec<VisualNode>, ctx: &RenderContext<'_>) -> VisualNode {
    let key = block.data_key();
    let invocation = declared_invocation(block)
        .unwrap_or_else(|| ActionInvocation::new(Operation::ToggleState.name(), payload_for(key)));
    VisualNode::new(VisualKind::Toggle {
        label: block.label().unwrap_or_default().to_string(),
        on: ctx.boolean(key),
    })
    .with_binding(UiEvent::Press, invocation)
}

fn render_timer(block: &Block, _children: Vec<VisualNode>, ctx: &RenderContext<'_>) -> VisualNode {
    let data = ctx.data();
    let time_key = block.data_key();
    let fields = TimerFields::locate(data, None, time_key, HealingPolicy::default());
    let finished = data
        .get(&fields.finished.key)
        .map(DataValue::as_bool_lossy)
        .unwrap_or(false);

    let mut payload = ActionPayload::default();
    if let Some(key) = time_key {
        payload.extra.insert("timeKey".to_string(), Value::String(key.to_string()));
    }
    let mut reset = payload.clone();
    reset.initial_value = INITIAL_VALUE_PROPS.iter().find_map(|p| block.prop(p)).cloned();

    VisualNode::new(VisualKind::Timer {
        label: block.label().unwrap_or_default().to_string(),
        remaining: fields.remaining(data),
        running: fields.is_running(data),
        finished,
    })
    .with_binding(UiEvent::Start, ActionInvocation::new(Operation::StartTimer.name(), payload.clone()))
    .with_binding(UiEvent::Stop, ActionInvocation::new(Operation::StopTimer.name(), payload))
    .with_binding(UiEvent::Reset, ActionInvocation::new(Operation::ResetTimer.name(), reset))
}

fn render_input(block: &Block, _children: Vec<VisualNode>, _ctx: &RenderContext<'_>) -> VisualNode {
    let input_id = block.input_id().unwrap_or("input");
    let node = VisualNode::new(VisualKind::Input {
        input_id: input_id.to_string(),
        placeholder: block
            .str_prop("placeholder")
            .or_else(|| block.label())
            .map(str::to_string),
    });
    let Some(mut invocation) = declared_invocation(block) else {
        return node;
    };
    if invocation.payload.value.is_none() {
        invocation.payload.value = Some(input_ref(input_id));
    }
    node.with_binding(
        UiEvent::Submit {
            input_id: input_id.to_string(),
        },
        invocation,
    )
}

fn render_checklist(block: &Block, _children: Vec<VisualNode>, ctx: &RenderContext<'_>) -> VisualNode {
    let key = ctx.list_key(block.data_key());
    let items = ctx.list(key);

    let mut node = VisualNode::new(VisualKind::Checklist {
        title: block.label().unwrap_or_default().to_string(),
        items: visual_items(items),
    });
    for (index, item) in items.iter().enumerate() {
        let id = item.id.clone().unwrap_or_else(|| index.to_string());
        node = node
            .with_binding(
                UiEvent::ToggleItem { id: id.clone() },
                ActionInvocation::new(Operation::ToggleListItem.name(), item_payload(key, index, item)),
            )
            .with_binding(
                UiEvent::DeleteItem { id },
                ActionInvocation::new(Operation::DeleteListItem.name(), item_payload(key, index, item)),
            );
    }
    if let Some(input_id) = block.str_prop("inputId") {
        let payload = payload_for(key).with_value(input_ref(input_id));
        node = node.with_binding(
            UiEvent::Submit {
                input_id: input_id.to_string(),
            },
            ActionInvocation::new(Operation::AddListItem.name(), payload),
        );
    }
    node
}

fn render_data_list(block: &Block, _children: Vec<VisualNode>, ctx: &RenderContext<'_>) -> VisualNode {
    let key = ctx.list_key(block.data_key());
    VisualNode::new(VisualKind::DataList {
        title: block.label().unwrap_or_default().to_string(),
        items: visual_items(ctx.list(key)),
    })
}

/// The invocation a block declares through `action` and `payload`
///
/// The block's own `key` fills in a payload that names no target.
fn declared_invocation(block: &Block) -> Option<ActionInvocation> {
    let action = block.action()?;
    let mut payload = block.payload().map(ActionPayload::from_map).unwrap_or_default();
    if payload.key.is_none() {
        payload.key = block.data_key().map(str::to_string);
    }
    if payload.amount.is_none() {
        payload.amount = block.prop("amount").cloned();
    }
    Some(ActionInvocation::new(action, payload))
}

fn payload_for(key: Option<&str>) -> ActionPayload {
    ActionPayload {
        key: key.map(str::to_string),
        ..ActionPayload::default()
    }
}

/// Address an item by id when it has one, by position otherwise
fn item_payload(key: Option<&str>, index: usize, item: &ListItem) -> ActionPayload {
    let payload = payload_for(key);
    match &item.id {
        Some(id) => payload.with_id(id.clone()),
        None => payload.with_index(index),
    }
}

fn visual_items(items: &[ListItem]) -> Vec<VisualItem> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| VisualItem::from_item(i, item))
        .collect()
}
