//! Tree renderer
//!
//! Walks a normalized blueprint and produces a host-agnostic visual tree.
//! Every block is resolved through the [`BlockRegistry`]; interactive blocks
//! carry [`EventBinding`]s that pair a UI event with the action invocation
//! the host should dispatch when it fires.
//!
//! Rendering is a pure, synchronous, single-pass walk. It never fails:
//! missing data renders as the kind's default and unknown tags render as a
//! visible diagnostic node without affecting their siblings.

use std::borrow::Cow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::{emit, EngineEvent, EventSink, NullEventSink};
use crate::registry::BlockRegistry;
use crate::types::{tags, ActionInvocation, Block};
use crate::value::{DataBag, DataKind, DataValue, ListItem};

/// User interaction a binding reacts to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UiEvent {
    /// Button press or toggle flip
    Press,
    /// Text entry submitted
    #[serde(rename_all = "camelCase")]
    Submit { input_id: String },
    /// List row checkbox clicked
    ToggleItem { id: String },
    /// List row delete clicked
    DeleteItem { id: String },
    Start,
    Stop,
    Reset,
}

/// A UI event and the action it dispatches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBinding {
    pub event: UiEvent,
    pub invocation: ActionInvocation,
}

impl EventBinding {
    pub fn new(event: UiEvent, invocation: ActionInvocation) -> Self {
        Self { event, invocation }
    }
}

/// One row of a list-backed block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualItem {
    /// Item id, or its position when the item has none
    pub id: String,
    pub label: String,
    pub checked: bool,
    /// Secondary text (category, badge, description)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl VisualItem {
    pub fn from_item(index: usize, item: &ListItem) -> Self {
        let detail = ["category", "badge", "description"]
            .iter()
            .find_map(|k| item.extra.get(*k))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        Self {
            id: item.id.clone().unwrap_or_else(|| index.to_string()),
            label: item.label.clone(),
            checked: item.checked,
            detail,
        }
    }
}

/// What a visual node shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum VisualKind {
    Stack,
    Row,
    Card {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Header {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        icon: Option<String>,
    },
    Text {
        text: String,
    },
    Stat {
        label: String,
        value: DataValue,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        icon: Option<String>,
    },
    Button {
        label: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variant: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        icon: Option<String>,
    },
    ButtonRow,
    Toggle {
        label: String,
        on: bool,
    },
    #[serde(rename_all = "camelCase")]
    Timer {
        label: String,
        remaining: f64,
        running: bool,
        finished: bool,
    },
    #[serde(rename_all = "camelCase")]
    Input {
        input_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
    },
    Checklist {
        title: String,
        items: Vec<VisualItem>,
    },
    DataList {
        title: String,
        items: Vec<VisualItem>,
    },
    /// Placeholder for a block that could not be rendered
    Diagnostic {
        tag: String,
        message: String,
    },
}

/// A rendered block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualNode {
    #[serde(flatten)]
    pub kind: VisualKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<VisualNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<EventBinding>,
}

impl VisualNode {
    pub fn new(kind: VisualKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
            bindings: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<VisualNode>) -> Self {
        self.children = children;
        self
    }

    pub fn with_binding(mut self, event: UiEvent, invocation: ActionInvocation) -> Self {
        self.bindings.push(EventBinding::new(event, invocation));
        self
    }

    /// Diagnostic node for an unrenderable block
    pub fn diagnostic(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(VisualKind::Diagnostic {
            tag: tag.into(),
            message: message.into(),
        })
    }

    pub fn is_diagnostic(&self) -> bool {
        matches!(self.kind, VisualKind::Diagnostic { .. })
    }

    /// The invocation bound to an event, if any
    pub fn binding(&self, event: &UiEvent) -> Option<&ActionInvocation> {
        self.bindings
            .iter()
            .find(|b| &b.event == event)
            .map(|b| &b.invocation)
    }

    /// Depth-first iterator over this node and all descendants
    pub fn walk(&self) -> Vec<&VisualNode> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

/// Read-only view of the data bag handed to block renderers
///
/// Every lookup falls back to the kind's default, so renderers never have
/// to deal with absent keys.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    data: &'a DataBag,
}

impl<'a> RenderContext<'a> {
    pub fn new(data: &'a DataBag) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &'a DataBag {
        self.data
    }

    /// Entry under `key`, or the default for `kind`
    pub fn value(&self, key: Option<&str>, kind: DataKind) -> DataValue {
        key.and_then(|k| self.data.get(k))
            .cloned()
            .unwrap_or_else(|| kind.default_value())
    }

    pub fn number(&self, key: Option<&str>) -> f64 {
        key.and_then(|k| self.data.get(k))
            .map(DataValue::as_number_lossy)
            .unwrap_or(0.0)
    }

    pub fn boolean(&self, key: Option<&str>) -> bool {
        key.and_then(|k| self.data.get(k))
            .map(DataValue::as_bool_lossy)
            .unwrap_or(false)
    }

    pub fn text(&self, key: Option<&str>) -> String {
        key.and_then(|k| self.data.get(k))
            .map(DataValue::display_text)
            .unwrap_or_default()
    }

    /// Items of the list under `key`, or an empty slice
    pub fn list(&self, key: Option<&str>) -> &'a [ListItem] {
        key.and_then(|k| self.data.get(k))
            .and_then(DataValue::as_list)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The key a list block reads from: its own, else the first list entry
    pub fn list_key(&self, key: Option<&'a str>) -> Option<&'a str> {
        key.or_else(|| self.data.first_key_of_kind(DataKind::List))
    }
}

/// Renders blueprints through a block registry
pub struct TreeRenderer {
    registry: Arc<BlockRegistry>,
    events: Arc<dyn EventSink>,
}

impl TreeRenderer {
    pub fn new(registry: Arc<BlockRegistry>) -> Self {
        Self {
            registry,
            events: Arc::new(NullEventSink),
        }
    }

    /// Renderer backed by the built-in block set
    pub fn with_builtins() -> Self {
        Self::new(Arc::new(BlockRegistry::with_builtins()))
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    /// Render a blueprint against a data bag
    pub fn render(&self, blueprint: &[Block], data: &DataBag) -> Vec<VisualNode> {
        let ctx = RenderContext::new(data);
        blueprint.iter().map(|b| self.render_block(b, &ctx)).collect()
    }

    /// Render one block and its subtree
    pub fn render_block(&self, block: &Block, ctx: &RenderContext<'_>) -> VisualNode {
        let Some(renderer) = self.registry.get_renderer(&block.block_type) else {
            return self.unknown_block(block);
        };
        let children = expanded_children(block)
            .iter()
            .map(|child| self.render_block(child, ctx))
            .collect();
        renderer.render(block, children, ctx)
    }

    fn unknown_block(&self, block: &Block) -> VisualNode {
        emit(
            self.events.as_ref(),
            EngineEvent::UnknownBlock {
                tag: block.block_type.clone(),
            },
        );
        let message = if block.block_type.trim().is_empty() {
            "Block has no type".to_string()
        } else {
            format!("Unknown block type '{}'", block.block_type)
        };
        // the subtree is dropped; only this node is replaced
        VisualNode::diagnostic(block.block_type.clone(), message)
    }
}

/// Children to render, including buttons declared through `actions`
fn expanded_children(block: &Block) -> Cow<'_, [Block]> {
    let Some(actions) = block.actions().filter(|_| block.block_type == tags::BTN_ROW) else {
        return Cow::Borrowed(&block.children);
    };
    let mut children = block.children.clone();
    children.extend(actions.iter().filter_map(|value| match value {
        Value::Object(props) => {
            let mut button = Block::new(tags::BTN);
            button.props = props.clone();
            Some(button)
        }
        Value::String(label) => Some(Block::new(tags::BTN).with_prop("label", label.clone())),
        _ => None,
    }));
    Cow::Owned(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::VecEventSink;
    use crate::normalizer::normalize_blueprint;
    use serde_json::json;

    fn blueprint(value: Value) -> Vec<Block> {
        normalize_blueprint(&Block::list_from_json(value).unwrap())
    }

    #[test]
    fn test_default_safety() {
        let blocks = blueprint(json!([
            {"type": "Stat", "label": "Cups", "key": "cups"},
            {"type": "Toggle", "label": "Lights", "key": "lights"},
            {"type": "Checklist", "label": "Todo", "key": "todos"},
            {"type": "Timer", "label": "Tea", "key": "steep"},
            {"type": "Text", "key": "note"}
        ]));
        let nodes = TreeRenderer::with_builtins().render(&blocks, &DataBag::new());

        assert_eq!(nodes.len(), 5);
        assert!(nodes.iter().all(|n| !n.is_diagnostic()));
        match &nodes[0].kind {
            VisualKind::Stat { value, .. } => assert_eq!(value, &DataValue::Number(0.0)),
            other => panic!("expected stat, got {:?}", other),
        }
        match &nodes[1].kind {
            VisualKind::Toggle { on, .. } => assert!(!on),
            other => panic!("expected toggle, got {:?}", other),
        }
        match &nodes[2].kind {
            VisualKind::Checklist { items, .. } => assert!(items.is_empty()),
            other => panic!("expected checklist, got {:?}", other),
        }
        match &nodes[3].kind {
            VisualKind::Timer {
                remaining,
                running,
                finished,
                ..
            } => {
                assert_eq!(*remaining, 0.0);
                assert!(!running);
                assert!(!finished);
            }
            other => panic!("expected timer, got {:?}", other),
        }
        match &nodes[4].kind {
            VisualKind::Text { text } => assert_eq!(text, ""),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_tag_containment() {
        let sink = Arc::new(VecEventSink::new());
        let renderer = TreeRenderer::with_builtins().with_event_sink(sink.clone());
        let blocks = blueprint(json!([
            {"type": "Stat", "label": "Score", "key": "score"},
            {"type": "Sparkline", "key": "score"}
        ]));
        let data: DataBag = serde_json::from_value(json!({"score": 12})).unwrap();
        let nodes = renderer.render(&blocks, &data);

        assert_eq!(nodes.len(), 2);
        assert_eq!(
            nodes[0].kind,
            VisualKind::Stat {
                label: "Score".to_string(),
                value: DataValue::Number(12.0),
                icon: None,
            }
        );
        match &nodes[1].kind {
            VisualKind::Diagnostic { tag, message } => {
                assert_eq!(tag, "Sparkline");
                assert!(message.contains("Sparkline"));
            }
            other => panic!("expected diagnostic, got {:?}", other),
        }
        assert_eq!(
            sink.events(),
            vec![EngineEvent::UnknownBlock {
                tag: "Sparkline".to_string()
            }]
        );
    }

    #[test]
    fn test_unknown_tag_nested_does_not_abort_siblings() {
        let blocks = blueprint(json!([{
            "type": "Column",
            "children": [
                {"type": "Heading", "text": "Hello"},
                {"type": "Hologram"},
                {"type": "Paragraph", "content": "World"}
            ]
        }]));
        let nodes = TreeRenderer::with_builtins().render(&blocks, &DataBag::new());

        assert_eq!(nodes[0].kind, VisualKind::Stack);
        let children = &nodes[0].children;
        assert_eq!(children.len(), 3);
        assert!(!children[0].is_diagnostic());
        assert!(children[1].is_diagnostic());
        assert_eq!(
            children[2].kind,
            VisualKind::Text {
                text: "World".to_string()
            }
        );
    }

    #[test]
    fn test_button_row_renders_actions_in_order() {
        let blocks = blueprint(json!([{
            "type": "Buttons",
            "buttons": [
                {"label": "+1", "action": "increment-count", "payload": {"key": "count"}},
                {"label": "+5", "tool": "increment-count", "payload": {"key": "count", "amount": 5}}
            ]
        }]));
        let nodes = TreeRenderer::with_builtins().render(&blocks, &DataBag::new());

        assert_eq!(nodes[0].kind, VisualKind::ButtonRow);
        let labels: Vec<_> = nodes[0]
            .children
            .iter()
            .map(|n| match &n.kind {
                VisualKind::Button { label, .. } => label.clone(),
                other => panic!("expected button, got {:?}", other),
            })
            .collect();
        assert_eq!(labels, vec!["+1", "+5"]);

        let second = nodes[0].children[1].binding(&UiEvent::Press).unwrap();
        assert_eq!(second.action, "increment-count");
        assert_eq!(second.payload.key.as_deref(), Some("count"));
        assert_eq!(second.payload.amount, Some(json!(5)));
    }

    #[test]
    fn test_walk_visits_every_node() {
        let blocks = blueprint(json!([{
            "type": "Card",
            "children": [{"type": "Row", "children": [{"type": "Text", "text": "a"}]}]
        }]));
        let nodes = TreeRenderer::with_builtins().render(&blocks, &DataBag::new());
        assert_eq!(nodes[0].walk().len(), 3);
    }
}
