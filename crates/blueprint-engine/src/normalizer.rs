//! Blueprint normalization
//!
//! Generated blueprints drift: the same button row shows up as `ButtonList`,
//! `Buttons` or `btns`, text arrives as `content` or `text`, and properties
//! are sometimes wrapped in a nested `props` object. The normalizer rewrites
//! a raw tree into the canonical shape the renderer expects.
//!
//! Normalization works on a deep copy, processes children before their
//! parent, and is idempotent: normalizing a normalized tree changes nothing.

use serde_json::{Map, Value};

use crate::types::{tags, Block};

/// Canonical tags and the synonyms that fold onto them
///
/// Matching ignores case and the separators `-`, `_` and spaces.
const SYNONYMS: &[(&str, &[&str])] = &[
    (tags::STACK, &["column", "vstack", "section", "container", "box"]),
    (tags::ROW, &["hstack", "horizontal"]),
    (tags::CARD, &["panel"]),
    (tags::HEADER, &["title", "heading", "h1", "h2"]),
    (tags::TEXT, &["paragraph", "span", "label", "p", "markdown"]),
    (tags::STAT, &["metric", "counter", "number", "display"]),
    (tags::BTN, &["button"]),
    (tags::BTN_ROW, &["buttonlist", "buttons", "buttonrow", "buttongroup", "actions"]),
    (tags::TOGGLE, &["switch", "checkbox"]),
    (tags::TIMER, &["countdown", "clock", "stopwatch"]),
    (tags::INPUT, &["textinput", "textfield", "field"]),
    (tags::CHECKLIST, &["todolist", "todo", "tasks"]),
    (tags::DATA_LIST, &["list", "table", "history", "log"]),
];

/// Property names that may stand in for `actions`, in priority order
const ACTIONS_ALIASES: &[&str] = &["buttons", "btns"];

/// Property names that may stand in for `key`
const KEY_ALIASES: &[&str] = &["dataKey", "bind", "field"];

/// Wrappers some generators put the real properties in
const NESTED_PROPS: &[&str] = &["props", "properties"];

/// Map a raw type tag onto its canonical form
///
/// Returns `None` for tags that are neither canonical nor a known synonym.
pub fn canonical_tag(tag: &str) -> Option<&'static str> {
    let folded = fold(tag);
    if folded.is_empty() {
        return None;
    }
    SYNONYMS.iter().find_map(|(canonical, synonyms)| {
        if fold(canonical) == folded || synonyms.contains(&folded.as_str()) {
            Some(*canonical)
        } else {
            None
        }
    })
}

fn fold(tag: &str) -> String {
    tag.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalize a whole blueprint, leaving the input untouched
pub fn normalize_blueprint(blocks: &[Block]) -> Vec<Block> {
    blocks.iter().map(normalize_block).collect()
}

/// Normalize one block tree, leaving the input untouched
pub fn normalize_block(block: &Block) -> Block {
    let mut copy = block.clone();
    normalize_in_place(&mut copy);
    copy
}

fn normalize_in_place(block: &mut Block) {
    for child in block.children.iter_mut() {
        normalize_in_place(child);
    }

    unwrap_nested_props(&mut block.props);

    match canonical_tag(&block.block_type) {
        Some(canonical) if canonical != block.block_type => {
            log::debug!("Folding block type '{}' -> '{}'", block.block_type, canonical);
            block.block_type = canonical.to_string();
        }
        Some(_) => {}
        None => {
            let trimmed = block.block_type.trim();
            if trimmed.len() != block.block_type.len() {
                block.block_type = trimmed.to_string();
            }
        }
    }

    alias_props(&mut block.props);

    if let Some(Value::Array(entries)) = block.props.get_mut("actions") {
        for entry in entries.iter_mut() {
            if let Value::Object(map) = entry {
                alias_props(map);
            }
        }
    }
}

/// Lift properties out of nested `props`/`properties` objects
///
/// Repeats until no wrapper holds an object, so wrappers nested inside
/// wrappers are flattened in one pass. Outer values win over inner ones.
fn unwrap_nested_props(props: &mut Map<String, Value>) {
    while let Some(wrapper) = NESTED_PROPS
        .iter()
        .find(|w| matches!(props.get(**w), Some(Value::Object(_))))
    {
        if let Some(Value::Object(nested)) = props.remove(*wrapper) {
            for (k, v) in nested {
                if !props.contains_key(&k) {
                    props.insert(k, v);
                }
            }
        }
    }
}

fn alias_props(props: &mut Map<String, Value>) {
    mirror(props, "content", "text");
    mirror(props, "text", "content");

    fill_from(props, "actions", ACTIONS_ALIASES);
    fill_from(props, "key", KEY_ALIASES);
    fill_from(props, "action", &["tool"]);
}

/// Copy `from` into `to` when only `from` is present
fn mirror(props: &mut Map<String, Value>, from: &str, to: &str) {
    if props.contains_key(to) {
        return;
    }
    if let Some(value) = props.get(from).cloned() {
        props.insert(to.to_string(), value);
    }
}

/// Fill `target` from the first alias present, when `target` is absent
fn fill_from(props: &mut Map<String, Value>, target: &str, aliases: &[&str]) {
    if props.contains_key(target) {
        return;
    }
    if let Some(value) = aliases.iter().find_map(|a| props.get(*a)).cloned() {
        props.insert(target.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn blueprint(value: Value) -> Vec<Block> {
        Block::list_from_json(value).unwrap()
    }

    #[test]
    fn test_synonym_folding() {
        assert_eq!(canonical_tag("ButtonList"), Some(tags::BTN_ROW));
        assert_eq!(canonical_tag("Buttons"), Some(tags::BTN_ROW));
        assert_eq!(canonical_tag("button-row"), Some(tags::BTN_ROW));
        assert_eq!(canonical_tag("Paragraph"), Some(tags::TEXT));
        assert_eq!(canonical_tag("Span"), Some(tags::TEXT));
        assert_eq!(canonical_tag("Label"), Some(tags::TEXT));
        assert_eq!(canonical_tag("text"), Some(tags::TEXT));
        assert_eq!(canonical_tag("Stat"), Some(tags::STAT));
        assert_eq!(canonical_tag("Sparkline"), None);
        assert_eq!(canonical_tag(""), None);
    }

    #[test]
    fn test_content_text_mirroring() {
        let out = normalize_blueprint(&blueprint(json!([
            {"type": "Paragraph", "content": "Hello"},
            {"type": "Text", "text": "World"},
            {"type": "Text", "text": "A", "content": "B"}
        ])));
        assert_eq!(out[0].block_type, tags::TEXT);
        assert_eq!(out[0].prop("text"), Some(&json!("Hello")));
        assert_eq!(out[0].prop("content"), Some(&json!("Hello")));
        assert_eq!(out[1].prop("content"), Some(&json!("World")));
        // both present: left alone
        assert_eq!(out[2].prop("text"), Some(&json!("A")));
        assert_eq!(out[2].prop("content"), Some(&json!("B")));
    }

    #[test]
    fn test_actions_and_key_aliases() {
        let out = normalize_blueprint(&blueprint(json!([
            {"type": "Buttons", "btns": [{"text": "+1", "tool": "increment-count"}]},
            {"type": "Stat", "dataKey": "cups"}
        ])));
        let actions = out[0].actions().unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0]["action"], json!("increment-count"));
        assert_eq!(actions[0]["content"], json!("+1"));
        assert_eq!(out[1].data_key(), Some("cups"));
    }

    #[test]
    fn test_nested_props_are_lifted() {
        let out = normalize_blueprint(&blueprint(json!([
            {"type": "Stat", "label": "Top", "props": {"label": "Nested", "key": "total"}}
        ])));
        assert_eq!(out[0].label(), Some("Top"));
        assert_eq!(out[0].data_key(), Some("total"));
        assert!(out[0].prop("props").is_none());
    }

    #[test]
    fn test_recurses_into_children() {
        let out = normalize_blueprint(&blueprint(json!([
            {"type": "Column", "children": [
                {"type": "Panel", "children": [{"type": "Span", "content": "deep"}]}
            ]}
        ])));
        assert_eq!(out[0].block_type, tags::STACK);
        assert_eq!(out[0].children[0].block_type, tags::CARD);
        let leaf = &out[0].children[0].children[0];
        assert_eq!(leaf.block_type, tags::TEXT);
        assert_eq!(leaf.text(), Some("deep"));
    }

    #[test]
    fn test_unknown_tag_is_kept() {
        let out = normalize_blueprint(&blueprint(json!([{"type": " Sparkline ", "key": "x"}])));
        assert_eq!(out[0].block_type, "Sparkline");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let fixtures = vec![
            json!([{"type": "ButtonList", "buttons": [{"label": "Go", "tool": "start-timer"}]}]),
            json!([{"type": "VStack", "children": [
                {"type": "Label", "content": "x"},
                {"type": "Counter", "bind": "n", "properties": {"icon": "cup"}},
                {"type": "mystery"}
            ]}]),
            json!([{"type": "Todo", "field": "items"}, {"type": "Countdown"}]),
            json!([{"type": "Metric", "props": {"props": {"label": "Cups", "key": "cups"}}}]),
            json!([{"type": "Text", "properties": {"props": {"properties": {"content": "deep"}}}}]),
            json!([]),
        ];
        for fixture in fixtures {
            let once = normalize_blueprint(&blueprint(fixture));
            let twice = normalize_blueprint(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_nested_prop_wrappers_flatten() {
        let once = normalize_blueprint(&blueprint(json!([{
            "type": "Metric",
            "label": "Outer",
            "props": {"props": {"label": "Inner", "key": "cups"}}
        }])));
        let block = &once[0];
        assert_eq!(block.label(), Some("Outer"));
        assert_eq!(block.data_key(), Some("cups"));
        assert!(block.prop("props").is_none());
        assert!(block.prop("properties").is_none());
    }

    #[test]
    fn test_input_is_not_mutated() {
        let raw = blueprint(json!([{"type": "Paragraph", "content": "keep me"}]));
        let before = raw.clone();
        let _ = normalize_blueprint(&raw);
        assert_eq!(raw, before);
    }
}
