//! Block type registry
//!
//! Maps block type tags to renderers and metadata. The tree renderer looks
//! every block up here; tags with no entry render as a diagnostic.
//!
//! # Usage
//!
//! ```ignore
//! use blueprint_engine::{BlockRegistry, BlockDescriptor, BlockCategory, VisualNode, VisualKind};
//!
//! let mut registry = BlockRegistry::with_builtins();
//! registry.register_fn(
//!     BlockDescriptor::new("Divider", "Divider", "A horizontal rule", BlockCategory::Display),
//!     |_block, _children, _ctx| VisualNode::new(VisualKind::Text { text: "---".into() }),
//! );
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::blocks;
use crate::descriptor::{BlockCategory, BlockDescriptor};
use crate::render::{RenderContext, VisualNode};
use crate::types::Block;

/// Per-block-type rendering rule
///
/// Receives the block, its already-rendered children and a read-only view
/// of the data bag. Implementations must be pure and must not fail.
pub trait BlockRenderer: Send + Sync {
    fn render(&self, block: &Block, children: Vec<VisualNode>, ctx: &RenderContext<'_>) -> VisualNode;
}

/// Renderer backed by a plain function or closure
pub struct FnBlockRenderer<F> {
    render: F,
}

impl<F> FnBlockRenderer<F>
where
    F: Fn(&Block, Vec<VisualNode>, &RenderContext<'_>) -> VisualNode + Send + Sync,
{
    pub fn new(render: F) -> Self {
        Self { render }
    }
}

impl<F> BlockRenderer for FnBlockRenderer<F>
where
    F: Fn(&Block, Vec<VisualNode>, &RenderContext<'_>) -> VisualNode + Send + Sync,
{
    fn render(&self, block: &Block, children: Vec<VisualNode>, ctx: &RenderContext<'_>) -> VisualNode {
        (self.render)(block, children, ctx)
    }
}

/// A registration entry combining metadata with its renderer
struct RegistryEntry {
    descriptor: BlockDescriptor,
    renderer: Arc<dyn BlockRenderer>,
}

/// Registry of block types
///
/// Holds no mutable state once built; share it behind an `Arc`.
///
/// # Composability
///
/// ```ignore
/// let mut registry = BlockRegistry::with_builtins();
/// registry.merge(custom_blocks); // later entries override built-ins
/// ```
pub struct BlockRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl BlockRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Create a registry holding every built-in block type
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        blocks::register_builtins(&mut registry);
        registry
    }

    /// Register a block type
    pub fn register(&mut self, descriptor: BlockDescriptor, renderer: Arc<dyn BlockRenderer>) {
        if self.entries.contains_key(&descriptor.tag) {
            log::debug!("Replacing renderer for block type '{}'", descriptor.tag);
        }
        self.entries.insert(
            descriptor.tag.clone(),
            RegistryEntry {
                descriptor,
                renderer,
            },
        );
    }

    /// Register a block type backed by a function
    pub fn register_fn<F>(&mut self, descriptor: BlockDescriptor, render: F)
    where
        F: Fn(&Block, Vec<VisualNode>, &RenderContext<'_>) -> VisualNode + Send + Sync + 'static,
    {
        self.register(descriptor, Arc::new(FnBlockRenderer::new(render)));
    }

    /// Get metadata for a block type
    pub fn get_descriptor(&self, tag: &str) -> Option<&BlockDescriptor> {
        self.entries.get(tag).map(|e| &e.descriptor)
    }

    /// Get the renderer for a block type
    pub fn get_renderer(&self, tag: &str) -> Option<Arc<dyn BlockRenderer>> {
        self.entries.get(tag).map(|e| e.renderer.clone())
    }

    /// Get all registered descriptors, sorted by tag
    pub fn all_descriptors(&self) -> Vec<&BlockDescriptor> {
        let mut all: Vec<_> = self.entries.values().map(|e| &e.descriptor).collect();
        all.sort_by(|a, b| a.tag.cmp(&b.tag));
        all
    }

    /// Get descriptors grouped by category
    pub fn descriptors_by_category(&self) -> HashMap<BlockCategory, Vec<&BlockDescriptor>> {
        let mut grouped: HashMap<BlockCategory, Vec<&BlockDescriptor>> = HashMap::new();
        for entry in self.entries.values() {
            grouped
                .entry(entry.descriptor.category)
                .or_default()
                .push(&entry.descriptor);
        }
        grouped
    }

    /// Check if a block type is registered
    pub fn has_block_type(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }

    /// List all registered block type tags
    pub fn block_types(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` override entries in `self` if they share the same tag.
    pub fn merge(&mut self, other: BlockRegistry) {
        self.entries.extend(other.entries);
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{TreeRenderer, VisualKind};
    use crate::types::tags;
    use crate::value::{DataBag, DataKind};

    fn divider() -> BlockDescriptor {
        BlockDescriptor::new("Divider", "Divider", "Horizontal rule", BlockCategory::Display)
    }

    fn rule(_block: &Block, _children: Vec<VisualNode>, _ctx: &RenderContext<'_>) -> VisualNode {
        VisualNode::new(VisualKind::Text {
            text: "---".to_string(),
        })
    }

    #[test]
    fn test_builtins_cover_canonical_tags() {
        let registry = BlockRegistry::with_builtins();
        for tag in [
            tags::STACK,
            tags::ROW,
            tags::CARD,
            tags::HEADER,
            tags::TEXT,
            tags::STAT,
            tags::BTN,
            tags::BTN_ROW,
            tags::TOGGLE,
            tags::TIMER,
            tags::INPUT,
            tags::CHECKLIST,
            tags::DATA_LIST,
        ] {
            assert!(registry.has_block_type(tag), "missing {}", tag);
        }
        assert_eq!(registry.block_types().len(), 13);
        assert_eq!(
            registry.get_descriptor(tags::CHECKLIST).and_then(|d| d.data_kind),
            Some(DataKind::List)
        );
        assert!(registry.get_descriptor(tags::STACK).unwrap().container);
    }

    #[test]
    fn test_register_fn_and_lookup() {
        let mut registry = BlockRegistry::new();
        registry.register_fn(divider(), rule);

        assert!(registry.has_block_type("Divider"));
        assert!(!registry.has_block_type("Stat"));
        assert_eq!(registry.get_descriptor("Divider").unwrap().label, "Divider");
        assert!(registry.get_renderer("Divider").is_some());
    }

    #[test]
    fn test_descriptors_by_category() {
        let registry = BlockRegistry::with_builtins();
        let grouped = registry.descriptors_by_category();
        let layout = grouped.get(&BlockCategory::Layout).unwrap();
        assert_eq!(layout.len(), 3);
        assert_eq!(grouped.get(&BlockCategory::Collection).unwrap().len(), 2);
        assert_eq!(registry.all_descriptors()[0].tag, "Btn");
    }

    #[test]
    fn test_merge_override() {
        let mut registry = BlockRegistry::with_builtins();
        let mut custom = BlockRegistry::new();
        custom.register_fn(
            BlockDescriptor::new(tags::TEXT, "Loud text", "Upper-cased text", BlockCategory::Display),
            |block, _children, _ctx| {
                VisualNode::new(VisualKind::Text {
                    text: block.text().unwrap_or_default().to_uppercase(),
                })
            },
        );
        custom.register_fn(divider(), rule);
        registry.merge(custom);

        assert_eq!(registry.get_descriptor(tags::TEXT).unwrap().label, "Loud text");
        assert_eq!(registry.block_types().len(), 14);

        let renderer = TreeRenderer::new(Arc::new(registry));
        let nodes = renderer.render(
            &[Block::new(tags::TEXT).with_prop("text", "hi"), Block::new("Divider")],
            &DataBag::new(),
        );
        assert_eq!(nodes[0].kind, VisualKind::Text { text: "HI".to_string() });
        assert_eq!(nodes[1].kind, VisualKind::Text { text: "---".to_string() });
    }
}
