//! Block descriptor metadata
//!
//! Each registered block type carries a descriptor: what it is called, how it
//! is grouped, whether it nests children, and which kind of data entry it
//! binds to. The renderer uses the bound kind to pick a default when the
//! referenced entry is missing.

use serde::{Deserialize, Serialize};

use crate::value::DataKind;

/// Grouping of block types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockCategory {
    /// Containers that stack or group children
    Layout,
    /// Read-only text and values
    Display,
    /// Buttons, toggles, text entry
    Control,
    /// List-backed blocks
    Collection,
    /// Diagnostic output for unrecognized tags
    Diagnostic,
}

/// Complete metadata for a block type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDescriptor {
    /// Canonical type tag (e.g., "Stat")
    pub tag: String,
    /// Human-readable label
    pub label: String,
    pub description: String,
    pub category: BlockCategory,
    /// Whether the block renders nested children
    pub container: bool,
    /// Kind of data entry referenced through the `key` property
    pub data_kind: Option<DataKind>,
}

impl BlockDescriptor {
    /// Create a descriptor for a leaf block with no data binding
    pub fn new(
        tag: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
        category: BlockCategory,
    ) -> Self {
        Self {
            tag: tag.into(),
            label: label.into(),
            description: description.into(),
            category,
            container: false,
            data_kind: None,
        }
    }

    /// Mark the block as a container
    pub fn container(mut self) -> Self {
        self.container = true;
        self
    }

    /// Bind the block to a data entry of the given kind
    pub fn bound_to(mut self, kind: DataKind) -> Self {
        self.data_kind = Some(kind);
        self
    }
}
