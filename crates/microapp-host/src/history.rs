//! Undo/redo of local data mutations using compressed snapshots
//!
//! Every data bag produced by a dispatched action is stored as a zstd
//! compressed JSON snapshot. Undo and redo move a cursor over the stack;
//! pushing after an undo discards the redo branch.

use std::collections::VecDeque;

use blueprint_engine::DataBag;

use crate::constants::{defaults, SNAPSHOT_COMPRESSION_LEVEL};
use crate::error::{HostError, Result};

/// Bounded history of one app's data bag
#[derive(Debug, Clone)]
pub struct DataHistory {
    /// Compressed data states (zstd)
    snapshots: VecDeque<Vec<u8>>,
    /// Current position in the stack
    current: usize,
    /// Maximum number of snapshots to keep
    max_snapshots: usize,
}

impl DataHistory {
    /// Create a history keeping at most `max_snapshots` states
    pub fn new(max_snapshots: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            current: 0,
            max_snapshots: max_snapshots.max(1),
        }
    }

    /// Record a new state, dropping any redo branch
    pub fn push(&mut self, data: &DataBag) -> Result<()> {
        let json = serde_json::to_vec(data)?;
        let compressed = zstd::encode_all(&json[..], SNAPSHOT_COMPRESSION_LEVEL)
            .map_err(|e| HostError::Compression(e.to_string()))?;

        self.snapshots.truncate(self.current + 1);
        self.snapshots.push_back(compressed);
        self.current = self.snapshots.len() - 1;

        while self.snapshots.len() > self.max_snapshots {
            self.snapshots.pop_front();
            self.current = self.current.saturating_sub(1);
        }
        Ok(())
    }

    /// Step back one state
    ///
    /// Returns `None` at the oldest state.
    pub fn undo(&mut self) -> Option<Result<DataBag>> {
        if !self.can_undo() {
            return None;
        }
        self.current -= 1;
        Some(self.decompress(self.current))
    }

    /// Step forward one state
    ///
    /// Returns `None` at the newest state.
    pub fn redo(&mut self) -> Option<Result<DataBag>> {
        if !self.can_redo() {
            return None;
        }
        self.current += 1;
        Some(self.decompress(self.current))
    }

    /// The state under the cursor
    pub fn current(&self) -> Option<Result<DataBag>> {
        if self.snapshots.is_empty() {
            None
        } else {
            Some(self.decompress(self.current))
        }
    }

    pub fn can_undo(&self) -> bool {
        self.current > 0
    }

    pub fn can_redo(&self) -> bool {
        self.current + 1 < self.snapshots.len()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Forget every state
    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.current = 0;
    }

    /// Total compressed size of all snapshots
    pub fn compressed_size(&self) -> usize {
        self.snapshots.iter().map(Vec::len).sum()
    }

    fn decompress(&self, index: usize) -> Result<DataBag> {
        let compressed = self
            .snapshots
            .get(index)
            .ok_or_else(|| HostError::Compression(format!("no snapshot at {}", index)))?;
        let json = zstd::decode_all(&compressed[..]).map_err(|e| HostError::Compression(e.to_string()))?;
        Ok(serde_json::from_slice(&json)?)
    }
}

impl Default for DataHistory {
    fn default() -> Self {
        Self::new(defaults::HISTORY_DEPTH)
    }
}
