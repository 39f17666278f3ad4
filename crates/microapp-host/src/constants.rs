//! Host-wide constants
//!
//! Single source of truth for configuration defaults and file names.

/// Default values for host configuration
pub mod defaults {
    /// Interval between timer ticks
    pub const TICK_INTERVAL_MS: u64 = 1000;
    /// Data snapshots kept per app for undo/redo
    pub const HISTORY_DEPTH: usize = 50;
    /// Label of a list item added without a value
    pub const PLACEHOLDER_LABEL: &str = "New item";
    /// Title used when a response names none
    pub const APP_TITLE: &str = "Untitled app";
}

/// File names inside the host data directory
pub mod paths {
    /// Host configuration file
    pub const CONFIG_FILE: &str = "config.json";
    /// Default app repository file
    pub const APPS_FILE: &str = "apps.json";
}

/// zstd level for history snapshots
pub const SNAPSHOT_COMPRESSION_LEVEL: i32 = 3;
