//! Micro-app host - the layer around the blueprint engine
//!
//! This crate keeps generated micro-apps alive between generator calls:
//!
//! - Decoding generator responses, including best-effort JSON recovery
//! - An app library with create / update / delete / render / dispatch
//! - Pluggable persistence through `AppRepository`
//! - Undo/redo of local data changes with compressed snapshots
//! - A tokio-driven clock that advances running timers
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use microapp_host::{AppLibrary, HostConfig, JsonFileAppRepository, TickDriver};
//! use blueprint_engine::LogEventSink;
//! use tokio::sync::RwLock;
//!
//! let config = HostConfig::load(data_dir).await?;
//! let repo = Arc::new(JsonFileAppRepository::new(data_dir.join("apps.json")));
//! let library = Arc::new(RwLock::new(AppLibrary::open(repo, &config, Arc::new(LogEventSink))?));
//!
//! let driver = TickDriver::from_config(&config);
//! driver.start(library.clone());
//! ```

pub mod config;
pub mod constants;
pub mod driver;
pub mod error;
pub mod history;
pub mod library;
pub mod response;
pub mod store;

// Re-export key types
pub use config::{ConfigError, HostConfig};
pub use driver::{SharedLibrary, TickDriver};
pub use error::{HostError, Result};
pub use history::DataHistory;
pub use library::AppLibrary;
pub use response::{decode_response, GeneratedApp};
pub use store::{AppRepository, JsonFileAppRepository, MemoryAppRepository};
