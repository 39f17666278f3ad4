//! App repositories
//!
//! The library never touches storage directly; it goes through an
//! [`AppRepository`] that loads and saves the whole app list.
//!
//! # Example
//!
//! ```ignore
//! use microapp_host::{AppRepository, JsonFileAppRepository};
//!
//! let repo = JsonFileAppRepository::new(".microapps/apps.json");
//! let apps = repo.load()?;
//! repo.save(&apps)?;
//! ```

use std::path::{Path, PathBuf};

use blueprint_engine::App;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::Result;

/// Durable storage for the app list
pub trait AppRepository: Send + Sync {
    /// Load every stored app
    fn load(&self) -> Result<Vec<App>>;

    /// Replace the stored app list
    fn save(&self, apps: &[App]) -> Result<()>;
}

/// Repository that keeps apps in memory
#[derive(Debug, Default)]
pub struct MemoryAppRepository {
    apps: Mutex<Vec<App>>,
}

impl MemoryAppRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository pre-filled with apps
    pub fn with_apps(apps: Vec<App>) -> Self {
        Self {
            apps: Mutex::new(apps),
        }
    }

    /// Number of stored apps
    pub fn len(&self) -> usize {
        self.apps.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.lock().is_empty()
    }
}

impl AppRepository for MemoryAppRepository {
    fn load(&self) -> Result<Vec<App>> {
        Ok(self.apps.lock().clone())
    }

    fn save(&self, apps: &[App]) -> Result<()> {
        *self.apps.lock() = apps.to_vec();
        Ok(())
    }
}

/// Repository backed by a single JSON array file
///
/// The file and its parent directory are created on first save.
#[derive(Debug, Clone)]
pub struct JsonFileAppRepository {
    path: PathBuf,
}

impl JsonFileAppRepository {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AppRepository for JsonFileAppRepository {
    /// Load apps from the file
    ///
    /// A missing file is an empty library. Records that fail to decode are
    /// skipped with a warning so one bad entry does not lose the rest.
    fn load(&self) -> Result<Vec<App>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let records: Vec<Value> = serde_json::from_str(&content)?;

        let mut apps = Vec::with_capacity(records.len());
        for record in records {
            match serde_json::from_value::<App>(record) {
                Ok(app) => apps.push(app),
                Err(e) => log::warn!("Skipping unreadable app record in {:?}: {}", self.path, e),
            }
        }
        log::info!("Loaded {} apps from {:?}", apps.len(), self.path);
        Ok(apps)
    }

    fn save(&self, apps: &[App]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(apps)?;
        std::fs::write(&self.path, content)?;
        log::debug!("Saved {} apps to {:?}", apps.len(), self.path);
        Ok(())
    }
}
