//! Periodic tick driver
//!
//! Advances every running timer in a shared [`AppLibrary`] once per fixed
//! interval. Ticks never overlap: a tick that falls due while the previous
//! one is still waiting for the library lock is skipped, not queued.
//! Repository writes run on tokio's blocking pool, so file-backed
//! repositories do not stall the executor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::HostConfig;
use crate::library::AppLibrary;

/// Library handle shared between the UI layer and the driver
pub type SharedLibrary = Arc<RwLock<AppLibrary>>;

/// Background clock for timer-bearing apps
///
/// Stops on [`TickDriver::stop`] or when dropped.
pub struct TickDriver {
    interval: Duration,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TickDriver {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    pub fn from_config(config: &HostConfig) -> Self {
        Self::new(config.tick_interval())
    }

    /// Start ticking the given library
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, library: SharedLibrary) {
        if self.running.swap(true, Ordering::SeqCst) {
            log::warn!("Tick driver already running");
            return;
        }

        let running = self.running.clone();
        let period = self.interval;

        log::info!("Starting tick driver with {}ms interval", period.as_millis());

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the first tick completes immediately
            ticker.tick().await;

            while running.load(Ordering::SeqCst) {
                ticker.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                // the lock is held until the save lands so writes stay ordered
                let mut guard = library.write().await;
                let report = guard.advance();
                if report.is_empty() {
                    continue;
                }
                log::debug!(
                    "Tick advanced {} timers, {} finished",
                    report.advanced.len(),
                    report.finished.len()
                );
                match tokio::task::spawn_blocking(guard.persist_job()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => log::warn!("Tick could not persist apps: {}", e),
                    Err(e) => log::warn!("Tick persist task failed: {}", e),
                }
            }

            log::info!("Tick driver stopped");
        });
        *self.handle.lock() = Some(handle);
    }

    /// Stop ticking
    ///
    /// The background task is aborted; no further tick runs after this returns.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            log::info!("Stopping tick driver");
        }
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for TickDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AppRepository, JsonFileAppRepository, MemoryAppRepository};
    use blueprint_engine::{DataValue, NullEventSink};
    use serde_json::json;

    fn shared_timer(time: i64) -> (SharedLibrary, String) {
        let mut library = AppLibrary::open(
            Arc::new(MemoryAppRepository::new()),
            &HostConfig::default(),
            Arc::new(NullEventSink),
        )
        .unwrap();
        let raw = json!({
            "title": "Tea",
            "archetype": "Regulator",
            "blueprint": [{"type": "Timer"}],
            "data": {"time": time, "is_running": true, "finished": false}
        })
        .to_string();
        let id = library.create_from_response(&raw).unwrap().id;
        (Arc::new(RwLock::new(library)), id)
    }

    async fn remaining(library: &SharedLibrary, id: &str) -> Option<DataValue> {
        library.read().await.get(id).and_then(|a| a.data.get("time").cloned())
    }

    #[tokio::test(start_paused = true)]
    async fn test_counts_down_to_finished() {
        let (library, id) = shared_timer(3);
        let driver = TickDriver::new(Duration::from_secs(1));
        driver.start(library.clone());
        assert!(driver.is_running());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        let data = library.read().await.get(&id).unwrap().data.to_json();
        assert_eq!(data, json!({"time": 0, "is_running": false, "finished": true}));
        driver.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_ticking() {
        let (library, id) = shared_timer(10);
        let driver = TickDriver::new(Duration::from_secs(1));
        driver.start(library.clone());

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(remaining(&library, &id).await, Some(DataValue::Number(8.0)));

        driver.stop();
        assert!(!driver.is_running());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(remaining(&library, &id).await, Some(DataValue::Number(8.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_halts_ticking() {
        let (library, id) = shared_timer(10);
        {
            let driver = TickDriver::new(Duration::from_secs(1));
            driver.start(library.clone());
            tokio::time::sleep(Duration::from_millis(1500)).await;
        }
        assert_eq!(remaining(&library, &id).await, Some(DataValue::Number(9.0)));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(remaining(&library, &id).await, Some(DataValue::Number(9.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_persist_to_file_repository() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(JsonFileAppRepository::new(dir.path().join("apps.json")));
        let mut library = AppLibrary::open(repo.clone(), &HostConfig::default(), Arc::new(NullEventSink)).unwrap();
        let raw = json!({
            "title": "Tea",
            "archetype": "Regulator",
            "blueprint": [{"type": "Timer"}],
            "data": {"time": 5, "is_running": true, "finished": false}
        })
        .to_string();
        let id = library.create_from_response(&raw).unwrap().id;
        let library: SharedLibrary = Arc::new(RwLock::new(library));

        let driver = TickDriver::new(Duration::from_secs(1));
        driver.start(library.clone());
        tokio::time::sleep(Duration::from_millis(2500)).await;
        driver.stop();

        // wait on the lock so an in-flight save has landed
        let in_memory = library.read().await.get(&id).unwrap().data.clone();
        let stored = repo.load().unwrap();
        assert_eq!(stored[0].data, in_memory);
        assert_eq!(stored[0].data.get("time"), Some(&DataValue::Number(3.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_is_ignored() {
        let (library, id) = shared_timer(10);
        let driver = TickDriver::from_config(&HostConfig::default());
        driver.start(library.clone());
        driver.start(library.clone());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(remaining(&library, &id).await, Some(DataValue::Number(9.0)));
    }
}
