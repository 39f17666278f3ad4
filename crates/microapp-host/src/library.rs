//! The app library
//!
//! Owns the persisted app list and ties the engine pieces together:
//! generator responses come in through [`AppLibrary::create_from_response`]
//! and [`AppLibrary::update_from_response`], user actions through
//! [`AppLibrary::dispatch`], and the periodic clock through
//! [`AppLibrary::tick`]. Every change is written through the repository.

use std::collections::HashMap;
use std::sync::Arc;

use blueprint_engine::{
    advance_apps, normalize_blueprint, ActionInvocation, App, BlockRegistry, EventSink, FormState, Mutation,
    MutationEngine, TickReport, TreeRenderer, VisualNode,
};

use crate::config::HostConfig;
use crate::error::{HostError, Result};
use crate::history::DataHistory;
use crate::response::{decode_response, GeneratedApp};
use crate::store::AppRepository;

/// Persisted micro-apps plus the engine that drives them
pub struct AppLibrary {
    apps: Vec<App>,
    repository: Arc<dyn AppRepository>,
    engine: MutationEngine,
    renderer: TreeRenderer,
    events: Arc<dyn EventSink>,
    histories: HashMap<String, DataHistory>,
    history_depth: usize,
}

impl AppLibrary {
    /// Open a library, loading every app the repository holds
    pub fn open(repository: Arc<dyn AppRepository>, config: &HostConfig, events: Arc<dyn EventSink>) -> Result<Self> {
        let apps = repository.load()?;
        log::info!("Opened app library with {} apps", apps.len());

        let engine = MutationEngine::new()
            .with_policy(config.healing_policy)
            .with_placeholder_label(config.placeholder_label.clone())
            .with_event_sink(events.clone());
        let renderer =
            TreeRenderer::new(Arc::new(BlockRegistry::with_builtins())).with_event_sink(events.clone());

        let mut library = Self {
            apps,
            repository,
            engine,
            renderer,
            events,
            histories: HashMap::new(),
            history_depth: config.history_depth,
        };
        for index in 0..library.apps.len() {
            let (id, data) = (library.apps[index].id.clone(), library.apps[index].data.clone());
            library.history_for(&id).push(&data)?;
        }
        Ok(library)
    }

    /// All apps, in creation order
    pub fn list(&self) -> &[App] {
        &self.apps
    }

    pub fn get(&self, id: &str) -> Option<&App> {
        self.apps.iter().find(|a| a.id == id)
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    /// Create an app from a generator response
    pub fn create_from_response(&mut self, raw: &str) -> Result<App> {
        let generated = decode_response(raw)?;
        let app = ingest(generated, None);
        log::info!("Created app '{}' ({})", app.title, app.id);

        self.history_for(&app.id).push(&app.data)?;
        self.apps.push(app.clone());
        self.persist()?;
        Ok(app)
    }

    /// Replace an app's title, blueprint and data with a new response
    ///
    /// Local history is discarded; the new data becomes the only state.
    pub fn update_from_response(&mut self, id: &str, raw: &str) -> Result<App> {
        let index = self.index_of(id)?;
        let generated = decode_response(raw)?;
        let app = ingest(generated, Some(id.to_string()));
        log::info!("Updated app '{}' ({})", app.title, app.id);

        let history = self.history_for(id);
        history.clear();
        history.push(&app.data)?;
        self.apps[index] = app.clone();
        self.persist()?;
        Ok(app)
    }

    /// Remove an app
    pub fn delete(&mut self, id: &str) -> Result<App> {
        let index = self.index_of(id)?;
        let removed = self.apps.remove(index);
        self.histories.remove(id);
        self.persist()?;
        log::info!("Deleted app '{}' ({})", removed.title, removed.id);
        Ok(removed)
    }

    /// Render an app's blueprint against its current data
    pub fn render(&self, id: &str) -> Result<Vec<VisualNode>> {
        let app = self.get(id).ok_or_else(|| HostError::AppNotFound(id.to_string()))?;
        Ok(self.renderer.render(&app.blueprint, &app.data))
    }

    /// Apply a user action to an app's data
    ///
    /// The app keeps the resulting data whenever it differs from the
    /// previous bag (this includes no-ops that healed a key).
    pub fn dispatch(&mut self, id: &str, invocation: &ActionInvocation, forms: &FormState) -> Result<Mutation> {
        let index = self.index_of(id)?;
        let mutation = self.engine.apply(invocation, &self.apps[index].data, forms)?;

        if mutation.data != self.apps[index].data {
            self.apps[index].data = mutation.data.clone();
            self.history_for(id).push(&mutation.data)?;
            self.persist()?;
        }
        Ok(mutation)
    }

    /// Restore the data before the last change
    ///
    /// Returns `false` when there is nothing to undo.
    pub fn undo(&mut self, id: &str) -> Result<bool> {
        let index = self.index_of(id)?;
        match self.history_for(id).undo() {
            Some(data) => {
                self.apps[index].data = data?;
                self.persist()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Re-apply an undone change
    pub fn redo(&mut self, id: &str) -> Result<bool> {
        let index = self.index_of(id)?;
        match self.history_for(id).redo() {
            Some(data) => {
                self.apps[index].data = data?;
                self.persist()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Advance every running timer by one unit and persist any change
    ///
    /// Ticks are not recorded in the undo history.
    pub fn tick(&mut self) -> Result<TickReport> {
        let report = self.advance();
        if !report.is_empty() {
            self.persist()?;
        }
        Ok(report)
    }

    /// Advance every running timer by one unit without persisting
    pub fn advance(&mut self) -> TickReport {
        advance_apps(&mut self.apps, self.events.as_ref())
    }

    /// Write the app list through the repository
    pub fn persist(&self) -> Result<()> {
        self.repository.save(&self.apps)
    }

    /// A detached save of the current app list
    ///
    /// For running the repository write off the async executor, e.g. with
    /// `tokio::task::spawn_blocking`.
    pub fn persist_job(&self) -> impl FnOnce() -> Result<()> + Send + 'static {
        let repository = self.repository.clone();
        let apps = self.apps.clone();
        move || repository.save(&apps)
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.apps
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| HostError::AppNotFound(id.to_string()))
    }

    fn history_for(&mut self, id: &str) -> &mut DataHistory {
        let depth = self.history_depth;
        self.histories
            .entry(id.to_string())
            .or_insert_with(|| DataHistory::new(depth))
    }
}

/// Build an app record from a decoded response
fn ingest(generated: GeneratedApp, id: Option<String>) -> App {
    let GeneratedApp {
        title,
        archetype,
        blueprint,
        mut data,
    } = generated;
    let assigned = data.assign_missing_item_ids();
    if assigned > 0 {
        log::debug!("Assigned {} list item ids", assigned);
    }

    let mut app = App::new(title, archetype, normalize_blueprint(&blueprint), data);
    if let Some(id) = id {
        app.id = id;
    }
    app
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{JsonFileAppRepository, MemoryAppRepository};
    use blueprint_engine::{
        tags, ActionPayload, BlueprintError, DataValue, EngineEvent, MutationOutcome, UiEvent, VecEventSink,
        VisualKind,
    };
    use serde_json::json;

    fn counter_response() -> String {
        json!({
            "title": "Water",
            "archetype": "Accumulator",
            "blueprint": [
                {"type": "Metric", "label": "Cups", "key": "cups"},
                {"type": "Button", "label": "+1", "action": "increment-count", "key": "cups"}
            ],
            "data": {"cups": 0}
        })
        .to_string()
    }

    fn timer_response(time: i64, running: bool) -> String {
        json!({
            "title": "Tea",
            "archetype": "Regulator",
            "blueprint": [{"type": "Countdown", "label": "Steep"}],
            "data": {"time": time, "is_running": running, "finished": false}
        })
        .to_string()
    }

    fn library() -> (AppLibrary, Arc<MemoryAppRepository>, Arc<VecEventSink>) {
        let repo = Arc::new(MemoryAppRepository::new());
        let events = Arc::new(VecEventSink::new());
        let library = AppLibrary::open(repo.clone(), &HostConfig::default(), events.clone()).unwrap();
        (library, repo, events)
    }

    fn press(library: &AppLibrary, id: &str, index: usize) -> ActionInvocation {
        let nodes = library.render(id).unwrap();
        nodes[index].binding(&UiEvent::Press).unwrap().clone()
    }

    #[test]
    fn test_create_normalizes_and_persists() {
        let (mut library, repo, _) = library();
        let app = library.create_from_response(&counter_response()).unwrap();

        assert_eq!(app.blueprint[0].block_type, tags::STAT);
        assert_eq!(app.blueprint[1].block_type, tags::BTN);
        assert_eq!(repo.len(), 1);
        assert_eq!(library.get(&app.id), Some(&app));
    }

    #[test]
    fn test_create_assigns_item_ids() {
        let (mut library, _, _) = library();
        let raw = json!({
            "title": "Todo",
            "blueprint": [{"type": "Checklist", "key": "items"}],
            "data": {"items": ["a", {"label": "b"}]}
        })
        .to_string();
        let app = library.create_from_response(&raw).unwrap();
        let items = app.data.get("items").and_then(DataValue::as_list).unwrap();
        assert!(items.iter().all(|i| i.id.is_some()));
    }

    #[test]
    fn test_malformed_response_adds_nothing() {
        let (mut library, repo, _) = library();
        assert!(matches!(
            library.create_from_response("no app here"),
            Err(HostError::MalformedResponse(_))
        ));
        assert!(library.is_empty());
        assert!(repo.is_empty());
    }

    #[test]
    fn test_dispatch_rendered_binding() {
        let (mut library, repo, _) = library();
        let app = library.create_from_response(&counter_response()).unwrap();

        let invocation = press(&library, &app.id, 1);
        let mutation = library.dispatch(&app.id, &invocation, &FormState::new()).unwrap();
        assert_eq!(mutation.outcome, MutationOutcome::Applied);

        let nodes = library.render(&app.id).unwrap();
        match &nodes[0].kind {
            VisualKind::Stat { value, .. } => assert_eq!(value, &DataValue::Number(1.0)),
            other => panic!("expected stat, got {:?}", other),
        }
        assert_eq!(repo.load().unwrap()[0].data.to_json(), json!({"cups": 1}));
    }

    #[test]
    fn test_dispatch_unknown_operation_is_error() {
        let (mut library, _, _) = library();
        let app = library.create_from_response(&counter_response()).unwrap();
        let err = library
            .dispatch(
                &app.id,
                &ActionInvocation::new("summon", ActionPayload::default()),
                &FormState::new(),
            )
            .unwrap_err();
        assert!(matches!(err, HostError::Engine(BlueprintError::UnknownOperation(_))));
    }

    #[test]
    fn test_abandoned_dispatch_keeps_data() {
        let (mut library, _, events) = library();
        let app = library.create_from_response(&counter_response()).unwrap();
        let invocation = ActionInvocation::new(
            "set-value",
            ActionPayload::for_key("cups").with_value(blueprint_engine::input_ref("amount")),
        );
        let mutation = library.dispatch(&app.id, &invocation, &FormState::new()).unwrap();
        assert!(matches!(mutation.outcome, MutationOutcome::Abandoned { .. }));
        assert_eq!(library.get(&app.id).unwrap().data, app.data);
        assert!(events
            .events()
            .iter()
            .any(|e| matches!(e, EngineEvent::InputUnresolved { .. })));
    }

    #[test]
    fn test_undo_redo() {
        let (mut library, _, _) = library();
        let app = library.create_from_response(&counter_response()).unwrap();
        let invocation = press(&library, &app.id, 1);
        for _ in 0..3 {
            library.dispatch(&app.id, &invocation, &FormState::new()).unwrap();
        }
        let cups = |library: &AppLibrary| library.get(&app.id).unwrap().data.get("cups").cloned();

        assert_eq!(cups(&library), Some(DataValue::Number(3.0)));
        assert!(library.undo(&app.id).unwrap());
        assert!(library.undo(&app.id).unwrap());
        assert_eq!(cups(&library), Some(DataValue::Number(1.0)));
        assert!(library.redo(&app.id).unwrap());
        assert_eq!(cups(&library), Some(DataValue::Number(2.0)));

        assert!(library.undo(&app.id).unwrap());
        assert!(library.undo(&app.id).unwrap());
        assert!(!library.undo(&app.id).unwrap());
        assert_eq!(cups(&library), Some(DataValue::Number(0.0)));
    }

    #[test]
    fn test_update_replaces_wholesale() {
        let (mut library, _, _) = library();
        let app = library.create_from_response(&counter_response()).unwrap();
        let invocation = press(&library, &app.id, 1);
        library.dispatch(&app.id, &invocation, &FormState::new()).unwrap();

        let updated = library.update_from_response(&app.id, &timer_response(30, false)).unwrap();
        assert_eq!(updated.id, app.id);
        assert_eq!(updated.title, "Tea");
        assert_eq!(updated.blueprint[0].block_type, tags::TIMER);
        assert!(updated.data.get("cups").is_none());
        assert!(!library.undo(&app.id).unwrap());
    }

    #[test]
    fn test_delete() {
        let (mut library, repo, _) = library();
        let app = library.create_from_response(&counter_response()).unwrap();
        library.delete(&app.id).unwrap();
        assert!(library.get(&app.id).is_none());
        assert!(repo.is_empty());
        assert!(matches!(library.delete(&app.id), Err(HostError::AppNotFound(_))));
        assert!(matches!(library.render(&app.id), Err(HostError::AppNotFound(_))));
    }

    #[test]
    fn test_tick_advances_running_timers_only() {
        let (mut library, _, events) = library();
        let running = library.create_from_response(&timer_response(2, true)).unwrap();
        let paused = library.create_from_response(&timer_response(2, false)).unwrap();
        let counter = library.create_from_response(&counter_response()).unwrap();

        let report = library.tick().unwrap();
        assert_eq!(report.advanced, vec![running.id.clone()]);
        assert_eq!(library.get(&paused.id).unwrap().data, paused.data);
        assert_eq!(library.get(&counter.id).unwrap().data, counter.data);

        let report = library.tick().unwrap();
        assert_eq!(report.finished, vec![running.id.clone()]);
        assert_eq!(
            library.get(&running.id).unwrap().data.to_json(),
            json!({"time": 0, "is_running": false, "finished": true})
        );
        assert!(events
            .events()
            .contains(&EngineEvent::TimerFinished { app_id: running.id.clone() }));
        assert!(library.tick().unwrap().is_empty());
    }

    #[test]
    fn test_persist_job_saves_snapshot() {
        let (mut library, repo, _) = library();
        let id = library.create_from_response(&timer_response(4, true)).unwrap().id;
        let job = library.persist_job();

        let report = library.advance();
        assert_eq!(report.advanced, vec![id.clone()]);
        assert_eq!(repo.load().unwrap()[0].data.get("time"), Some(&DataValue::Number(4.0)));

        job().unwrap();
        assert_eq!(repo.load().unwrap()[0].data.get("time"), Some(&DataValue::Number(4.0)));
        library.persist_job()().unwrap();
        assert_eq!(repo.load().unwrap()[0].data.get("time"), Some(&DataValue::Number(3.0)));
    }

    #[test]
    fn test_reopen_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(JsonFileAppRepository::new(dir.path().join("apps.json")));
        let config = HostConfig::default();

        let id = {
            let mut library = AppLibrary::open(repo.clone(), &config, Arc::new(VecEventSink::new())).unwrap();
            let app = library.create_from_response(&counter_response()).unwrap();
            let invocation = press(&library, &app.id, 1);
            library.dispatch(&app.id, &invocation, &FormState::new()).unwrap();
            app.id
        };

        let library = AppLibrary::open(repo, &config, Arc::new(VecEventSink::new())).unwrap();
        assert_eq!(library.len(), 1);
        assert_eq!(library.get(&id).unwrap().data.to_json(), json!({"cups": 1}));
    }
}
