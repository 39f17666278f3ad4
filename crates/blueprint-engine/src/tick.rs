//! Timer fields and per-tick advancement
//!
//! A countdown lives in three data entries: a numeric time field, a running
//! flag and a finished flag. Both the timer operations and the periodic tick
//! locate them the same way, so a timer started by a button is the timer the
//! tick advances.
//!
//! This module holds the synchronous part of the tick. Scheduling it on a
//! fixed interval is the host's job.

use crate::events::{emit, EngineEvent, EventSink};
use crate::heal::{resolve_key, FieldQuery, HealingPolicy, ResolvedKey};
use crate::types::App;
use crate::value::{DataBag, DataKind, DataValue};

/// Conventional names of the remaining-time field
pub const TIME_KEYS: &[&str] = &["time", "seconds", "remaining", "timeLeft"];

/// Conventional names of the running flag
pub const RUNNING_KEYS: &[&str] = &["is_running", "isRunning", "running"];

/// Conventional names of the finished flag
pub const FINISHED_KEYS: &[&str] = &["finished", "is_finished", "isFinished", "done"];

/// The three entries that make up a timer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerFields {
    pub time: ResolvedKey,
    pub running: ResolvedKey,
    pub finished: ResolvedKey,
}

impl TimerFields {
    /// Locate the timer entries in a bag
    ///
    /// `running_key` and `time_key` are keys requested by an action payload.
    pub fn locate(
        data: &DataBag,
        running_key: Option<&str>,
        time_key: Option<&str>,
        policy: HealingPolicy,
    ) -> Self {
        let time = resolve_key(
            data,
            FieldQuery::new(time_key, DataKind::Number, TIME_KEYS[0]).with_conventions(TIME_KEYS),
            policy,
        );
        let running = resolve_key(
            data,
            FieldQuery::new(running_key, DataKind::Boolean, RUNNING_KEYS[0])
                .with_conventions(RUNNING_KEYS)
                .excluding(FINISHED_KEYS),
            policy,
        );
        let finished = resolve_key(
            data,
            FieldQuery::new(None, DataKind::Boolean, FINISHED_KEYS[0])
                .with_conventions(FINISHED_KEYS)
                .without_type_match(),
            policy,
        );
        Self {
            time,
            running,
            finished,
        }
    }

    /// Create any missing entries with their defaults
    pub fn ensure(&self, data: &mut DataBag) {
        self.time.ensure(data, DataKind::Number);
        self.running.ensure(data, DataKind::Boolean);
        self.finished.ensure(data, DataKind::Boolean);
    }

    pub fn is_running(&self, data: &DataBag) -> bool {
        data.get(&self.running.key)
            .map(DataValue::as_bool_lossy)
            .unwrap_or(false)
    }

    pub fn remaining(&self, data: &DataBag) -> f64 {
        data.get(&self.time.key)
            .map(DataValue::as_number_lossy)
            .unwrap_or(0.0)
    }
}

/// Result of advancing one timer by one tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickResult {
    /// Still counting down
    Advanced(DataBag),
    /// Reached zero on this tick
    Finished(DataBag),
}

impl TickResult {
    pub fn data(&self) -> &DataBag {
        match self {
            TickResult::Advanced(data) | TickResult::Finished(data) => data,
        }
    }

    pub fn into_data(self) -> DataBag {
        match self {
            TickResult::Advanced(data) | TickResult::Finished(data) => data,
        }
    }
}

/// Advance a running timer by one unit
///
/// Returns `None` when the bag has no running timer. The input is left
/// untouched; a new bag is returned.
pub fn advance_timer(data: &DataBag) -> Option<TickResult> {
    let fields = TimerFields::locate(data, None, None, HealingPolicy::PreferRequested);
    if fields.running.is_created() || !fields.is_running(data) {
        return None;
    }

    let mut next = data.clone();
    fields.ensure(&mut next);
    let remaining = (fields.remaining(data) - 1.0).max(0.0);
    next.insert(fields.time.key.clone(), remaining);

    if remaining <= 0.0 {
        next.insert(fields.running.key.clone(), false);
        next.insert(fields.finished.key.clone(), true);
        Some(TickResult::Finished(next))
    } else {
        Some(TickResult::Advanced(next))
    }
}

/// Summary of one tick across a set of apps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Apps whose timer moved
    pub advanced: Vec<String>,
    /// Apps whose timer reached zero on this tick (also in `advanced`)
    pub finished: Vec<String>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.advanced.is_empty()
    }
}

/// Advance every running timer among `apps` by one unit
///
/// Only timer-bearing apps are considered.
pub fn advance_apps(apps: &mut [App], events: &dyn EventSink) -> TickReport {
    let mut report = TickReport::default();
    for app in apps.iter_mut().filter(|a| a.is_timer_bearing()) {
        let Some(result) = advance_timer(&app.data) else {
            continue;
        };
        report.advanced.push(app.id.clone());
        if let TickResult::Finished(_) = result {
            log::info!("Timer finished for app '{}' ({})", app.title, app.id);
            report.finished.push(app.id.clone());
            emit(
                events,
                EngineEvent::TimerFinished {
                    app_id: app.id.clone(),
                },
            );
        }
        app.data = result.into_data();
    }
    report
}
