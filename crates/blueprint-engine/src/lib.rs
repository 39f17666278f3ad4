//! Blueprint Engine - interpretation and local mutation of generated micro-apps
//!
//! A generated micro-app is a blueprint (a tree of blocks) plus a data bag.
//! This crate turns both into something a host UI can show and keeps the
//! data moving without another round trip to the generator:
//!
//! - Normalizing inconsistent blueprints (synonym tags, aliased properties)
//! - Rendering blueprints into a visual tree with action bindings
//! - Applying a closed set of operations to schema-less data, healing
//!   mismatched key names along the way
//! - Advancing running countdowns once per tick
//!
//! # Architecture
//!
//! - `BlockRegistry`: tag → renderer and descriptor; unknown tags degrade to
//!   a diagnostic node
//! - `TreeRenderer`: pure, synchronous walk over a blueprint
//! - `MutationEngine`: stateless `(action, payload, data) -> data'`
//! - `EventSink`: diagnostics for healed keys, stale indices, abandoned
//!   operations and unknown blocks
//!
//! Everything here is synchronous. Scheduling ticks and persisting apps is
//! up to the host.
//!
//! # Example
//!
//! ```ignore
//! use blueprint_engine::{ActionInvocation, ActionPayload, DataBag, FormState, MutationEngine};
//!
//! let engine = MutationEngine::new();
//! let data: DataBag = serde_json::from_str(r#"{"count": 5}"#)?;
//! let invocation = ActionInvocation::new("increment-count", ActionPayload::for_key("count").with_amount(3.0));
//! let next = engine.apply(&invocation, &data, &FormState::new())?;
//! assert_eq!(next.data.to_json(), serde_json::json!({"count": 8}));
//! ```

pub mod blocks;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod forms;
pub mod heal;
pub mod mutation;
pub mod normalizer;
pub mod registry;
pub mod render;
pub mod tick;
pub mod types;
pub mod value;

// Re-export key types
pub use descriptor::{BlockCategory, BlockDescriptor};
pub use error::{BlueprintError, Result};
pub use events::{EngineEvent, EventError, EventSink, HealStrategy, LogEventSink, NullEventSink, VecEventSink};
pub use forms::{input_ref, FormState};
pub use heal::HealingPolicy;
pub use mutation::{Mutation, MutationEngine, MutationOutcome, Operation};
pub use normalizer::{normalize_block, normalize_blueprint};
pub use registry::{BlockRegistry, BlockRenderer};
pub use render::{EventBinding, RenderContext, TreeRenderer, UiEvent, VisualItem, VisualKind, VisualNode};
pub use tick::{advance_apps, advance_timer, TickReport, TickResult};
pub use types::{tags, ActionInvocation, ActionPayload, App, Archetype, Block};
pub use value::{DataBag, DataKind, DataValue, ListItem};
