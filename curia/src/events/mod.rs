//! Event-driven coordination for the debate chamber
//!
//! # Architecture
//!
//! 1. **Event Types** (`types.rs`): `DebateEvent` and its typed payloads,
//!    each mapping to a dotted event type such as `debate.speech_delivered`.
//!
//! 2. **Event Bus** (`bus.rs`): per-type dispatch table of async handlers
//!    plus a Tokio broadcast tap for observers.
//!
//! 3. **Event History** (`history.rs`): append-only log with filtered queries.
//!
//! # Event Flow
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │   Producer   │────▶│  Event Bus   │────▶│ Handlers (typed) │
//! │  (publish)   │     │  (dispatch)  │     │  in order, once  │
//! └──────────────┘     └──────┬───────┘     └──────────────────┘
//!                             │
//!                ┌────────────┴────────────┐
//!                ▼                         ▼
//!         ┌──────────────┐          ┌──────────────┐
//!         │   History    │          │  Tap (bridge │
//!         │  (append)    │          │  transcript) │
//!         └──────────────┘          └──────────────┘
//! ```

pub mod bus;
pub mod history;
pub mod types;

pub use bus::{
    EventBus, EventBusError, EventBusResult, EventFilter, EventHandler, FilteredTap, FnHandler,
    PublishReport, SharedEventBus, SubscriptionId,
};
pub use history::{EventHistory, EventStats, SharedEventHistory};
pub use types::{
    event_types, ContentOrigin, DebateEvent, EventId, EventPayload, InterjectionKind,
    ReactionKind, TopicId,
};
