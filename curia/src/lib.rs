//! Curia: deterministic core of the Roman Senate simulator
//!
//! This library provides:
//! - Senator records (factions, ranks, validated traits, archetypes)
//! - An event bus with typed debate events and an append-only history
//! - Per-agent memory with relationships, agitation and topic posture
//! - The debate phase machine, speaking order and interruption rule
//! - Vote casting, tallying and tie-break policies
//! - The on-disk topic cache
//!
//! Nothing here performs network I/O. Text generation lives in the
//! `senate-agents` crate, which drives these types from async agents.
//!
//! # Usage
//!
//! ```rust,ignore
//! use curia::events::{event_types, EventBus};
//!
//! let bus = EventBus::new().shared();
//! bus.subscribe_fn(event_types::SPEECH_DELIVERED, |event| {
//!     println!("{} spoke", event.source);
//! });
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod behavior;
pub mod debate;
pub mod events;
pub mod fallback;
pub mod memory;
pub mod senator;
pub mod topics;
pub mod voting;

pub use debate::{may_interrupt, DebatePhase, DebateState, DebateSummary, TurnOrder};
pub use events::{
    event_types, DebateEvent, EventBus, EventHandler, EventHistory, EventPayload, SharedEventBus,
};
pub use fallback::Generated;
pub use memory::{AgentMemory, PostureState};
pub use senator::{generate_roster, Faction, Rank, Senator, SenatorId, Stance, Traits};
pub use topics::{Topic, TopicCache};
pub use voting::{TieBreak, VoteChoice, VoteCounts, VoteOutcome, VotePolicy, VoteRecord, VoteResult};
