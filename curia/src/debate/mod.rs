//! Debate Orchestration: phases, floor and interruption rule
//!
//! # Debate Flow
//!
//! ```text
//! Idle → Opening → Speaking → Voting → Concluded
//!   │       │      (rounds)      │
//!   │       │         │          │
//!   └───────┴─────────┴──────────┴─ abort at any point → Aborted
//! ```
//!
//! During `Speaking`, a senator may interrupt the current speaker only if
//! its rank is at least the speaker's. Interjections that fail the rule
//! are still recorded, marked as not permitted.

pub mod ledger;
pub mod state;
pub mod turns;

pub use state::{
    DebateError, DebatePhase, DebateState, DebateSummary, DebateTransition, Floor,
    InterjectionRecord, SpeechRecord, TransitionError,
};
pub use ledger::RelationshipLedger;
pub use turns::{may_interrupt, presiding_magistrate, TurnOrder};
