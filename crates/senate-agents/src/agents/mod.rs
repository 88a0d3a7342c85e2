//! Event-driven agents that take part in a debate.

pub mod senator;

pub use senator::{AgentSettings, ComposedSpeech, SenatorAgent};
