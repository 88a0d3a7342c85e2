//! Senate agents: LLM-backed senators, debate manager and session runner
//!
//! Builds on the deterministic `curia` core:
//! - `llm`: provider trait with OpenAI, local server and mock backends
//! - `agents`: event-driven senator agents
//! - `manager`: rounds, floor and interjection rulings for one debate
//! - `session`: the full sitting from opening ceremony to adjournment
//! - `topic_source`: agenda topics from cache, model or fallback list
//! - `bridge`: wire frames and JSONL transcripts for observers

pub mod agents;
pub mod bridge;
pub mod config;
pub mod llm;
pub mod manager;
pub mod prompts;
pub mod session;
pub mod topic_source;

pub use agents::SenatorAgent;
pub use bridge::{EventBridge, WireEvent};
pub use config::{ProviderKind, SenateConfig};
pub use llm::{create_provider, LlmProvider, LlmSet, ModelTier};
pub use manager::{DebateConfig, DebateManager};
pub use session::{SenateSession, SessionConfig, SessionError, SessionReport};
pub use topic_source::TopicSource;
