//! Debate state machine: phases, transitions, and per-debate tracking.
//!
//! `DebateState` holds everything that lives for the length of one debate:
//! who holds the floor and what has been said. It also carries the shared
//! relationship ledger, which passes from one debate to the next. It is
//! owned by a single manager; nothing here is global.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ledger::RelationshipLedger;
use crate::events::{ContentOrigin, InterjectionKind, TopicId};
use crate::senator::{Rank, SenatorId, Stance};

/// Phase of a debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebatePhase {
    /// Created but not started.
    Idle,
    /// Topic introduced; senators are deciding stances.
    Opening,
    /// Rounds of speeches in progress.
    Speaking,
    /// Chamber is voting.
    Voting,
    /// Votes tallied.
    Concluded,
    /// Stopped early.
    Aborted,
}

impl DebatePhase {
    /// Whether this is a terminal phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Concluded | Self::Aborted)
    }

    /// Valid transitions from this phase.
    pub fn valid_transitions(self) -> &'static [DebatePhase] {
        match self {
            Self::Idle => &[Self::Opening, Self::Aborted],
            Self::Opening => &[Self::Speaking, Self::Aborted],
            Self::Speaking => &[Self::Voting, Self::Aborted],
            Self::Voting => &[Self::Concluded, Self::Aborted],
            Self::Concluded | Self::Aborted => &[],
        }
    }
}

impl std::fmt::Display for DebatePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Opening => write!(f, "opening"),
            Self::Speaking => write!(f, "speaking"),
            Self::Voting => write!(f, "voting"),
            Self::Concluded => write!(f, "concluded"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// A phase transition record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateTransition {
    pub from: DebatePhase,
    pub to: DebatePhase,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// Error for invalid state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: DebatePhase,
    pub to: DebatePhase,
    pub reason: String,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid transition {} → {}: {}",
            self.from, self.to, self.reason
        )
    }
}

impl std::error::Error for TransitionError {}

/// Error from debate bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebateError {
    /// State transition failed.
    TransitionFailed(TransitionError),
    /// All rounds have been spoken.
    NoRoundsRemaining { max_rounds: u32 },
    /// Invalid operation for current phase.
    InvalidPhase {
        expected: DebatePhase,
        actual: DebatePhase,
    },
}

impl std::fmt::Display for DebateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TransitionFailed(e) => write!(f, "transition failed: {}", e),
            Self::NoRoundsRemaining { max_rounds } => {
                write!(f, "all {} rounds already spoken", max_rounds)
            }
            Self::InvalidPhase { expected, actual } => {
                write!(f, "expected phase {}, got {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for DebateError {}

impl From<TransitionError> for DebateError {
    fn from(e: TransitionError) -> Self {
        Self::TransitionFailed(e)
    }
}

/// A delivered speech.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechRecord {
    pub round: u32,
    pub speaker: SenatorId,
    pub stance: Stance,
    pub quality: f64,
    pub origin: ContentOrigin,
    pub content: String,
}

/// An interjection and how it was ruled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterjectionRecord {
    pub round: u32,
    pub interjector: SenatorId,
    pub speaker: SenatorId,
    pub kind: InterjectionKind,
    /// Whether the interjector's rank allowed it to disrupt the speaker.
    pub permitted: bool,
}

/// Who holds the floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Floor {
    pub speaker: SenatorId,
    pub rank: Rank,
}

/// Compact summary of a finished debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateSummary {
    pub topic: TopicId,
    pub title: String,
    pub final_phase: DebatePhase,
    pub rounds_completed: u32,
    pub speeches: u32,
    pub reactions: u32,
    pub interjections: u32,
    pub permitted_interjections: u32,
    pub stance_changes: u32,
    /// Final stance of each senator.
    pub stances: BTreeMap<SenatorId, Stance>,
    /// Ledger as it stood when the debate ended, earlier debates included.
    pub relationships: RelationshipLedger,
}

/// State of one debate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateState {
    pub topic: TopicId,
    pub title: String,
    pub phase: DebatePhase,
    pub current_round: u32,
    pub max_rounds: u32,
    pub floor: Option<Floor>,
    pub speeches: Vec<SpeechRecord>,
    pub interjections: Vec<InterjectionRecord>,
    pub reactions: u32,
    pub stance_changes: u32,
    pub stances: HashMap<SenatorId, Stance>,
    pub transitions: Vec<DebateTransition>,
    pub relationships: RelationshipLedger,
    pub created_at: DateTime<Utc>,
}

impl DebateState {
    pub fn new(topic: &str, title: &str, max_rounds: u32) -> Self {
        Self {
            topic: topic.to_string(),
            title: title.to_string(),
            phase: DebatePhase::Idle,
            current_round: 0,
            max_rounds,
            floor: None,
            speeches: Vec::new(),
            interjections: Vec::new(),
            reactions: 0,
            stance_changes: 0,
            stances: HashMap::new(),
            transitions: Vec::new(),
            relationships: RelationshipLedger::new(),
            created_at: Utc::now(),
        }
    }

    /// Fresh state for the next topic. The relationship ledger moves over.
    pub fn next_debate(&mut self, topic: &str, title: &str, max_rounds: u32) -> DebateState {
        let mut next = DebateState::new(topic, title, max_rounds);
        next.relationships = std::mem::take(&mut self.relationships);
        next
    }

    /// Transition to a new phase with a reason.
    pub fn transition(&mut self, to: DebatePhase, reason: &str) -> Result<(), TransitionError> {
        if !self.phase.valid_transitions().contains(&to) {
            return Err(TransitionError {
                from: self.phase,
                to,
                reason: format!(
                    "not a valid transition (allowed: {:?})",
                    self.phase.valid_transitions()
                ),
            });
        }

        self.transitions.push(DebateTransition {
            from: self.phase,
            to,
            timestamp: Utc::now(),
            reason: reason.to_string(),
        });
        self.phase = to;

        if to.is_terminal() || to == DebatePhase::Voting {
            self.floor = None;
        }
        Ok(())
    }

    /// Abort from any non-terminal phase.
    pub fn abort(&mut self, reason: &str) -> Result<(), TransitionError> {
        self.transition(DebatePhase::Aborted, reason)
    }

    /// Start the next round of speeches; returns its number (1-indexed).
    pub fn begin_round(&mut self) -> Result<u32, DebateError> {
        if self.phase != DebatePhase::Speaking {
            return Err(DebateError::InvalidPhase {
                expected: DebatePhase::Speaking,
                actual: self.phase,
            });
        }
        if !self.has_rounds_remaining() {
            return Err(DebateError::NoRoundsRemaining {
                max_rounds: self.max_rounds,
            });
        }
        self.current_round += 1;
        Ok(self.current_round)
    }

    pub fn has_rounds_remaining(&self) -> bool {
        self.current_round < self.max_rounds
    }

    pub fn is_complete(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Give the floor to a speaker; returns the previous speaker.
    pub fn give_floor(&mut self, speaker: &str, rank: Rank) -> Option<SenatorId> {
        let previous = self.floor.take().map(|f| f.speaker);
        self.floor = Some(Floor {
            speaker: speaker.to_string(),
            rank,
        });
        previous
    }

    pub fn current_speaker(&self) -> Option<&Floor> {
        self.floor.as_ref()
    }

    pub fn record_stance(&mut self, senator: &str, stance: Stance) {
        self.stances.insert(senator.to_string(), stance);
    }

    pub fn record_stance_change(&mut self, senator: &str, stance: Stance) {
        self.stance_changes += 1;
        self.record_stance(senator, stance);
    }

    pub fn record_speech(&mut self, record: SpeechRecord) {
        self.speeches.push(record);
    }

    pub fn record_reaction(&mut self) {
        self.reactions += 1;
    }

    pub fn record_interjection(&mut self, record: InterjectionRecord) {
        self.interjections.push(record);
    }

    /// Update the shared ledger in both directions.
    ///
    /// Returns the new `(a → b, b → a)` scores, each clamped to `[-1, 1]`.
    pub fn record_exchange(&mut self, a: &str, b: &str, delta: f64) -> (f64, f64) {
        self.relationships.exchange(a, b, delta)
    }

    /// Ledger score from `a` toward `b`.
    pub fn relationship(&self, a: &str, b: &str) -> f64 {
        self.relationships.score(a, b)
    }

    pub fn summary(&self) -> DebateSummary {
        DebateSummary {
            topic: self.topic.clone(),
            title: self.title.clone(),
            final_phase: self.phase,
            rounds_completed: self.current_round,
            speeches: self.speeches.len() as u32,
            reactions: self.reactions,
            interjections: self.interjections.len() as u32,
            permitted_interjections: self.interjections.iter().filter(|i| i.permitted).count()
                as u32,
            stance_changes: self.stance_changes,
            stances: self
                .stances
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            relationships: self.relationships.clone(),
        }
    }

    /// Compact status line.
    pub fn status_line(&self) -> String {
        format!(
            "[{}] round {}/{} | {} speeches | {} interjections | topic={}",
            self.phase,
            self.current_round,
            self.max_rounds,
            self.speeches.len(),
            self.interjections.len(),
            self.topic
        )
    }
}
