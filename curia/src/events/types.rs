//! Event types for debate coordination
//!
//! Every interaction in the chamber is a `DebateEvent`. The payload variant
//! determines the dotted `event_type` string handlers subscribe to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::senator::{Faction, Rank, SenatorId, Stance, SENATE_SOURCE};
use crate::voting::{VoteChoice, VoteCounts, VoteOutcome};

/// Unique identifier for events
pub type EventId = String;

/// Identifier of a debate topic
pub type TopicId = String;

/// Where a piece of generated text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentOrigin {
    /// Produced by the language model.
    Llm,
    /// Hand-written fallback after a generation failure.
    Template,
}

/// Kind of reaction from the benches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    Agreement,
    Disagreement,
    Skepticism,
    Amusement,
    Indifference,
}

impl ReactionKind {
    /// Relationship delta the reacting senator applies toward the speaker.
    pub fn relationship_delta(self) -> f64 {
        match self {
            Self::Agreement => 0.1,
            Self::Disagreement => -0.1,
            Self::Skepticism => -0.05,
            Self::Amusement => 0.02,
            Self::Indifference => 0.0,
        }
    }
}

impl std::fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Agreement => write!(f, "agreement"),
            Self::Disagreement => write!(f, "disagreement"),
            Self::Skepticism => write!(f, "skepticism"),
            Self::Amusement => write!(f, "amusement"),
            Self::Indifference => write!(f, "indifference"),
        }
    }
}

/// Kind of interruption during another senator's speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterjectionKind {
    Acclamation,
    Objection,
    Procedural,
    Emotional,
    Collective,
}

impl std::fmt::Display for InterjectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Acclamation => write!(f, "acclamation"),
            Self::Objection => write!(f, "objection"),
            Self::Procedural => write!(f, "procedural"),
            Self::Emotional => write!(f, "emotional"),
            Self::Collective => write!(f, "collective"),
        }
    }
}

/// Typed payload of a debate event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventPayload {
    /// Opening ceremony of a session.
    SessionOpened {
        session_id: String,
        year: i32,
        presiding: Option<SenatorId>,
        ceremony: String,
    },

    /// Roll call completed.
    AttendanceTaken {
        present: Vec<SenatorId>,
        absent: Vec<SenatorId>,
    },

    /// Agenda for the session announced.
    AgendaAnnounced { topics: Vec<TopicId> },

    /// A debate on a topic began.
    DebateStarted {
        topic: TopicId,
        title: String,
        rounds: u32,
        speakers: Vec<SenatorId>,
    },

    /// The topic was put before the chamber; senators decide stances.
    TopicIntroduced {
        topic: TopicId,
        title: String,
        category: String,
    },

    /// A senator settled on an initial stance.
    StanceDecided {
        topic: TopicId,
        stance: Stance,
        origin: ContentOrigin,
    },

    /// The floor passed to a new speaker.
    SpeakerChanged {
        topic: TopicId,
        round: u32,
        speaker: SenatorId,
        rank: Rank,
        previous: Option<SenatorId>,
    },

    /// A senator delivered a speech.
    SpeechDelivered {
        topic: TopicId,
        round: u32,
        faction: Faction,
        rank: Rank,
        stance: Stance,
        content: String,
        quality: f64,
        origin: ContentOrigin,
    },

    /// A senator reacted to a speech.
    Reaction {
        topic: TopicId,
        kind: ReactionKind,
        stance: Stance,
        content: String,
        intensity: f64,
        origin: ContentOrigin,
    },

    /// A senator interrupted a speech.
    Interjection {
        topic: TopicId,
        kind: InterjectionKind,
        rank: Rank,
        stance: Stance,
        content: String,
        intensity: f64,
        origin: ContentOrigin,
    },

    /// The presiding officer ruled whether an interjection disrupted the speaker.
    InterjectionRuled {
        topic: TopicId,
        interjector: SenatorId,
        speaker: SenatorId,
        permitted: bool,
    },

    /// A senator changed stance after hearing the debate.
    StanceChanged {
        topic: TopicId,
        from: Stance,
        to: Stance,
        reason: String,
    },

    /// A debate concluded.
    DebateEnded {
        topic: TopicId,
        rounds_completed: u32,
        speeches: u32,
        interjections: u32,
    },

    /// The chamber is asked to vote.
    VoteRequested { topic: TopicId, title: String },

    /// A senator cast a vote.
    VoteCast {
        topic: TopicId,
        faction: Faction,
        vote: VoteChoice,
        debate_stance: Stance,
    },

    /// Votes counted for a topic.
    VoteTallied {
        topic: TopicId,
        counts: VoteCounts,
        outcome: VoteOutcome,
        carried: bool,
    },

    /// Session closed.
    SessionAdjourned {
        session_id: String,
        topics_decided: u32,
        closing: String,
    },
}

impl EventPayload {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionOpened { .. } => event_types::SESSION_OPENED,
            Self::AttendanceTaken { .. } => event_types::ATTENDANCE_TAKEN,
            Self::AgendaAnnounced { .. } => event_types::AGENDA_ANNOUNCED,
            Self::DebateStarted { .. } => event_types::DEBATE_STARTED,
            Self::TopicIntroduced { .. } => event_types::TOPIC_INTRODUCED,
            Self::StanceDecided { .. } => event_types::STANCE_DECIDED,
            Self::SpeakerChanged { .. } => event_types::SPEAKER_CHANGED,
            Self::SpeechDelivered { .. } => event_types::SPEECH_DELIVERED,
            Self::Reaction { .. } => event_types::REACTION,
            Self::Interjection { .. } => event_types::INTERJECTION,
            Self::InterjectionRuled { .. } => event_types::INTERJECTION_RULED,
            Self::StanceChanged { .. } => event_types::STANCE_CHANGED,
            Self::DebateEnded { .. } => event_types::DEBATE_ENDED,
            Self::VoteRequested { .. } => event_types::VOTE_REQUESTED,
            Self::VoteCast { .. } => event_types::VOTE_CAST,
            Self::VoteTallied { .. } => event_types::VOTE_TALLIED,
            Self::SessionAdjourned { .. } => event_types::SESSION_ADJOURNED,
        }
    }

    /// Topic the payload concerns, if any.
    pub fn topic(&self) -> Option<&str> {
        match self {
            Self::DebateStarted { topic, .. }
            | Self::TopicIntroduced { topic, .. }
            | Self::StanceDecided { topic, .. }
            | Self::SpeakerChanged { topic, .. }
            | Self::SpeechDelivered { topic, .. }
            | Self::Reaction { topic, .. }
            | Self::Interjection { topic, .. }
            | Self::InterjectionRuled { topic, .. }
            | Self::StanceChanged { topic, .. }
            | Self::DebateEnded { topic, .. }
            | Self::VoteRequested { topic, .. }
            | Self::VoteCast { topic, .. }
            | Self::VoteTallied { topic, .. } => Some(topic),
            Self::SessionOpened { .. }
            | Self::AttendanceTaken { .. }
            | Self::AgendaAnnounced { .. }
            | Self::SessionAdjourned { .. } => None,
        }
    }

    /// Spoken text carried by the payload, if any.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::SpeechDelivered { content, .. }
            | Self::Reaction { content, .. }
            | Self::Interjection { content, .. } => Some(content),
            Self::SessionOpened { ceremony, .. } => Some(ceremony),
            Self::SessionAdjourned { closing, .. } => Some(closing),
            _ => None,
        }
    }
}

/// Dotted event type strings handlers subscribe to.
pub mod event_types {
    pub const SESSION_OPENED: &str = "session.opened";
    pub const ATTENDANCE_TAKEN: &str = "session.attendance_taken";
    pub const AGENDA_ANNOUNCED: &str = "session.agenda_announced";
    pub const SESSION_ADJOURNED: &str = "session.adjourned";
    pub const DEBATE_STARTED: &str = "debate.started";
    pub const TOPIC_INTRODUCED: &str = "debate.topic_introduced";
    pub const SPEAKER_CHANGED: &str = "debate.speaker_changed";
    pub const SPEECH_DELIVERED: &str = "debate.speech_delivered";
    pub const REACTION: &str = "debate.reaction";
    pub const INTERJECTION: &str = "debate.interjection";
    pub const INTERJECTION_RULED: &str = "debate.interjection_ruled";
    pub const DEBATE_ENDED: &str = "debate.ended";
    pub const VOTE_REQUESTED: &str = "debate.vote_requested";
    pub const VOTE_TALLIED: &str = "debate.vote_tallied";
    pub const STANCE_DECIDED: &str = "senator.stance_decided";
    pub const STANCE_CHANGED: &str = "senator.stance_changed";
    pub const VOTE_CAST: &str = "senator.vote_cast";
}

/// A published debate event. Immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateEvent {
    pub id: EventId,
    /// Emitting senator, or [`SENATE_SOURCE`] for session events.
    pub source: SenatorId,
    /// Addressee, e.g. the speaker an interjection interrupts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<SenatorId>,
    pub payload: EventPayload,
    pub timestamp: DateTime<Utc>,
}

impl DebateEvent {
    /// Create an event from a senator.
    pub fn new(source: &str, payload: EventPayload) -> Self {
        Self {
            id: Self::new_id(),
            source: source.to_string(),
            target: None,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Create an event emitted by the session itself.
    pub fn from_senate(payload: EventPayload) -> Self {
        Self::new(SENATE_SOURCE, payload)
    }

    /// Address the event to a senator.
    pub fn targeting(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        self.payload.event_type()
    }

    /// Topic id if this event is topic-scoped
    pub fn topic(&self) -> Option<&str> {
        self.payload.topic()
    }

    /// Whether the session rather than a senator emitted this event.
    pub fn is_from_senate(&self) -> bool {
        self.source == SENATE_SOURCE
    }

    /// Create a new unique event ID
    pub fn new_id() -> EventId {
        uuid::Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speech() -> DebateEvent {
        DebateEvent::new(
            "cato-2",
            EventPayload::SpeechDelivered {
                topic: "grain-dole".to_string(),
                round: 1,
                faction: Faction::Optimates,
                rank: Rank::Praetor,
                stance: Stance::Oppose,
                content: "Carthago delenda est.".to_string(),
                quality: 0.8,
                origin: ContentOrigin::Llm,
            },
        )
    }

    #[test]
    fn test_event_serialization() {
        let event = speech();
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"speech_delivered\""));
        assert!(!json.contains("target"));

        let parsed: DebateEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
        assert_eq!(parsed.event_type(), "debate.speech_delivered");
    }

    #[test]
    fn test_event_accessors() {
        let event = speech().targeting("cicero-0");
        assert_eq!(event.topic(), Some("grain-dole"));
        assert_eq!(event.target.as_deref(), Some("cicero-0"));
        assert_eq!(event.payload.content(), Some("Carthago delenda est."));
        assert!(!event.is_from_senate());

        let agenda = DebateEvent::from_senate(EventPayload::AgendaAnnounced { topics: vec![] });
        assert!(agenda.is_from_senate());
        assert_eq!(agenda.topic(), None);
        assert_eq!(agenda.event_type(), event_types::AGENDA_ANNOUNCED);
    }

    #[test]
    fn test_unique_ids() {
        assert_ne!(speech().id, speech().id);
    }

    #[test]
    fn test_reaction_deltas() {
        assert!(ReactionKind::Agreement.relationship_delta() > 0.0);
        assert!(ReactionKind::Disagreement.relationship_delta() < 0.0);
        assert_eq!(ReactionKind::Indifference.relationship_delta(), 0.0);
    }
}
