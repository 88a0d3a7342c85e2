//! Per-agent memory: what a senator has heard, how it feels about its
//! colleagues, and where it stands on each topic.
//!
//! Only the owning agent mutates its memory, while handling events.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::{DebateEvent, EventId, EventPayload, TopicId};
use crate::senator::{SenatorId, Stance};
use crate::voting::VoteChoice;

/// Longest content excerpt kept per observation.
const EXCERPT_CHARS: usize = 240;

/// An event the agent witnessed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedEvent {
    /// Monotonic sequence number.
    pub seq: u64,
    pub event_id: EventId,
    pub event_type: String,
    pub source: SenatorId,
    pub topic: Option<TopicId>,
    /// Start of the spoken content, if the event carried any.
    pub excerpt: Option<String>,
    /// Salience in `[0.0, 1.0]`; decays over time.
    pub importance: f64,
    pub observed_at: DateTime<Utc>,
}

impl ObservedEvent {
    /// Initial importance for an event.
    pub fn importance_of(event: &DebateEvent) -> f64 {
        match &event.payload {
            EventPayload::SpeechDelivered { quality, .. } => 0.5 + 0.5 * quality.clamp(0.0, 1.0),
            EventPayload::Interjection { intensity, .. } => 0.4 + 0.4 * intensity.clamp(0.0, 1.0),
            EventPayload::Reaction { intensity, .. } => 0.2 + 0.3 * intensity.clamp(0.0, 1.0),
            EventPayload::StanceChanged { .. } => 0.6,
            _ => 0.3,
        }
    }
}

/// Where a senator is in its handling of one topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostureState {
    Undecided,
    Decided,
    /// Has reacted or interjected at least once.
    Engaged,
    Voted,
}

impl PostureState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Voted)
    }

    /// Valid transitions from this state.
    pub fn valid_transitions(self) -> &'static [PostureState] {
        match self {
            Self::Undecided => &[Self::Decided],
            Self::Decided => &[Self::Engaged, Self::Voted],
            Self::Engaged => &[Self::Engaged, Self::Voted],
            Self::Voted => &[],
        }
    }
}

impl std::fmt::Display for PostureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Undecided => write!(f, "undecided"),
            Self::Decided => write!(f, "decided"),
            Self::Engaged => write!(f, "engaged"),
            Self::Voted => write!(f, "voted"),
        }
    }
}

/// Error for posture updates that break the per-topic state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PostureError {
    #[error("topic {topic}: invalid posture transition {from} -> {to}")]
    InvalidTransition {
        topic: TopicId,
        from: PostureState,
        to: PostureState,
    },

    #[error("topic {0}: vote already cast")]
    AlreadyVoted(TopicId),

    #[error("topic {0}: no stance recorded")]
    NoStance(TopicId),
}

/// Posture on one topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicPosture {
    pub state: PostureState,
    pub stance: Option<Stance>,
    pub vote: Option<VoteChoice>,
    /// Reactions and interjections made on this topic.
    pub engagements: u32,
    /// Stance changes during the debate.
    pub stance_changes: u32,
}

impl Default for TopicPosture {
    fn default() -> Self {
        Self {
            state: PostureState::Undecided,
            stance: None,
            vote: None,
            engagements: 0,
            stance_changes: 0,
        }
    }
}

/// A senator's memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMemory {
    observations: Vec<ObservedEvent>,
    next_seq: u64,
    relationships: HashMap<SenatorId, f64>,
    agitation: f64,
    postures: HashMap<TopicId, TopicPosture>,
}

impl AgentMemory {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Observations ────────────────────────────────────────────────

    /// Record an event, returning its sequence number.
    pub fn observe(&mut self, event: &DebateEvent) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.observations.push(ObservedEvent {
            seq,
            event_id: event.id.clone(),
            event_type: event.event_type().to_string(),
            source: event.source.clone(),
            topic: event.topic().map(String::from),
            excerpt: event
                .payload
                .content()
                .map(|c| c.chars().take(EXCERPT_CHARS).collect()),
            importance: ObservedEvent::importance_of(event),
            observed_at: Utc::now(),
        });
        seq
    }

    pub fn observations(&self) -> &[ObservedEvent] {
        &self.observations
    }

    /// Observations concerning a topic, oldest first.
    pub fn observations_about<'a>(&'a self, topic: &'a str) -> impl Iterator<Item = &'a ObservedEvent> + 'a {
        self.observations
            .iter()
            .filter(move |o| o.topic.as_deref() == Some(topic))
    }

    /// The `n` most important observations on a topic, most important first.
    pub fn salient(&self, topic: &str, n: usize) -> Vec<&ObservedEvent> {
        let mut about: Vec<&ObservedEvent> = self
            .observations
            .iter()
            .filter(|o| o.topic.as_deref() == Some(topic))
            .collect();
        about.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        about.truncate(n);
        about
    }

    /// Multiply every observation's importance by `factor` (clamped to `[0, 1]`).
    pub fn decay_importance(&mut self, factor: f64) {
        let factor = factor.clamp(0.0, 1.0);
        for obs in &mut self.observations {
            obs.importance = (obs.importance * factor).clamp(0.0, 1.0);
        }
    }

    // ── Relationships ───────────────────────────────────────────────

    /// Relationship score toward another senator, in `[-1.0, 1.0]`. Unknown is 0.
    pub fn relationship(&self, other: &str) -> f64 {
        self.relationships.get(other).copied().unwrap_or(0.0)
    }

    /// Adjust the score toward `other`; returns the new clamped value.
    pub fn adjust_relationship(&mut self, other: &str, delta: f64) -> f64 {
        let entry = self.relationships.entry(other.to_string()).or_insert(0.0);
        if delta.is_finite() {
            *entry = (*entry + delta).clamp(-1.0, 1.0);
        }
        *entry
    }

    pub fn relationships(&self) -> &HashMap<SenatorId, f64> {
        &self.relationships
    }

    // ── Agitation ───────────────────────────────────────────────────

    /// Current agitation in `[0.0, 1.0]`.
    pub fn agitation(&self) -> f64 {
        self.agitation
    }

    /// Raise agitation; returns the new value.
    pub fn agitate(&mut self, amount: f64) -> f64 {
        if amount.is_finite() {
            self.agitation = (self.agitation + amount).clamp(0.0, 1.0);
        }
        self.agitation
    }

    /// Scale agitation down by `factor`.
    pub fn calm(&mut self, factor: f64) {
        self.agitation = (self.agitation * factor.clamp(0.0, 1.0)).clamp(0.0, 1.0);
    }

    // ── Topic posture ───────────────────────────────────────────────

    pub fn posture(&self, topic: &str) -> PostureState {
        self.postures
            .get(topic)
            .map_or(PostureState::Undecided, |p| p.state)
    }

    pub fn topic_posture(&self, topic: &str) -> Option<&TopicPosture> {
        self.postures.get(topic)
    }

    pub fn stance(&self, topic: &str) -> Option<Stance> {
        self.postures.get(topic).and_then(|p| p.stance)
    }

    pub fn vote(&self, topic: &str) -> Option<VoteChoice> {
        self.postures.get(topic).and_then(|p| p.vote)
    }

    fn transition(&mut self, topic: &str, to: PostureState) -> Result<&mut TopicPosture, PostureError> {
        let posture = self.postures.entry(topic.to_string()).or_default();
        if posture.state == PostureState::Voted {
            return Err(PostureError::AlreadyVoted(topic.to_string()));
        }
        if !posture.state.valid_transitions().contains(&to) {
            return Err(PostureError::InvalidTransition {
                topic: topic.to_string(),
                from: posture.state,
                to,
            });
        }
        posture.state = to;
        Ok(posture)
    }

    /// Record the initial stance on a topic.
    pub fn decide(&mut self, topic: &str, stance: Stance) -> Result<(), PostureError> {
        let posture = self.transition(topic, PostureState::Decided)?;
        posture.stance = Some(stance);
        Ok(())
    }

    /// Mark a reaction or interjection on the topic.
    pub fn engage(&mut self, topic: &str) -> Result<(), PostureError> {
        let posture = self.transition(topic, PostureState::Engaged)?;
        posture.engagements += 1;
        Ok(())
    }

    /// Replace the stance mid-debate; returns the previous stance.
    pub fn change_stance(&mut self, topic: &str, stance: Stance) -> Result<Stance, PostureError> {
        let posture = self
            .postures
            .get_mut(topic)
            .ok_or_else(|| PostureError::NoStance(topic.to_string()))?;
        if posture.state == PostureState::Voted {
            return Err(PostureError::AlreadyVoted(topic.to_string()));
        }
        let previous = posture
            .stance
            .ok_or_else(|| PostureError::NoStance(topic.to_string()))?;
        posture.stance = Some(stance);
        posture.stance_changes += 1;
        Ok(previous)
    }

    /// Record the vote. A vote is final for the topic.
    pub fn record_vote(&mut self, topic: &str, vote: VoteChoice) -> Result<(), PostureError> {
        let posture = self.transition(topic, PostureState::Voted)?;
        posture.vote = Some(vote);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ContentOrigin;
    use crate::senator::{Faction, Rank};

    fn speech(source: &str, topic: &str, quality: f64) -> DebateEvent {
        DebateEvent::new(
            source,
            EventPayload::SpeechDelivered {
                topic: topic.to_string(),
                round: 1,
                faction: Faction::Populares,
                rank: Rank::Senator,
                stance: Stance::Support,
                content: "Bread for the people of Rome.".to_string(),
                quality,
                origin: ContentOrigin::Template,
            },
        )
    }

    #[test]
    fn test_relationship_clamped() {
        let mut memory = AgentMemory::new();
        for _ in 0..30 {
            memory.adjust_relationship("cato-1", 0.1);
        }
        assert_eq!(memory.relationship("cato-1"), 1.0);
        for _ in 0..50 {
            memory.adjust_relationship("cato-1", -0.2);
        }
        assert_eq!(memory.relationship("cato-1"), -1.0);
        assert_eq!(memory.adjust_relationship("cato-1", f64::NAN), -1.0);
        assert_eq!(memory.relationship("unknown"), 0.0);
    }

    #[test]
    fn test_agitation_bounds() {
        let mut memory = AgentMemory::new();
        assert_eq!(memory.agitate(0.7), 0.7);
        assert_eq!(memory.agitate(0.7), 1.0);
        memory.calm(0.5);
        assert!((memory.agitation() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_observe_and_decay() {
        let mut memory = AgentMemory::new();
        assert_eq!(memory.observe(&speech("a", "grain", 1.0)), 0);
        assert_eq!(memory.observe(&speech("b", "grain", 0.0)), 1);
        memory.observe(&speech("c", "roads", 0.5));

        let salient = memory.salient("grain", 1);
        assert_eq!(salient[0].source, "a");
        assert_eq!(salient[0].importance, 1.0);

        memory.decay_importance(0.5);
        assert_eq!(memory.observations()[0].importance, 0.5);
        assert_eq!(memory.observations_about("roads").count(), 1);
    }

    #[test]
    fn test_salient_outlives_topic_key() {
        let mut memory = AgentMemory::new();
        memory.observe(&speech("a", "grain", 0.2));
        memory.observe(&speech("b", "grain", 0.9));

        let recalled = {
            let topic = String::from("grain");
            memory.salient(&topic, 5)
        };
        let sources: Vec<&str> = recalled.iter().map(|o| o.source.as_str()).collect();
        assert_eq!(sources, ["b", "a"]);
    }

    #[test]
    fn test_posture_lifecycle() {
        let mut memory = AgentMemory::new();
        assert_eq!(memory.posture("grain"), PostureState::Undecided);

        memory.decide("grain", Stance::Oppose).unwrap();
        memory.engage("grain").unwrap();
        memory.engage("grain").unwrap();
        assert_eq!(memory.change_stance("grain", Stance::Neutral).unwrap(), Stance::Oppose);
        memory.record_vote("grain", VoteChoice::Abstain).unwrap();

        let posture = memory.topic_posture("grain").unwrap();
        assert_eq!(posture.state, PostureState::Voted);
        assert_eq!(posture.engagements, 2);
        assert_eq!(posture.stance_changes, 1);
        assert_eq!(memory.stance("grain"), Some(Stance::Neutral));
    }

    #[test]
    fn test_vote_is_immutable() {
        let mut memory = AgentMemory::new();
        memory.decide("grain", Stance::Support).unwrap();
        memory.record_vote("grain", VoteChoice::For).unwrap();

        assert_eq!(
            memory.record_vote("grain", VoteChoice::Against),
            Err(PostureError::AlreadyVoted("grain".to_string()))
        );
        assert!(memory.engage("grain").is_err());
        assert!(memory.change_stance("grain", Stance::Oppose).is_err());
        assert_eq!(memory.vote("grain"), Some(VoteChoice::For));
    }

    #[test]
    fn test_invalid_transitions() {
        let mut memory = AgentMemory::new();
        assert!(matches!(
            memory.engage("grain"),
            Err(PostureError::InvalidTransition { .. })
        ));
        assert!(memory.record_vote("roads", VoteChoice::For).is_err());
        memory.decide("grain", Stance::Support).unwrap();
        assert!(memory.decide("grain", Stance::Oppose).is_err());
        assert_eq!(
            memory.change_stance("unknown", Stance::Oppose),
            Err(PostureError::NoStance("unknown".to_string()))
        );
    }
}
