//! A senator that listens to the chamber and answers through the event bus.
//!
//! The agent owns its memory and RNG behind a `tokio::sync::Mutex`. The lock
//! is taken to read or update state and released before any model call or
//! `publish`, so nested dispatches never deadlock on it.
//!
//! ```text
//! debate.topic_introduced ─► decide stance ─► senator.stance_decided
//! debate.speech_delivered ─► observe, roll ─┬► debate.reaction
//!                                           ├► debate.interjection
//!                                           └► senator.stance_changed
//! debate.interjection (at me) ─► resent interjector, agitate
//! debate.vote_requested ─► senator.vote_cast (once per topic)
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use curia::behavior;
use curia::events::{
    event_types, DebateEvent, EventBus, EventBusError, EventBusResult, EventHandler, EventPayload,
    InterjectionKind, ReactionKind, SubscriptionId,
};
use curia::fallback::{self, Generated};
use curia::memory::{AgentMemory, ObservedEvent, PostureState};
use curia::senator::{Faction, Rank, Senator, SenatorId, Stance};
use curia::topics::Topic;
use curia::voting::VotePolicy;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::llm::{ChatMessage, ChatOptions, LlmSet, ModelTier};
use crate::prompts;

/// Importance multiplier applied to old observations when a new topic opens.
const TOPIC_DECAY: f64 = 0.8;
/// Agitation kept when a new topic opens.
const TOPIC_CALM: f64 = 0.5;
/// Relationship drop toward a senator who interrupted us.
const INTERRUPTED_RESENTMENT: f64 = -0.1;
/// Agitation gained from being interrupted.
const INTERRUPTED_AGITATION: f64 = 0.15;
/// Observations fed back into the speech prompt.
const SPEECH_RECALL: usize = 3;
/// Characters of a speech quoted in reaction prompts.
const QUOTE_CHARS: usize = 200;
const STANCE_MAX_TOKENS: u32 = 16;
const SHORT_MAX_TOKENS: u32 = 60;

/// Generation settings for one agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentSettings {
    /// Temperature for speeches.
    pub temperature: f32,
    /// Token limit for speeches.
    pub max_tokens: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            temperature: ModelTier::Speech.default_temperature(),
            max_tokens: 400,
        }
    }
}

/// A speech ready for delivery.
#[derive(Debug, Clone)]
pub struct ComposedSpeech {
    pub speaker: SenatorId,
    pub faction: Faction,
    pub rank: Rank,
    pub stance: Stance,
    pub quality: f64,
    pub content: Generated<String>,
}

struct AgentState {
    memory: AgentMemory,
    rng: ChaCha8Rng,
}

/// What a listener decided to do about one speech.
struct SpeechResponse {
    stance: Stance,
    relationship: f64,
    agitation: f64,
    reaction: Option<ReactionKind>,
    interjection: Option<InterjectionKind>,
    persuaded: bool,
}

pub struct SenatorAgent {
    senator: Senator,
    llm: LlmSet,
    policy: Arc<VotePolicy>,
    settings: AgentSettings,
    state: Mutex<AgentState>,
}

impl SenatorAgent {
    pub fn new(senator: Senator, llm: LlmSet, policy: Arc<VotePolicy>, seed: u64) -> Self {
        Self {
            senator,
            llm,
            policy,
            settings: AgentSettings::default(),
            state: Mutex::new(AgentState {
                memory: AgentMemory::new(),
                rng: ChaCha8Rng::seed_from_u64(seed),
            }),
        }
    }

    pub fn with_settings(mut self, settings: AgentSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Seed for the agent at `index` on the roster, derived from the session seed.
    pub fn seed_for(session_seed: u64, index: usize) -> u64 {
        session_seed.wrapping_add((index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    pub fn senator(&self) -> &Senator {
        &self.senator
    }

    pub fn id(&self) -> &str {
        &self.senator.id
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Register for the event types the agent answers.
    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) -> Vec<SubscriptionId> {
        bus.subscribe_many(
            &[
                event_types::TOPIC_INTRODUCED,
                event_types::SPEECH_DELIVERED,
                event_types::INTERJECTION,
                event_types::VOTE_REQUESTED,
            ],
            self.clone(),
        )
    }

    /// Copy of the agent's memory.
    pub async fn memory_snapshot(&self) -> AgentMemory {
        self.state.lock().await.memory.clone()
    }

    /// Current stance on a topic, if decided.
    pub async fn stance(&self, topic: &str) -> Option<Stance> {
        self.state.lock().await.memory.stance(topic)
    }

    async fn fallback_stance(&self) -> Stance {
        let mut state = self.state.lock().await;
        fallback::faction_stance(self.senator.faction, &mut state.rng)
    }

    /// Ask the model for a stance on a topic.
    ///
    /// A failed call or an unparseable reply falls back to the faction's
    /// stance weights.
    pub async fn decide_stance(&self, topic: &Topic) -> Generated<Stance> {
        let prompt = prompts::stance_prompt(&self.senator, topic);
        let provider = &self.llm.simple;
        match provider
            .generate_text(&prompt, ModelTier::Simple.default_temperature(), STANCE_MAX_TOKENS)
            .await
        {
            Ok(reply) => match Stance::parse_loose(&reply) {
                Some(stance) => Generated::llm(stance, provider.model()),
                None => {
                    warn!(
                        senator = %self.senator.id,
                        topic = %topic.id,
                        reply = %prompts::tidy(&reply),
                        "Unparseable stance reply, using faction bias"
                    );
                    Generated::template(self.fallback_stance().await, "unparseable stance reply")
                }
            },
            Err(e) => {
                error!(senator = %self.senator.id, topic = %topic.id, "Stance generation failed: {}", e);
                Generated::template(self.fallback_stance().await, e.to_string())
            }
        }
    }

    /// Compose this senator's speech for a round.
    ///
    /// Does not publish; the debate manager delivers speeches in turn order.
    pub async fn compose_speech(&self, topic: &Topic, round: u32) -> ComposedSpeech {
        let (stance, quality, heard) = {
            let mut state = self.state.lock().await;
            let AgentState { memory, rng } = &mut *state;
            let stance = match memory.stance(&topic.id) {
                Some(stance) => stance,
                None => {
                    let stance = fallback::faction_stance(self.senator.faction, rng);
                    if let Err(e) = memory.decide(&topic.id, stance) {
                        debug!(senator = %self.senator.id, "Could not record stance: {}", e);
                    }
                    stance
                }
            };
            let quality = behavior::speech_quality(self.senator.traits.eloquence(), rng);
            let heard: Vec<ObservedEvent> = memory
                .salient(&topic.id, SPEECH_RECALL)
                .into_iter()
                .filter(|o| o.source != self.senator.id)
                .cloned()
                .collect();
            (stance, quality, heard)
        };

        let heard_refs: Vec<&ObservedEvent> = heard.iter().collect();
        let messages = [
            ChatMessage::system(prompts::senator_persona(&self.senator)),
            ChatMessage::user(prompts::speech_prompt(&self.senator, topic, stance, round, &heard_refs)),
        ];
        let options = ChatOptions {
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            json_mode: false,
        };

        let content = match self.llm.speech.generate_chat_completion(&messages, &options).await {
            Ok(completion) => Generated::llm(prompts::tidy(&completion.content), &completion.model),
            Err(e) => {
                error!(
                    senator = %self.senator.id,
                    topic = %topic.id,
                    round,
                    "Speech generation failed: {}",
                    e
                );
                Generated::template(fallback::speech(&self.senator, &topic.title, stance), e.to_string())
            }
        };

        ComposedSpeech {
            speaker: self.senator.id.clone(),
            faction: self.senator.faction,
            rank: self.senator.rank,
            stance,
            quality,
            content,
        }
    }

    async fn short_reply(&self, prompt: String, fallback_text: String) -> Generated<String> {
        let provider = &self.llm.simple;
        match provider
            .generate_text(&prompt, ModelTier::Simple.default_temperature(), SHORT_MAX_TOKENS)
            .await
        {
            Ok(reply) => Generated::llm(prompts::tidy(&reply), provider.model()),
            Err(e) => {
                error!(senator = %self.senator.id, "Short reply generation failed: {}", e);
                Generated::template(fallback_text, e.to_string())
            }
        }
    }

    async fn on_topic_introduced(&self, topic: Topic, bus: &EventBus) -> EventBusResult<()> {
        {
            let mut state = self.state.lock().await;
            if state.memory.posture(&topic.id) != PostureState::Undecided {
                debug!(senator = %self.senator.id, topic = %topic.id, "Stance already decided");
                return Ok(());
            }
            state.memory.decay_importance(TOPIC_DECAY);
            state.memory.calm(TOPIC_CALM);
        }

        let stance = self.decide_stance(&topic).await;
        self.state
            .lock()
            .await
            .memory
            .decide(&topic.id, stance.value)
            .map_err(|e| EventBusError::handler(self.name(), e))?;

        debug!(senator = %self.senator.id, topic = %topic.id, stance = %stance.value, "Stance decided");
        bus.publish(DebateEvent::new(
            &self.senator.id,
            EventPayload::StanceDecided {
                topic: topic.id,
                stance: stance.value,
                origin: stance.origin,
            },
        ))
        .await;
        Ok(())
    }

    async fn on_speech(&self, event: &DebateEvent, bus: &EventBus) -> EventBusResult<()> {
        let EventPayload::SpeechDelivered {
            topic,
            rank: speaker_rank,
            stance: speaker_stance,
            quality,
            content,
            ..
        } = &event.payload
        else {
            return Ok(());
        };
        let (topic, speaker_rank, speaker_stance, quality) =
            (topic.as_str(), *speaker_rank, *speaker_stance, *quality);
        let speaker = event.source.as_str();
        let plan = {
            let mut state = self.state.lock().await;
            state.memory.observe(event);
            let posture = state.memory.posture(topic);
            if matches!(posture, PostureState::Undecided | PostureState::Voted) {
                return Ok(());
            }

            let AgentState { memory, rng } = &mut *state;
            let stance = memory.stance(topic).unwrap_or(Stance::Neutral);
            let relationship = memory.relationship(speaker);
            let agitation = memory.agitation();

            let reaction = if behavior::roll(rng, behavior::reaction_probability(relationship, quality)) {
                Some(behavior::reaction_kind(stance, speaker_stance, relationship, rng))
            } else {
                None
            };
            let interjection = if behavior::roll(
                rng,
                behavior::interjection_probability(self.senator.rank, speaker_rank, agitation),
            ) {
                Some(behavior::interjection_kind(stance, speaker_stance, agitation, rng))
            } else {
                None
            };
            let persuaded = stance != speaker_stance
                && behavior::roll(
                    rng,
                    behavior::persuasion_probability(relationship, quality, self.senator.traits.loyalty()),
                );

            SpeechResponse {
                stance,
                relationship,
                agitation,
                reaction,
                interjection,
                persuaded,
            }
        };

        let quote: String = content.chars().take(QUOTE_CHARS).collect();
        let intensity = behavior::intensity(plan.relationship, plan.agitation);

        if let Some(kind) = plan.reaction {
            let text = self
                .short_reply(
                    prompts::reaction_prompt(&self.senator, speaker, &quote, kind),
                    fallback::reaction(kind),
                )
                .await;
            {
                let mut state = self.state.lock().await;
                if let Err(e) = state.memory.engage(topic) {
                    debug!(senator = %self.senator.id, "Reaction not recorded: {}", e);
                }
                state.memory.adjust_relationship(speaker, kind.relationship_delta());
            }
            bus.publish(
                DebateEvent::new(
                    &self.senator.id,
                    EventPayload::Reaction {
                        topic: topic.to_string(),
                        kind,
                        stance: plan.stance,
                        content: text.value,
                        intensity,
                        origin: text.origin,
                    },
                )
                .targeting(speaker),
            )
            .await;
        }

        if let Some(kind) = plan.interjection {
            let text = self
                .short_reply(
                    prompts::interjection_prompt(&self.senator, speaker, &quote, kind),
                    fallback::interjection(kind, speaker),
                )
                .await;
            if let Err(e) = self.state.lock().await.memory.engage(topic) {
                debug!(senator = %self.senator.id, "Interjection not recorded: {}", e);
            }
            info!(senator = %self.senator.id, speaker, %kind, "Interjection");
            bus.publish(
                DebateEvent::new(
                    &self.senator.id,
                    EventPayload::Interjection {
                        topic: topic.to_string(),
                        kind,
                        rank: self.senator.rank,
                        stance: plan.stance,
                        content: text.value,
                        intensity,
                        origin: text.origin,
                    },
                )
                .targeting(speaker),
            )
            .await;
        }

        if plan.persuaded {
            let previous = self
                .state
                .lock()
                .await
                .memory
                .change_stance(topic, speaker_stance);
            match previous {
                Ok(from) => {
                    info!(senator = %self.senator.id, speaker, %from, to = %speaker_stance, "Stance changed");
                    bus.publish(DebateEvent::new(
                        &self.senator.id,
                        EventPayload::StanceChanged {
                            topic: topic.to_string(),
                            from,
                            to: speaker_stance,
                            reason: format!("persuaded by {}", speaker),
                        },
                    ))
                    .await;
                }
                Err(e) => debug!(senator = %self.senator.id, "Stance change skipped: {}", e),
            }
        }

        Ok(())
    }

    async fn on_interrupted(&self, event: &DebateEvent) {
        let mut state = self.state.lock().await;
        state.memory.observe(event);
        let relationship = state
            .memory
            .adjust_relationship(&event.source, INTERRUPTED_RESENTMENT);
        let agitation = state.memory.agitate(INTERRUPTED_AGITATION);
        debug!(
            senator = %self.senator.id,
            interjector = %event.source,
            relationship,
            agitation,
            "Interrupted"
        );
    }

    async fn on_vote_requested(&self, topic: &str, bus: &EventBus) -> EventBusResult<()> {
        let (vote, stance) = {
            let mut state = self.state.lock().await;
            if state.memory.posture(topic) == PostureState::Voted {
                debug!(senator = %self.senator.id, topic, "Vote already cast, ignoring request");
                return Ok(());
            }
            let AgentState { memory, rng } = &mut *state;
            let stance = match memory.stance(topic) {
                Some(stance) => stance,
                None => {
                    let stance = fallback::faction_stance(self.senator.faction, rng);
                    memory
                        .decide(topic, stance)
                        .map_err(|e| EventBusError::handler(&self.senator.id, e))?;
                    stance
                }
            };
            let vote = self.policy.decide(self.senator.faction, stance, rng);
            memory
                .record_vote(topic, vote)
                .map_err(|e| EventBusError::handler(&self.senator.id, e))?;
            (vote, stance)
        };

        debug!(senator = %self.senator.id, topic, %vote, "Vote cast");
        bus.publish(DebateEvent::new(
            &self.senator.id,
            EventPayload::VoteCast {
                topic: topic.to_string(),
                faction: self.senator.faction,
                vote,
                debate_stance: stance,
            },
        ))
        .await;
        Ok(())
    }
}

#[async_trait]
impl EventHandler for SenatorAgent {
    fn name(&self) -> &str {
        &self.senator.id
    }

    async fn handle(&self, event: &DebateEvent, bus: &EventBus) -> EventBusResult<()> {
        match &event.payload {
            EventPayload::TopicIntroduced {
                topic,
                title,
                category,
            } => {
                let topic = Topic {
                    id: topic.clone(),
                    title: title.clone(),
                    category: category.clone(),
                    year: None,
                };
                self.on_topic_introduced(topic, bus).await
            }
            EventPayload::SpeechDelivered { .. } if event.source != self.senator.id => {
                self.on_speech(event, bus).await
            }
            EventPayload::Interjection { .. }
                if event.target.as_deref() == Some(self.senator.id.as_str()) =>
            {
                self.on_interrupted(event).await;
                Ok(())
            }
            EventPayload::VoteRequested { topic, .. } => self.on_vote_requested(topic, bus).await,
            _ => Ok(()),
        }
    }
}
