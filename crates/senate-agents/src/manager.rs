//! Debate manager: runs the rounds of one debate at a time.
//!
//! Each round the speeches are composed concurrently and then delivered in
//! turn order. A chair handler subscribed for the duration of the debate
//! rules on interjections against whoever holds the floor and keeps the
//! `DebateState` ledger current.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use curia::debate::{
    may_interrupt, DebateError, DebatePhase, DebateState, DebateSummary, InterjectionRecord,
    RelationshipLedger, SpeechRecord, TransitionError, TurnOrder,
};
use curia::events::{
    event_types, DebateEvent, EventBus, EventBusResult, EventHandler, EventPayload,
    SharedEventBus,
};
use curia::topics::Topic;
use futures::future::join_all;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::agents::{ComposedSpeech, SenatorAgent};

/// Settings for every debate a manager runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebateConfig {
    /// Rounds of speeches per topic.
    pub rounds: u32,
    /// Reshuffle the speaking order every round.
    pub shuffle: bool,
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            rounds: 3,
            shuffle: false,
        }
    }
}

type SharedState = Arc<Mutex<DebateState>>;

fn with_state<T>(state: &SharedState, f: impl FnOnce(&mut DebateState) -> T) -> T {
    let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}

/// Presiding officer for the current debate.
struct Chair {
    state: SharedState,
}

#[async_trait]
impl EventHandler for Chair {
    fn name(&self) -> &str {
        "chair"
    }

    async fn handle(&self, event: &DebateEvent, bus: &EventBus) -> EventBusResult<()> {
        let ruling = with_state(&self.state, |state| {
            if event.topic() != Some(state.topic.as_str()) {
                return None;
            }
            match &event.payload {
                EventPayload::Interjection { kind, rank, .. } => {
                    let Some(floor) = state.current_speaker().cloned() else {
                        debug!(interjector = %event.source, "Interjection with nobody on the floor");
                        return None;
                    };
                    let permitted = may_interrupt(*rank, floor.rank);
                    let round = state.current_round;
                    state.record_interjection(InterjectionRecord {
                        round,
                        interjector: event.source.clone(),
                        speaker: floor.speaker.clone(),
                        kind: *kind,
                        permitted,
                    });
                    Some((state.topic.clone(), floor.speaker, permitted))
                }
                EventPayload::Reaction { kind, .. } => {
                    state.record_reaction();
                    if let Some(target) = &event.target {
                        state.record_exchange(&event.source, target, kind.relationship_delta());
                    }
                    None
                }
                EventPayload::StanceDecided { stance, .. } => {
                    state.record_stance(&event.source, *stance);
                    None
                }
                EventPayload::StanceChanged { to, .. } => {
                    state.record_stance_change(&event.source, *to);
                    None
                }
                _ => None,
            }
        });

        if let Some((topic, speaker, permitted)) = ruling {
            debug!(interjector = %event.source, %speaker, permitted, "Interjection ruled");
            bus.publish(DebateEvent::from_senate(EventPayload::InterjectionRuled {
                topic,
                interjector: event.source.clone(),
                speaker,
                permitted,
            }))
            .await;
        }
        Ok(())
    }
}

pub struct DebateManager {
    bus: SharedEventBus,
    agents: Vec<Arc<SenatorAgent>>,
    config: DebateConfig,
    state: SharedState,
}

impl DebateManager {
    pub fn new(bus: SharedEventBus, agents: Vec<Arc<SenatorAgent>>, config: DebateConfig) -> Self {
        Self {
            bus,
            agents,
            config,
            state: Arc::new(Mutex::new(DebateState::new("", "", config.rounds))),
        }
    }

    pub fn agents(&self) -> &[Arc<SenatorAgent>] {
        &self.agents
    }

    pub fn config(&self) -> DebateConfig {
        self.config
    }

    /// Snapshot of the current debate state.
    pub fn state(&self) -> DebateState {
        with_state(&self.state, |s| s.clone())
    }

    pub fn status_line(&self) -> String {
        with_state(&self.state, |s| s.status_line())
    }

    /// Relationship ledger accumulated over every debate this manager ran.
    pub fn relationships(&self) -> RelationshipLedger {
        with_state(&self.state, |s| s.relationships.clone())
    }

    fn turn_order(&self) -> TurnOrder {
        let speakers = self.agents.iter().map(|a| a.id().to_string()).collect();
        if self.config.shuffle {
            TurnOrder::shuffled(speakers)
        } else {
            TurnOrder::fixed(speakers)
        }
    }

    fn agent(&self, id: &str) -> Option<&Arc<SenatorAgent>> {
        self.agents.iter().find(|a| a.id() == id)
    }

    /// Run a debate on `topic` up to the vote.
    ///
    /// Leaves the debate in `Voting`; call [`conclude`](Self::conclude) once
    /// votes are tallied. A bookkeeping error aborts the debate.
    pub async fn run_debate(
        &self,
        topic: &Topic,
        rng: &mut ChaCha8Rng,
    ) -> Result<DebateSummary, DebateError> {
        with_state(&self.state, |s| {
            *s = s.next_debate(&topic.id, &topic.title, self.config.rounds)
        });
        let chair = self.bus.subscribe_many(
            &[
                event_types::INTERJECTION,
                event_types::REACTION,
                event_types::STANCE_DECIDED,
                event_types::STANCE_CHANGED,
            ],
            Arc::new(Chair {
                state: self.state.clone(),
            }),
        );

        let result = self.debate(topic, rng).await;

        for id in chair {
            self.bus.unsubscribe(id);
        }
        if let Err(e) = &result {
            warn!(topic = %topic.id, "Debate failed: {}", e);
            if let Err(abort) = self.abort(&e.to_string()) {
                debug!(topic = %topic.id, "Abort not recorded: {}", abort);
            }
        }
        result
    }

    async fn debate(&self, topic: &Topic, rng: &mut ChaCha8Rng) -> Result<DebateSummary, DebateError> {
        let order = self.turn_order();
        with_state(&self.state, |s| s.transition(DebatePhase::Opening, "topic introduced"))?;

        info!(topic = %topic.id, title = %topic.title, rounds = self.config.rounds, "Debate started");
        self.bus
            .publish(DebateEvent::from_senate(EventPayload::DebateStarted {
                topic: topic.id.clone(),
                title: topic.title.clone(),
                rounds: self.config.rounds,
                speakers: order.speakers().to_vec(),
            }))
            .await;
        self.bus
            .publish(DebateEvent::from_senate(EventPayload::TopicIntroduced {
                topic: topic.id.clone(),
                title: topic.title.clone(),
                category: topic.category.clone(),
            }))
            .await;

        with_state(&self.state, |s| s.transition(DebatePhase::Speaking, "stances decided"))?;

        while with_state(&self.state, |s| s.has_rounds_remaining()) {
            let round = with_state(&self.state, |s| s.begin_round())?;
            let speakers = order.next_round(rng);
            debug!(topic = %topic.id, round, ?speakers, "Round begins");

            let speeches = join_all(
                speakers
                    .iter()
                    .filter_map(|id| self.agent(id))
                    .map(|agent| agent.compose_speech(topic, round)),
            )
            .await;

            for speech in speeches {
                self.deliver(topic, round, speech).await;
            }
            info!("{}", self.status_line());
        }

        with_state(&self.state, |s| s.transition(DebatePhase::Voting, "rounds complete"))?;
        let summary = with_state(&self.state, |s| s.summary());

        self.bus
            .publish(DebateEvent::from_senate(EventPayload::DebateEnded {
                topic: topic.id.clone(),
                rounds_completed: summary.rounds_completed,
                speeches: summary.speeches,
                interjections: summary.interjections,
            }))
            .await;
        Ok(summary)
    }

    async fn deliver(&self, topic: &Topic, round: u32, speech: ComposedSpeech) {
        let previous = with_state(&self.state, |s| {
            let previous = s.give_floor(&speech.speaker, speech.rank);
            s.record_speech(SpeechRecord {
                round,
                speaker: speech.speaker.clone(),
                stance: speech.stance,
                quality: speech.quality,
                origin: speech.content.origin,
                content: speech.content.value.clone(),
            });
            previous
        });

        self.bus
            .publish(DebateEvent::from_senate(EventPayload::SpeakerChanged {
                topic: topic.id.clone(),
                round,
                speaker: speech.speaker.clone(),
                rank: speech.rank,
                previous,
            }))
            .await;

        if speech.content.is_fallback() {
            debug!(speaker = %speech.speaker, "Delivering template speech");
        }
        self.bus
            .publish(DebateEvent::new(
                &speech.speaker,
                EventPayload::SpeechDelivered {
                    topic: topic.id.clone(),
                    round,
                    faction: speech.faction,
                    rank: speech.rank,
                    stance: speech.stance,
                    content: speech.content.value,
                    quality: speech.quality,
                    origin: speech.content.origin,
                },
            ))
            .await;
    }

    /// Close the debate after the vote.
    pub fn conclude(&self, reason: &str) -> Result<DebateSummary, DebateError> {
        with_state(&self.state, |s| -> Result<DebateSummary, DebateError> {
            s.transition(DebatePhase::Concluded, reason)?;
            Ok(s.summary())
        })
    }

    /// Stop the debate early.
    pub fn abort(&self, reason: &str) -> Result<DebateSummary, TransitionError> {
        with_state(&self.state, |s| -> Result<DebateSummary, TransitionError> {
            s.abort(reason)?;
            Ok(s.summary())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmSet, MockProvider};
    use curia::events::{ContentOrigin, EventHistory, InterjectionKind, ReactionKind};
    use curia::senator::{Faction, Rank, Senator, Stance, Traits};
    use curia::voting::VotePolicy;
    use rand::SeedableRng;

    fn agents(ranks: &[Rank]) -> Vec<Arc<SenatorAgent>> {
        let llm = LlmSet::uniform(Arc::new(MockProvider::new("mock")));
        let policy = Arc::new(VotePolicy::default());
        ranks
            .iter()
            .enumerate()
            .map(|(i, rank)| {
                let id = format!("senator-{}", i);
                let senator = Senator::new(&id, &id, Faction::ALL[i % 5], *rank, Traits::default());
                SenatorAgent::new(senator, llm.clone(), policy.clone(), i as u64).shared()
            })
            .collect()
    }

    fn history_bus() -> (SharedEventBus, Arc<EventHistory>) {
        let history = EventHistory::new().shared();
        (EventBus::with_history(history.clone()).shared(), history)
    }

    #[tokio::test]
    async fn test_debate_runs_all_rounds() {
        let (bus, history) = history_bus();
        let agents = agents(&[Rank::Consul, Rank::Praetor, Rank::Senator]);
        for agent in &agents {
            agent.subscribe(&bus);
        }
        let manager = DebateManager::new(bus.clone(), agents, DebateConfig { rounds: 2, shuffle: true });
        let topic = Topic::new("Repair of the Via Appia", "Public Works");
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let summary = manager.run_debate(&topic, &mut rng).await.unwrap();
        assert_eq!(summary.final_phase, DebatePhase::Voting);
        assert_eq!(summary.rounds_completed, 2);
        assert_eq!(summary.speeches, 6);
        assert_eq!(summary.stances.len(), 3);

        // The floor always changes before the speech is delivered
        let events = history.events();
        let deliveries: Vec<&str> = events
            .iter()
            .map(|e| e.event_type())
            .filter(|t| *t == event_types::SPEAKER_CHANGED || *t == event_types::SPEECH_DELIVERED)
            .collect();
        assert_eq!(deliveries.len(), 12);
        for pair in deliveries.chunks(2) {
            assert_eq!(pair, [event_types::SPEAKER_CHANGED, event_types::SPEECH_DELIVERED]);
        }
        assert_eq!(
            events.last().map(|e| e.event_type()),
            Some(event_types::DEBATE_ENDED)
        );
        // The chair is gone once the debate ends
        assert_eq!(bus.handler_count(event_types::INTERJECTION), 3);

        let summary = manager.conclude("votes tallied").unwrap();
        assert_eq!(summary.final_phase, DebatePhase::Concluded);
        assert!(manager.conclude("again").is_err());
    }

    #[tokio::test]
    async fn test_chair_rules_on_rank() {
        let bus = EventBus::new().shared();
        let state: SharedState = Arc::new(Mutex::new(DebateState::new("grain", "Grain dole", 1)));
        with_state(&state, |s| {
            s.transition(DebatePhase::Opening, "test").unwrap();
            s.transition(DebatePhase::Speaking, "test").unwrap();
            s.begin_round().unwrap();
            s.give_floor("cicero", Rank::Praetor);
        });
        bus.subscribe(event_types::INTERJECTION, Arc::new(Chair { state: state.clone() }));

        let rulings = Arc::new(Mutex::new(Vec::new()));
        let sink = rulings.clone();
        bus.subscribe_fn(event_types::INTERJECTION_RULED, move |e| {
            if let EventPayload::InterjectionRuled { permitted, .. } = e.payload {
                sink.lock().unwrap().push(permitted);
            }
        });

        for (who, rank) in [("clodius", Rank::Senator), ("hortensius", Rank::Praetor), ("crassus", Rank::Consul)] {
            let event = DebateEvent::new(
                who,
                EventPayload::Interjection {
                    topic: "grain".to_string(),
                    kind: InterjectionKind::Objection,
                    rank,
                    stance: Stance::Oppose,
                    content: "Nonsense!".to_string(),
                    intensity: 0.4,
                    origin: ContentOrigin::Template,
                },
            )
            .targeting("cicero");
            bus.publish(event).await;
        }

        assert_eq!(*rulings.lock().unwrap(), vec![false, true, true]);
        let summary = with_state(&state, |s| s.summary());
        assert_eq!(summary.interjections, 3);
        assert_eq!(summary.permitted_interjections, 2);
    }

    #[tokio::test]
    async fn test_reactions_feed_the_ledger_both_ways() {
        let bus = EventBus::new().shared();
        let state: SharedState = Arc::new(Mutex::new(DebateState::new("grain", "Grain dole", 1)));
        bus.subscribe(event_types::REACTION, Arc::new(Chair { state: state.clone() }));

        for (topic, kind) in [("grain", ReactionKind::Disagreement), ("roads", ReactionKind::Agreement)] {
            let event = DebateEvent::new(
                "cato",
                EventPayload::Reaction {
                    topic: topic.to_string(),
                    kind,
                    stance: Stance::Oppose,
                    content: "Shameful.".to_string(),
                    intensity: 0.6,
                    origin: ContentOrigin::Template,
                },
            )
            .targeting("caesar");
            bus.publish(event).await;
        }

        // Only the reaction on the current topic counts
        let ledger = with_state(&state, |s| s.relationships.clone());
        assert_eq!(ledger.score("cato", "caesar"), -0.1);
        assert_eq!(ledger.score("caesar", "cato"), -0.1);
        assert_eq!(ledger.len(), 2);
    }

    #[tokio::test]
    async fn test_ledger_survives_next_topic() {
        let bus = EventBus::new().shared();
        let manager = DebateManager::new(bus, agents(&[Rank::Consul, Rank::Senator]), DebateConfig { rounds: 1, shuffle: false });
        with_state(&manager.state, |s| {
            s.record_exchange("senator-0", "senator-1", -0.3);
        });

        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let summary = manager
            .run_debate(&Topic::new("Games for Ceres", "Religious Matters"), &mut rng)
            .await
            .unwrap();
        assert_eq!(summary.topic, "games-for-ceres");
        // At most one reaction each way, each moving the score by 0.1 or less
        let carried = summary.relationships.score("senator-1", "senator-0");
        assert!((-0.5 - 1e-9..=-0.1 + 1e-9).contains(&carried), "carried {}", carried);
        assert!(manager.relationships().len() >= 2);
        assert_eq!(summary.relationships, manager.relationships());
    }

    #[tokio::test]
    async fn test_abort_from_voting() {
        let bus = EventBus::new().shared();
        let manager = DebateManager::new(bus, agents(&[Rank::Consul]), DebateConfig { rounds: 1, shuffle: false });
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        manager
            .run_debate(&Topic::new("Games for Ceres", "Religious Matters"), &mut rng)
            .await
            .unwrap();
        let summary = manager.abort("augurs report ill omens").unwrap();
        assert_eq!(summary.final_phase, DebatePhase::Aborted);
        assert!(manager.state().transitions.iter().any(|t| t.reason == "augurs report ill omens"));
    }
}
