//! Chamber integration test: drives the bus, debate state, agent memory
//! and vote tally together with hand-written handlers (no LLM calls).

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use curia::debate::{may_interrupt, DebatePhase, DebateState, InterjectionRecord};
use curia::events::{
    event_types, ContentOrigin, DebateEvent, EventBus, EventBusResult, EventHandler,
    EventHistory, EventPayload, InterjectionKind,
};
use curia::memory::AgentMemory;
use curia::senator::{Faction, Rank, Senator, Stance, Traits};
use curia::voting::{TieBreak, VoteChoice, VoteCounts, VoteOutcome, VotePolicy, VoteRecord, VoteResult};

fn senator(id: &str, faction: Faction, rank: Rank) -> Senator {
    Senator::new(id, id, faction, rank, Traits::default())
}

fn speech(speaker: &Senator, topic: &str) -> DebateEvent {
    DebateEvent::new(
        &speaker.id,
        EventPayload::SpeechDelivered {
            topic: topic.to_string(),
            round: 1,
            faction: speaker.faction,
            rank: speaker.rank,
            stance: Stance::Support,
            content: "Rome must build.".to_string(),
            quality: 0.9,
            origin: ContentOrigin::Template,
        },
    )
}

/// Listener that interjects on every speech by someone else.
struct Heckler {
    me: Senator,
    memory: Mutex<AgentMemory>,
}

#[async_trait]
impl EventHandler for Heckler {
    fn name(&self) -> &str {
        &self.me.id
    }

    async fn handle(&self, event: &DebateEvent, bus: &EventBus) -> EventBusResult<()> {
        if event.source == self.me.id {
            return Ok(());
        }
        let topic = event.topic().unwrap_or_default().to_string();
        {
            let mut memory = self.memory.lock().unwrap();
            memory.observe(event);
            memory.adjust_relationship(&event.source, -0.1);
        }
        let interjection = DebateEvent::new(
            &self.me.id,
            EventPayload::Interjection {
                topic,
                kind: InterjectionKind::Objection,
                rank: self.me.rank,
                stance: Stance::Oppose,
                content: "Nonsense!".to_string(),
                intensity: 0.6,
                origin: ContentOrigin::Template,
            },
        )
        .targeting(&event.source);
        bus.publish(interjection).await;
        Ok(())
    }
}

/// Chair that rules interjections against the current speaker's rank.
struct Chair {
    speaker_rank: Rank,
    state: Arc<Mutex<DebateState>>,
}

#[async_trait]
impl EventHandler for Chair {
    fn name(&self) -> &str {
        "chair"
    }

    async fn handle(&self, event: &DebateEvent, _bus: &EventBus) -> EventBusResult<()> {
        if let EventPayload::Interjection { kind, rank, .. } = &event.payload {
            let mut state = self.state.lock().unwrap();
            let round = state.current_round;
            state.record_interjection(InterjectionRecord {
                round,
                interjector: event.source.clone(),
                speaker: event.target.clone().unwrap_or_default(),
                kind: *kind,
                permitted: may_interrupt(*rank, self.speaker_rank),
            });
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_interjections_ruled_by_rank() {
    let history = EventHistory::new().shared();
    let bus = EventBus::with_history(history.clone());

    let speaker = senator("cicero", Faction::Optimates, Rank::Praetor);
    let junior = Arc::new(Heckler {
        me: senator("clodius", Faction::Populares, Rank::Quaestor),
        memory: Mutex::new(AgentMemory::new()),
    });
    let senior = Arc::new(Heckler {
        me: senator("pompey", Faction::Military, Rank::Consul),
        memory: Mutex::new(AgentMemory::new()),
    });

    let state = Arc::new(Mutex::new(DebateState::new("aqueduct", "Aqueduct", 1)));
    {
        let mut s = state.lock().unwrap();
        s.transition(DebatePhase::Opening, "introduced").unwrap();
        s.transition(DebatePhase::Speaking, "stances").unwrap();
        s.begin_round().unwrap();
        s.give_floor(&speaker.id, speaker.rank);
    }

    bus.subscribe(event_types::SPEECH_DELIVERED, junior.clone());
    bus.subscribe(event_types::SPEECH_DELIVERED, senior.clone());
    bus.subscribe(
        event_types::INTERJECTION,
        Arc::new(Chair {
            speaker_rank: speaker.rank,
            state: state.clone(),
        }),
    );

    let report = bus.publish(speech(&speaker, "aqueduct")).await;
    assert_eq!(report.delivered, 2);

    let summary = state.lock().unwrap().summary();
    assert_eq!(summary.interjections, 2);
    assert_eq!(summary.permitted_interjections, 1);

    let ruled: Vec<(String, bool)> = state
        .lock()
        .unwrap()
        .interjections
        .iter()
        .map(|i| (i.interjector.clone(), i.permitted))
        .collect();
    assert_eq!(
        ruled,
        vec![("clodius".to_string(), false), ("pompey".to_string(), true)]
    );

    // The speech is recorded before the interjections its handlers publish.
    let types: Vec<&str> = history.events().iter().map(|e| e.event_type()).collect();
    assert_eq!(
        types,
        vec![
            event_types::SPEECH_DELIVERED,
            event_types::INTERJECTION,
            event_types::INTERJECTION
        ]
    );

    let memory = junior.memory.lock().unwrap();
    assert!(memory.relationship("cicero") < 0.0);
    assert_eq!(memory.observations().len(), 1);
}

#[tokio::test]
async fn test_seeded_vote_scenario() {
    let policy = VotePolicy::empty().with_faction_weights(Faction::Optimates, [0.4, 0.5, 0.1]);
    let roster = [
        senator("cato", Faction::Optimates, Rank::Consul),
        senator("hortensius", Faction::Optimates, Rank::Senator),
        senator("bibulus", Faction::Optimates, Rank::Aedile),
    ];

    let bus = EventBus::new();
    let collected = Arc::new(Mutex::new(Vec::new()));
    let sink = collected.clone();
    bus.subscribe_fn(event_types::VOTE_CAST, move |event| {
        if let EventPayload::VoteCast {
            faction,
            vote,
            debate_stance,
            ..
        } = &event.payload
        {
            sink.lock().unwrap().push(VoteRecord {
                senator: event.source.clone(),
                faction: *faction,
                vote: *vote,
                debate_stance: *debate_stance,
            });
        }
    });

    let mut rng = ChaCha8Rng::seed_from_u64(22);
    for s in &roster {
        let vote = policy.decide(s.faction, Stance::Neutral, &mut rng);
        bus.publish(DebateEvent::new(
            &s.id,
            EventPayload::VoteCast {
                topic: "land".to_string(),
                faction: s.faction,
                vote,
                debate_stance: Stance::Neutral,
            },
        ))
        .await;
    }

    let records = collected.lock().unwrap().clone();
    assert_eq!(records[1].senator, "hortensius");
    assert_eq!(records[1].vote, VoteChoice::For);
    let mut result = VoteResult::tally("land", records);
    assert_eq!(
        result.counts,
        VoteCounts {
            in_favor: 1,
            against: 2,
            abstain: 0
        }
    );
    assert_eq!(result.outcome(), VoteOutcome::Rejected);
    assert!(result
        .resolve_tie(TieBreak::ConsulDecides, roster.first(), &mut rng)
        .is_none());
    assert!(!result.carried());
}
