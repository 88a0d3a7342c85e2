//! A sitting of the Senate: ceremony, roll call, agenda, then a debate and
//! vote per topic, then adjournment. Every step is announced on the bus.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use curia::debate::{presiding_magistrate, DebateError, DebateSummary, RelationshipLedger};
use curia::events::{
    event_types, DebateEvent, EventBus, EventBusResult, EventHandler, EventPayload,
    SharedEventBus, TopicId,
};
use curia::senator::{generate_roster, Senator, SenatorId};
use curia::topics::Topic;
use curia::voting::{TieBreak, VotePolicy, VoteRecord, VoteResult};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::agents::{AgentSettings, SenatorAgent};
use crate::llm::LlmSet;
use crate::manager::{DebateConfig, DebateManager};
use crate::prompts;

const OPENING_CEREMONY: &str = "The augurs have taken the auspices and found them favourable. \
The doors of the Curia stand open; the Senate of Rome is in session.";
const CLOSING_WORDS: &str = "Nihil amplius vos moramur, patres conscripti. The Senate stands adjourned.";

/// Session parameters.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub senators: usize,
    pub rounds: u32,
    /// Topics on the agenda.
    pub topics: usize,
    pub seed: u64,
    pub tie_break: TieBreak,
    pub year: i32,
    pub shuffle: bool,
    pub agent: AgentSettings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            senators: 10,
            rounds: 3,
            topics: 3,
            seed: 42,
            tie_break: TieBreak::default(),
            year: -63,
            shuffle: false,
            agent: AgentSettings::default(),
        }
    }
}

/// Error type for session runs
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("The chamber is empty")]
    EmptyChamber,

    #[error("No topics on the agenda")]
    NoTopics,

    #[error("Topic {0} is on the agenda twice")]
    DuplicateTopic(TopicId),

    #[error("Debate failed: {0}")]
    Debate(#[from] DebateError),
}

/// Debate and vote on one topic.
#[derive(Debug, Clone, Serialize)]
pub struct TopicReport {
    pub topic: Topic,
    pub debate: DebateSummary,
    pub result: VoteResult,
}

/// Everything decided in a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: String,
    pub year: i32,
    pub presiding: Option<SenatorId>,
    pub topics: Vec<TopicReport>,
    /// Shared ledger after the last debate.
    pub relationships: RelationshipLedger,
}

impl SessionReport {
    /// Motions that carried, tie-breaks included.
    pub fn carried(&self) -> usize {
        self.topics.iter().filter(|t| t.result.carried()).count()
    }

    pub fn summary_line(&self) -> String {
        format!(
            "[{}] session {} | {} topics | {} carried",
            prompts::era(self.year),
            self.session_id,
            self.topics.len(),
            self.carried()
        )
    }
}

/// Collects `senator.vote_cast` events until the topic is tallied.
#[derive(Default)]
struct VoteCollector {
    votes: Mutex<Vec<(TopicId, VoteRecord)>>,
}

impl VoteCollector {
    /// Remove and return the votes cast on `topic`.
    fn take(&self, topic: &str) -> Vec<VoteRecord> {
        let mut votes = self.votes.lock().unwrap_or_else(PoisonError::into_inner);
        let (taken, kept): (Vec<_>, Vec<_>) = votes.drain(..).partition(|(t, _)| t == topic);
        *votes = kept;
        taken.into_iter().map(|(_, record)| record).collect()
    }
}

#[async_trait]
impl EventHandler for VoteCollector {
    fn name(&self) -> &str {
        "vote-collector"
    }

    async fn handle(&self, event: &DebateEvent, _bus: &EventBus) -> EventBusResult<()> {
        if let EventPayload::VoteCast {
            topic,
            faction,
            vote,
            debate_stance,
        } = &event.payload
        {
            self.votes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((
                    topic.clone(),
                    VoteRecord {
                        senator: event.source.clone(),
                        faction: *faction,
                        vote: *vote,
                        debate_stance: *debate_stance,
                    },
                ));
        }
        Ok(())
    }
}

pub struct SenateSession {
    id: String,
    config: SessionConfig,
    bus: SharedEventBus,
    roster: Vec<Senator>,
    manager: DebateManager,
    collector: Arc<VoteCollector>,
    rng: ChaCha8Rng,
}

impl SenateSession {
    /// Session with a generated roster of `config.senators` senators.
    pub fn new(config: SessionConfig, bus: SharedEventBus, llm: LlmSet) -> Result<Self, SessionError> {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let roster = generate_roster(config.senators, &mut rng);
        Self::build(config, bus, llm, roster, rng)
    }

    /// Session with a fixed roster.
    pub fn with_roster(
        config: SessionConfig,
        bus: SharedEventBus,
        llm: LlmSet,
        roster: Vec<Senator>,
    ) -> Result<Self, SessionError> {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self::build(config, bus, llm, roster, rng)
    }

    fn build(
        config: SessionConfig,
        bus: SharedEventBus,
        llm: LlmSet,
        roster: Vec<Senator>,
        rng: ChaCha8Rng,
    ) -> Result<Self, SessionError> {
        if roster.is_empty() {
            return Err(SessionError::EmptyChamber);
        }

        let policy = Arc::new(VotePolicy::default());
        let agents: Vec<Arc<SenatorAgent>> = roster
            .iter()
            .enumerate()
            .map(|(idx, senator)| {
                let agent = SenatorAgent::new(
                    senator.clone(),
                    llm.clone(),
                    policy.clone(),
                    SenatorAgent::seed_for(config.seed, idx),
                )
                .with_settings(config.agent)
                .shared();
                agent.subscribe(&bus);
                agent
            })
            .collect();

        let collector = Arc::new(VoteCollector::default());
        bus.subscribe(event_types::VOTE_CAST, collector.clone());

        let manager = DebateManager::new(
            bus.clone(),
            agents,
            DebateConfig {
                rounds: config.rounds,
                shuffle: config.shuffle,
            },
        );

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            config,
            bus,
            roster,
            manager,
            collector,
            rng,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn roster(&self) -> &[Senator] {
        &self.roster
    }

    pub fn bus(&self) -> &SharedEventBus {
        &self.bus
    }

    pub fn agents(&self) -> &[Arc<SenatorAgent>] {
        self.manager.agents()
    }

    /// Run the full session over `topics`.
    pub async fn run(&mut self, topics: Vec<Topic>) -> Result<SessionReport, SessionError> {
        if topics.is_empty() {
            return Err(SessionError::NoTopics);
        }
        let mut seen = HashSet::new();
        if let Some(dup) = topics.iter().find(|t| !seen.insert(t.id.as_str())) {
            return Err(SessionError::DuplicateTopic(dup.id.clone()));
        }
        let presiding = presiding_magistrate(&self.roster);

        info!(
            session = %self.id,
            year = %prompts::era(self.config.year),
            senators = self.roster.len(),
            presiding = presiding.map(|s| s.name.as_str()).unwrap_or("none"),
            "Session opened"
        );
        self.bus
            .publish(DebateEvent::from_senate(EventPayload::SessionOpened {
                session_id: self.id.clone(),
                year: self.config.year,
                presiding: presiding.map(|s| s.id.clone()),
                ceremony: OPENING_CEREMONY.to_string(),
            }))
            .await;
        self.bus
            .publish(DebateEvent::from_senate(EventPayload::AttendanceTaken {
                present: self.roster.iter().map(|s| s.id.clone()).collect(),
                absent: Vec::new(),
            }))
            .await;
        self.bus
            .publish(DebateEvent::from_senate(EventPayload::AgendaAnnounced {
                topics: topics.iter().map(|t| t.id.clone()).collect(),
            }))
            .await;

        let mut reports = Vec::with_capacity(topics.len());
        for topic in topics {
            self.manager.run_debate(&topic, &mut self.rng).await?;

            self.bus
                .publish(DebateEvent::from_senate(EventPayload::VoteRequested {
                    topic: topic.id.clone(),
                    title: topic.title.clone(),
                }))
                .await;

            let records = self.collector.take(&topic.id);
            if records.len() != self.roster.len() {
                warn!(
                    topic = %topic.id,
                    votes = records.len(),
                    senators = self.roster.len(),
                    "Not every senator voted"
                );
            }
            let mut result = VoteResult::tally(&topic.id, records);
            result.resolve_tie(self.config.tie_break, presiding, &mut self.rng);
            let outcome = result.outcome();

            info!(
                topic = %topic.id,
                in_favor = result.counts.in_favor,
                against = result.counts.against,
                abstain = result.counts.abstain,
                %outcome,
                carried = result.carried(),
                "Vote tallied"
            );
            self.bus
                .publish(DebateEvent::from_senate(EventPayload::VoteTallied {
                    topic: topic.id.clone(),
                    counts: result.counts,
                    outcome,
                    carried: result.carried(),
                }))
                .await;

            let debate = self.manager.conclude(&format!("vote {}", outcome))?;
            reports.push(TopicReport {
                topic,
                debate,
                result,
            });
        }

        self.bus
            .publish(DebateEvent::from_senate(EventPayload::SessionAdjourned {
                session_id: self.id.clone(),
                topics_decided: reports.len() as u32,
                closing: CLOSING_WORDS.to_string(),
            }))
            .await;

        let report = SessionReport {
            session_id: self.id.clone(),
            year: self.config.year,
            presiding: presiding.map(|s| s.id.clone()),
            topics: reports,
            relationships: self.manager.relationships(),
        };
        info!("{}", report.summary_line());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockProvider;
    use curia::voting::VoteChoice;

    fn mock_llm() -> LlmSet {
        LlmSet::uniform(Arc::new(MockProvider::new("mock")))
    }

    #[test]
    fn test_empty_chamber_rejected() {
        let result = SenateSession::with_roster(
            SessionConfig::default(),
            EventBus::new().shared(),
            mock_llm(),
            Vec::new(),
        );
        assert!(matches!(result, Err(SessionError::EmptyChamber)));
    }

    #[tokio::test]
    async fn test_no_topics_rejected() {
        let config = SessionConfig {
            senators: 3,
            ..SessionConfig::default()
        };
        let mut session = SenateSession::new(config, EventBus::new().shared(), mock_llm()).unwrap();
        assert_eq!(session.roster().len(), 3);
        assert!(matches!(session.run(Vec::new()).await, Err(SessionError::NoTopics)));
    }

    #[tokio::test]
    async fn test_duplicate_topic_rejected_before_opening() {
        let bus = EventBus::new().shared();
        let config = SessionConfig {
            senators: 3,
            ..SessionConfig::default()
        };
        let mut session = SenateSession::new(config, bus.clone(), mock_llm()).unwrap();
        let mut tap = bus.tap();

        let result = session
            .run(vec![
                Topic::new("Grain Dole", "Grain Supply"),
                Topic::new("grain dole!", "Grain Supply"),
            ])
            .await;
        assert!(matches!(result, Err(SessionError::DuplicateTopic(id)) if id == "grain-dole"));
        assert!(tap.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_collector_partitions_by_topic() {
        let collector = VoteCollector::default();
        let bus = EventBus::new();
        for (who, topic) in [("a", "grain"), ("b", "roads"), ("c", "grain")] {
            let event = DebateEvent::new(
                who,
                EventPayload::VoteCast {
                    topic: topic.to_string(),
                    faction: curia::senator::Faction::Populares,
                    vote: VoteChoice::For,
                    debate_stance: curia::senator::Stance::Support,
                },
            );
            collector.handle(&event, &bus).await.unwrap();
        }
        let grain = collector.take("grain");
        assert_eq!(grain.iter().map(|r| r.senator.as_str()).collect::<Vec<_>>(), ["a", "c"]);
        assert_eq!(collector.take("roads").len(), 1);
        assert!(collector.take("grain").is_empty());
    }
}
