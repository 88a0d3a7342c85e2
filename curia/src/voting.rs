//! Vote casting and tallying.
//!
//! A senator's vote is drawn from its debate stance plus faction-dependent
//! noise ([`VotePolicy`]). Votes for a topic are tallied into a
//! [`VoteResult`] whose outcome is always derived from the counts; tie
//! resolution is recorded beside it and never rewrites the outcome.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::events::TopicId;
use crate::senator::{Faction, Senator, SenatorId, Stance};

/// A single ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    For,
    Against,
    Abstain,
}

impl VoteChoice {
    /// Order used by weight arrays: `[for, against, abstain]`.
    pub const ALL: [VoteChoice; 3] = [VoteChoice::For, VoteChoice::Against, VoteChoice::Abstain];
}

impl std::fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::For => write!(f, "for"),
            Self::Against => write!(f, "against"),
            Self::Abstain => write!(f, "abstain"),
        }
    }
}

/// Ballot counts for one topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCounts {
    #[serde(rename = "for")]
    pub in_favor: u32,
    pub against: u32,
    pub abstain: u32,
}

impl VoteCounts {
    /// Count one ballot.
    pub fn add(&mut self, choice: VoteChoice) {
        match choice {
            VoteChoice::For => self.in_favor += 1,
            VoteChoice::Against => self.against += 1,
            VoteChoice::Abstain => self.abstain += 1,
        }
    }

    /// Count for a given choice.
    pub fn get(&self, choice: VoteChoice) -> u32 {
        match choice {
            VoteChoice::For => self.in_favor,
            VoteChoice::Against => self.against,
            VoteChoice::Abstain => self.abstain,
        }
    }

    pub fn total(&self) -> u32 {
        self.in_favor + self.against + self.abstain
    }
}

/// Outcome derived from counts alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteOutcome {
    Passed,
    Rejected,
    Tie,
}

impl VoteOutcome {
    /// Passed iff for > against; Rejected iff for < against; otherwise Tie.
    pub fn from_counts(counts: &VoteCounts) -> Self {
        match counts.in_favor.cmp(&counts.against) {
            std::cmp::Ordering::Greater => Self::Passed,
            std::cmp::Ordering::Less => Self::Rejected,
            std::cmp::Ordering::Equal => Self::Tie,
        }
    }
}

impl std::fmt::Display for VoteOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Rejected => write!(f, "rejected"),
            Self::Tie => write!(f, "tie"),
        }
    }
}

/// One senator's recorded vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub senator: SenatorId,
    pub faction: Faction,
    pub vote: VoteChoice,
    /// Stance held at the end of the debate.
    pub debate_stance: Stance,
}

/// How to settle a tied vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The presiding magistrate decides.
    #[default]
    ConsulDecides,
    /// Seeded coin flip.
    Random,
    /// A tie does not carry.
    StatusQuo,
}

impl std::fmt::Display for TieBreak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConsulDecides => write!(f, "consul"),
            Self::Random => write!(f, "random"),
            Self::StatusQuo => write!(f, "status-quo"),
        }
    }
}

impl std::str::FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "consul" | "consul-decides" | "consul_decides" => Ok(Self::ConsulDecides),
            "random" | "coin" => Ok(Self::Random),
            "status-quo" | "status_quo" | "statusquo" => Ok(Self::StatusQuo),
            other => Err(format!(
                "unknown tie-break policy '{other}' (expected consul, random, status-quo)"
            )),
        }
    }
}

/// How a tie was settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TieResolution {
    pub policy: TieBreak,
    /// Senator who cast the deciding voice, if any.
    pub decided_by: Option<SenatorId>,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Tally of all votes on one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteResult {
    pub topic: TopicId,
    pub counts: VoteCounts,
    pub records: Vec<VoteRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tie_resolution: Option<TieResolution>,
}

impl VoteResult {
    /// Tally a set of records.
    pub fn tally(topic: &str, records: Vec<VoteRecord>) -> Self {
        let mut counts = VoteCounts::default();
        for record in &records {
            counts.add(record.vote);
        }
        Self {
            topic: topic.to_string(),
            counts,
            records,
            tie_resolution: None,
        }
    }

    /// Outcome derived from the counts.
    pub fn outcome(&self) -> VoteOutcome {
        VoteOutcome::from_counts(&self.counts)
    }

    /// Whether the motion carries, counting a resolved tie.
    pub fn carried(&self) -> bool {
        match self.outcome() {
            VoteOutcome::Passed => true,
            VoteOutcome::Rejected => false,
            VoteOutcome::Tie => self.tie_resolution.as_ref().is_some_and(|r| r.passed),
        }
    }

    /// Vote cast by a senator, if any.
    pub fn vote_of(&self, senator: &str) -> Option<VoteChoice> {
        self.records
            .iter()
            .find(|r| r.senator == senator)
            .map(|r| r.vote)
    }

    /// Settle a tie. No-op unless the outcome is `Tie`.
    ///
    /// `presiding` is the highest-ranked senator present.
    pub fn resolve_tie<R: Rng + ?Sized>(
        &mut self,
        policy: TieBreak,
        presiding: Option<&Senator>,
        rng: &mut R,
    ) -> Option<&TieResolution> {
        if self.outcome() != VoteOutcome::Tie {
            return None;
        }

        let resolution = match policy {
            TieBreak::ConsulDecides => {
                warn!(
                    topic = %self.topic,
                    presiding = presiding.map(|s| s.id.as_str()).unwrap_or("none"),
                    "Consul tie-break always passes the motion; the presiding senator's stance is not consulted"
                );
                TieResolution {
                    policy,
                    decided_by: presiding.map(|s| s.id.clone()),
                    passed: true,
                    note: Some("consul decision ignores the consul's own stance".to_string()),
                }
            }
            TieBreak::Random => TieResolution {
                policy,
                decided_by: None,
                passed: rng.gen_bool(0.5),
                note: None,
            },
            TieBreak::StatusQuo => TieResolution {
                policy,
                decided_by: None,
                passed: false,
                note: None,
            },
        };

        info!(
            topic = %self.topic,
            policy = %policy,
            passed = resolution.passed,
            "Tie resolved"
        );
        self.tie_resolution = Some(resolution);
        self.tie_resolution.as_ref()
    }
}

/// Turns a debate stance into a ballot.
///
/// Weights are `[for, against, abstain]`. The faction row is noise added to
/// every senator of that faction; the stance bias is added to the choice
/// matching the senator's stance.
#[derive(Debug, Clone)]
pub struct VotePolicy {
    faction_weights: HashMap<Faction, [f64; 3]>,
    stance_bias: f64,
}

impl Default for VotePolicy {
    fn default() -> Self {
        let faction_weights = HashMap::from([
            (Faction::Optimates, [0.05, 0.15, 0.05]),
            (Faction::Populares, [0.15, 0.05, 0.05]),
            (Faction::Military, [0.1, 0.1, 0.02]),
            (Faction::Religious, [0.08, 0.08, 0.1]),
            (Faction::Merchant, [0.1, 0.05, 0.1]),
        ]);
        Self {
            faction_weights,
            stance_bias: 1.0,
        }
    }
}

impl VotePolicy {
    /// Policy with no faction noise and no stance bias; every vote abstains
    /// until weights are added.
    pub fn empty() -> Self {
        Self {
            faction_weights: HashMap::new(),
            stance_bias: 0.0,
        }
    }

    pub fn with_faction_weights(mut self, faction: Faction, weights: [f64; 3]) -> Self {
        self.faction_weights.insert(faction, weights);
        self
    }

    pub fn with_stance_bias(mut self, bias: f64) -> Self {
        self.stance_bias = bias;
        self
    }

    /// Effective `[for, against, abstain]` weights for a senator.
    pub fn weights(&self, faction: Faction, stance: Stance) -> [f64; 3] {
        let mut weights = self
            .faction_weights
            .get(&faction)
            .copied()
            .unwrap_or([0.0; 3]);
        let idx = match stance {
            Stance::Support => 0,
            Stance::Oppose => 1,
            Stance::Neutral => 2,
        };
        weights[idx] += self.stance_bias;
        weights.map(|w| if w.is_finite() && w > 0.0 { w } else { 0.0 })
    }

    /// Draw a ballot.
    pub fn decide<R: Rng + ?Sized>(&self, faction: Faction, stance: Stance, rng: &mut R) -> VoteChoice {
        let weights = self.weights(faction, stance);
        match WeightedIndex::new(weights) {
            Ok(dist) => VoteChoice::ALL[dist.sample(rng)],
            Err(e) => {
                debug!(%faction, %stance, "No usable vote weights ({}), abstaining", e);
                VoteChoice::Abstain
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::senator::{Rank, Traits};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn record(id: &str, faction: Faction, vote: VoteChoice) -> VoteRecord {
        VoteRecord {
            senator: id.to_string(),
            faction,
            vote,
            debate_stance: Stance::Neutral,
        }
    }

    #[test]
    fn test_outcome_derived_from_counts() {
        use VoteChoice::*;
        let cases = [
            (vec![For, For, Against], VoteOutcome::Passed),
            (vec![For, Against, Against], VoteOutcome::Rejected),
            (vec![For, Against, Abstain], VoteOutcome::Tie),
            (vec![Abstain, Abstain], VoteOutcome::Tie),
            (vec![], VoteOutcome::Tie),
        ];
        for (votes, expected) in cases {
            let records = votes
                .into_iter()
                .enumerate()
                .map(|(i, v)| record(&format!("s{i}"), Faction::Merchant, v))
                .collect();
            let result = VoteResult::tally("t", records);
            assert_eq!(result.outcome(), expected);
            assert_eq!(
                result.outcome() == VoteOutcome::Passed,
                result.counts.in_favor > result.counts.against
            );
        }
    }

    #[test]
    fn test_counts_serialize_with_for_key() {
        let mut counts = VoteCounts::default();
        counts.add(VoteChoice::For);
        let json = serde_json::to_string(&counts).unwrap();
        assert_eq!(json, r#"{"for":1,"against":0,"abstain":0}"#);
    }

    #[test]
    fn test_tie_resolution_does_not_rewrite_outcome() {
        let consul = Senator::new("caesar-0", "Caesar", Faction::Populares, Rank::Consul, Traits::default());
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut result = VoteResult::tally(
            "t",
            vec![
                record("a", Faction::Merchant, VoteChoice::For),
                record("b", Faction::Merchant, VoteChoice::Against),
            ],
        );

        let resolution = result
            .resolve_tie(TieBreak::ConsulDecides, Some(&consul), &mut rng)
            .cloned()
            .unwrap();
        assert!(resolution.passed);
        assert_eq!(resolution.decided_by.as_deref(), Some("caesar-0"));
        assert!(resolution.note.is_some());
        assert_eq!(result.outcome(), VoteOutcome::Tie);
        assert!(result.carried());
    }

    #[test]
    fn test_status_quo_and_non_tie() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut tie = VoteResult::tally("t", vec![]);
        tie.resolve_tie(TieBreak::StatusQuo, None, &mut rng);
        assert!(!tie.carried());

        let mut passed = VoteResult::tally("t", vec![record("a", Faction::Merchant, VoteChoice::For)]);
        assert!(passed.resolve_tie(TieBreak::StatusQuo, None, &mut rng).is_none());
        assert!(passed.tie_resolution.is_none());
        assert!(passed.carried());
    }

    #[test]
    fn test_random_tie_is_seeded() {
        let outcomes: Vec<bool> = (0..2)
            .map(|_| {
                let mut rng = ChaCha8Rng::seed_from_u64(42);
                let mut tie = VoteResult::tally("t", vec![]);
                tie.resolve_tie(TieBreak::Random, None, &mut rng);
                tie.carried()
            })
            .collect();
        assert_eq!(outcomes[0], outcomes[1]);
    }

    #[test]
    fn test_seeded_faction_noise_tally() {
        let policy = VotePolicy::empty().with_faction_weights(Faction::Optimates, [0.4, 0.5, 0.1]);
        let mut rng = ChaCha8Rng::seed_from_u64(22);

        let records: Vec<VoteRecord> = ["cato", "bibulus", "hortensius"]
            .iter()
            .map(|id| VoteRecord {
                senator: id.to_string(),
                faction: Faction::Optimates,
                vote: policy.decide(Faction::Optimates, Stance::Neutral, &mut rng),
                debate_stance: Stance::Neutral,
            })
            .collect();
        let ballots: Vec<VoteChoice> = records.iter().map(|r| r.vote).collect();
        assert_eq!(
            ballots,
            [VoteChoice::Against, VoteChoice::For, VoteChoice::Against]
        );

        let result = VoteResult::tally("t", records);
        assert_eq!(
            result.counts,
            VoteCounts {
                in_favor: 1,
                against: 2,
                abstain: 0
            }
        );
        assert_eq!(result.outcome(), VoteOutcome::Rejected);
    }

    #[test]
    fn test_zero_weights_abstain() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let vote = VotePolicy::empty().decide(Faction::Military, Stance::Support, &mut rng);
        assert_eq!(vote, VoteChoice::Abstain);
    }

    #[test]
    fn test_stance_bias_dominates_default_policy() {
        let policy = VotePolicy::default();
        let w = policy.weights(Faction::Optimates, Stance::Support);
        assert!(w[0] > w[1] && w[0] > w[2]);
    }

    #[test]
    fn test_tie_break_parse() {
        assert_eq!("consul".parse::<TieBreak>().unwrap(), TieBreak::ConsulDecides);
        assert_eq!("status-quo".parse::<TieBreak>().unwrap(), TieBreak::StatusQuo);
        assert!("senate".parse::<TieBreak>().is_err());
    }
}
