//! Chamber-wide relationship ledger.
//!
//! Unlike an agent's own memory, the ledger records every exchange in both
//! directions. It outlives a single debate: the manager hands it from one
//! topic to the next so the session report shows the whole sitting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::senator::SenatorId;

/// Scores from one senator toward another, each in `[-1.0, 1.0]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipLedger {
    scores: BTreeMap<SenatorId, BTreeMap<SenatorId, f64>>,
}

impl RelationshipLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score from `from` toward `to`. Unknown pairs are 0.
    pub fn score(&self, from: &str, to: &str) -> f64 {
        self.scores
            .get(from)
            .and_then(|row| row.get(to))
            .copied()
            .unwrap_or(0.0)
    }

    /// Adjust one direction; returns the new clamped score.
    pub fn adjust(&mut self, from: &str, to: &str, delta: f64) -> f64 {
        let entry = self
            .scores
            .entry(from.to_string())
            .or_default()
            .entry(to.to_string())
            .or_insert(0.0);
        if delta.is_finite() {
            *entry = (*entry + delta).clamp(-1.0, 1.0);
        }
        *entry
    }

    /// Adjust both directions by the same delta; returns `(a → b, b → a)`.
    pub fn exchange(&mut self, a: &str, b: &str, delta: f64) -> (f64, f64) {
        (self.adjust(a, b, delta), self.adjust(b, a, delta))
    }

    /// Directed pairs with a recorded score.
    pub fn len(&self) -> usize {
        self.scores.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(from, to, score)` for every recorded pair, ordered by ids.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str, f64)> + '_ {
        self.scores.iter().flat_map(|(from, row)| {
            row.iter()
                .map(move |(to, score)| (from.as_str(), to.as_str(), *score))
        })
    }

    /// The most hostile recorded pair, if any score is below zero.
    pub fn bitterest(&self) -> Option<(&str, &str, f64)> {
        self.pairs()
            .filter(|(_, _, score)| *score < 0.0)
            .min_by(|a, b| a.2.total_cmp(&b.2))
    }
}
