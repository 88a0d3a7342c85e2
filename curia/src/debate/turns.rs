//! Speaking order and the rule for interrupting a speaker.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::senator::{Rank, Senator, SenatorId};

/// Whether an interjection may disrupt the current speaker.
///
/// A senator may interrupt anyone of equal or lower rank.
pub fn may_interrupt(interjector: Rank, speaker: Rank) -> bool {
    interjector >= speaker
}

/// The presiding magistrate: the highest-ranked senator, earliest on the
/// roster when ranks are equal.
pub fn presiding_magistrate(senators: &[Senator]) -> Option<&Senator> {
    senators
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| a.rank.cmp(&b.rank).then(ib.cmp(ia)))
        .map(|(_, s)| s)
}

/// Order in which senators take the floor each round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOrder {
    speakers: Vec<SenatorId>,
    shuffle: bool,
}

impl TurnOrder {
    /// Fixed list order every round.
    pub fn fixed(speakers: Vec<SenatorId>) -> Self {
        Self {
            speakers,
            shuffle: false,
        }
    }

    /// Reshuffled every round from the caller's RNG.
    pub fn shuffled(speakers: Vec<SenatorId>) -> Self {
        Self {
            speakers,
            shuffle: true,
        }
    }

    /// Speakers in roster order.
    pub fn speakers(&self) -> &[SenatorId] {
        &self.speakers
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffle
    }

    pub fn len(&self) -> usize {
        self.speakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }

    /// Order for the next round.
    pub fn next_round<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<SenatorId> {
        let mut order = self.speakers.clone();
        if self.shuffle {
            order.shuffle(rng);
        }
        order
    }
}
