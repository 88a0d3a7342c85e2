//! Probability functions for senator behaviour.
//!
//! Pure functions of a senator's memory and the speech being heard; the
//! caller supplies the RNG so every roll is reproducible under a seed.

use rand::Rng;

use crate::events::{InterjectionKind, ReactionKind};
use crate::senator::{Rank, Stance};

/// Chance of reacting to a speech.
///
/// Strong feelings in either direction toward the speaker, and a better
/// speech, both make a reaction more likely.
pub fn reaction_probability(relationship: f64, quality: f64) -> f64 {
    (0.3 + 0.3 * relationship.abs() + 0.2 * quality).clamp(0.0, 0.95)
}

/// Chance of interjecting during a speech.
///
/// Senior senators interrupt juniors more readily; agitation adds to it.
pub fn interjection_probability(listener: Rank, speaker: Rank, agitation: f64) -> f64 {
    let rank_diff = f64::from(listener.difference(speaker));
    (0.1 + 0.05 * rank_diff + 0.3 * agitation).clamp(0.0, 0.9)
}

/// Chance a speech moves the listener to the speaker's stance.
///
/// Only a listener with a positive relationship can be persuaded; loyalty
/// to the faction line halves the chance at most.
pub fn persuasion_probability(relationship: f64, quality: f64, loyalty: f64) -> f64 {
    let resistance = 1.0 - 0.5 * loyalty.clamp(0.0, 1.0);
    (0.1 * quality * relationship.max(0.0) * resistance).clamp(0.0, 0.1)
}

/// Roll a probability.
pub fn roll<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    let p = if probability.is_finite() {
        probability.clamp(0.0, 1.0)
    } else {
        0.0
    };
    rng.gen_bool(p)
}

/// Pick the kind of reaction given the listener's and speaker's stances.
pub fn reaction_kind<R: Rng + ?Sized>(
    listener: Stance,
    speaker: Stance,
    relationship: f64,
    rng: &mut R,
) -> ReactionKind {
    if listener == speaker && listener != Stance::Neutral {
        if relationship < -0.5 && rng.gen_bool(0.5) {
            ReactionKind::Skepticism
        } else {
            ReactionKind::Agreement
        }
    } else if listener.opposes(speaker) {
        if relationship > 0.5 && rng.gen_bool(0.5) {
            ReactionKind::Skepticism
        } else {
            ReactionKind::Disagreement
        }
    } else {
        match rng.gen_range(0..3) {
            0 => ReactionKind::Amusement,
            1 => ReactionKind::Skepticism,
            _ => ReactionKind::Indifference,
        }
    }
}

/// Pick the kind of interjection.
pub fn interjection_kind<R: Rng + ?Sized>(
    listener: Stance,
    speaker: Stance,
    agitation: f64,
    rng: &mut R,
) -> InterjectionKind {
    if listener == speaker && listener != Stance::Neutral {
        if rng.gen_bool(0.2) {
            InterjectionKind::Collective
        } else {
            InterjectionKind::Acclamation
        }
    } else if agitation > 0.6 {
        InterjectionKind::Emotional
    } else if listener.opposes(speaker) {
        InterjectionKind::Objection
    } else {
        InterjectionKind::Procedural
    }
}

/// Reaction intensity in `[0.0, 1.0]`.
pub fn intensity(relationship: f64, agitation: f64) -> f64 {
    (0.3 + 0.4 * relationship.abs() + 0.3 * agitation).clamp(0.0, 1.0)
}

/// Speech quality from eloquence with a little noise.
pub fn speech_quality<R: Rng + ?Sized>(eloquence: f64, rng: &mut R) -> f64 {
    (eloquence * 0.8 + rng.gen_range(0.0..0.2)).clamp(0.0, 1.0)
}
