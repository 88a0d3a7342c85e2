//! Fallback content when text generation fails.
//!
//! Generation never surfaces an error to the debate. A failed model call is
//! replaced by a one-line template keyed by faction and stance, and the
//! result is marked with [`ContentOrigin::Template`] so consumers can tell.
//!
//! ```text
//! generate
//!   ├─ model succeeds → Generated { origin: Llm, .. }
//!   └─ model fails    → Generated { origin: Template, warning, .. }
//! ```

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::events::{ContentOrigin, InterjectionKind, ReactionKind};
use crate::senator::{Faction, Senator, Stance};

/// A value wrapped with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generated<T> {
    pub value: T,
    pub origin: ContentOrigin,
    /// Model or template that produced the value.
    pub served_by: String,
    /// Why the fallback was used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl<T> Generated<T> {
    /// Value produced by the model.
    pub fn llm(value: T, model: &str) -> Self {
        Self {
            value,
            origin: ContentOrigin::Llm,
            served_by: model.to_string(),
            warning: None,
        }
    }

    /// Value produced by a template after a failure.
    pub fn template(value: T, warning: impl Into<String>) -> Self {
        Self {
            value,
            origin: ContentOrigin::Template,
            served_by: "template".to_string(),
            warning: Some(warning.into()),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == ContentOrigin::Template
    }

    /// Transform the value, keeping provenance.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Generated<U> {
        Generated {
            value: f(self.value),
            origin: self.origin,
            served_by: self.served_by,
            warning: self.warning,
        }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Stance drawn from the faction's bias.
pub fn faction_stance<R: Rng + ?Sized>(faction: Faction, rng: &mut R) -> Stance {
    const STANCES: [Stance; 3] = [Stance::Support, Stance::Oppose, Stance::Neutral];
    match WeightedIndex::new(faction.stance_weights()) {
        Ok(dist) => STANCES[dist.sample(rng)],
        Err(_) => Stance::Neutral,
    }
}

fn faction_phrase(faction: Faction) -> &'static str {
    match faction {
        Faction::Optimates => "the ancestral custom of our fathers",
        Faction::Populares => "the people of Rome",
        Faction::Military => "the safety of our legions",
        Faction::Religious => "the favour of the gods",
        Faction::Merchant => "the prosperity of our trade",
    }
}

/// One-sentence speech.
pub fn speech(senator: &Senator, topic: &str, stance: Stance) -> String {
    let phrase = faction_phrase(senator.faction);
    match stance {
        Stance::Support => format!(
            "Patres conscripti, I, {}, support the measure on {}, for it serves {}.",
            senator.styled_name(),
            topic,
            phrase
        ),
        Stance::Oppose => format!(
            "Patres conscripti, I, {}, oppose the measure on {}, for it endangers {}.",
            senator.styled_name(),
            topic,
            phrase
        ),
        Stance::Neutral => format!(
            "Patres conscripti, I, {}, reserve judgement on {} until its effect on {} is clear.",
            senator.styled_name(),
            topic,
            phrase
        ),
    }
}

/// Short reaction from the benches.
pub fn reaction(kind: ReactionKind) -> String {
    match kind {
        ReactionKind::Agreement => "Murmurs of assent.",
        ReactionKind::Disagreement => "Shakes head in disapproval.",
        ReactionKind::Skepticism => "Raises an eyebrow.",
        ReactionKind::Amusement => "Laughs quietly.",
        ReactionKind::Indifference => "Looks away.",
    }
    .to_string()
}

/// Short interjection.
pub fn interjection(kind: InterjectionKind, speaker_name: &str) -> String {
    match kind {
        InterjectionKind::Acclamation => format!("Well said, {}!", speaker_name),
        InterjectionKind::Objection => format!("I object, {}!", speaker_name),
        InterjectionKind::Procedural => "Point of order!".to_string(),
        InterjectionKind::Emotional => "Shame! Shame!".to_string(),
        InterjectionKind::Collective => "Hear, hear!".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::senator::{Rank, Traits};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_generated_provenance() {
        let g = Generated::llm("text".to_string(), "gpt-4");
        assert!(!g.is_fallback());
        assert_eq!(g.served_by, "gpt-4");

        let t = Generated::template(3, "timeout").map(|n| n * 2);
        assert!(t.is_fallback());
        assert_eq!(t.value, 6);
        assert_eq!(t.warning.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_speech_mentions_stance_and_topic() {
        let senator = Senator::new("c", "Cato", Faction::Optimates, Rank::Praetor, Traits::default());
        let text = speech(&senator, "the grain dole", Stance::Oppose);
        assert!(text.contains("oppose"));
        assert!(text.contains("the grain dole"));
        assert!(text.contains("Praetor Cato"));
    }

    #[test]
    fn test_faction_stance_is_seeded() {
        let a: Vec<Stance> = {
            let mut rng = ChaCha8Rng::seed_from_u64(5);
            (0..10).map(|_| faction_stance(Faction::Populares, &mut rng)).collect()
        };
        let b: Vec<Stance> = {
            let mut rng = ChaCha8Rng::seed_from_u64(5);
            (0..10).map(|_| faction_stance(Faction::Populares, &mut rng)).collect()
        };
        assert_eq!(a, b);
    }
}
