//! Senator records: factions, ranks, traits and archetypes.
//!
//! A `Senator` is a plain typed record created at session start. Traits are
//! validated once in [`Traits::new`]; everything downstream can rely on the
//! values being inside `[0.0, 1.0]`.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Stable identifier for a senator (slug of the name plus roster index).
pub type SenatorId = String;

/// Source id used for events emitted by the session itself rather than a senator.
pub const SENATE_SOURCE: &str = "senate";

/// Political bloc biasing stance and vote probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Faction {
    Optimates,
    Populares,
    Military,
    Religious,
    Merchant,
}

impl Faction {
    /// All factions in declaration order.
    pub const ALL: [Faction; 5] = [
        Faction::Optimates,
        Faction::Populares,
        Faction::Military,
        Faction::Religious,
        Faction::Merchant,
    ];

    /// Weights for `[support, oppose, neutral]` when no model is available to
    /// decide a stance.
    pub fn stance_weights(self) -> [f64; 3] {
        match self {
            Self::Optimates => [0.3, 0.5, 0.2],
            Self::Populares => [0.5, 0.3, 0.2],
            Self::Military => [0.4, 0.4, 0.2],
            Self::Religious => [0.35, 0.35, 0.3],
            Self::Merchant => [0.4, 0.3, 0.3],
        }
    }

    /// Archetype a senator of this faction defaults to.
    pub fn default_archetype(self) -> Archetype {
        match self {
            Self::Optimates => Archetype::Traditionalist,
            Self::Populares => Archetype::Populist,
            Self::Military => Archetype::Militarist,
            Self::Religious => Archetype::Philosopher,
            Self::Merchant => Archetype::Pragmatist,
        }
    }
}

impl std::fmt::Display for Faction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Optimates => write!(f, "Optimates"),
            Self::Populares => write!(f, "Populares"),
            Self::Military => write!(f, "Military"),
            Self::Religious => write!(f, "Religious"),
            Self::Merchant => write!(f, "Merchant"),
        }
    }
}

impl std::str::FromStr for Faction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimates" => Ok(Self::Optimates),
            "populares" => Ok(Self::Populares),
            "military" => Ok(Self::Military),
            "religious" => Ok(Self::Religious),
            "merchant" | "merchants" => Ok(Self::Merchant),
            other => Err(format!("unknown faction: {}", other)),
        }
    }
}

/// Magistracy held by a senator. Ordering is seniority: a higher rank may
/// interrupt a lower one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    Senator,
    Quaestor,
    Aedile,
    Praetor,
    Consul,
    Censor,
}

impl Rank {
    /// Numeric seniority, `0` for an ordinary senator.
    pub fn level(self) -> i32 {
        match self {
            Self::Senator => 0,
            Self::Quaestor => 1,
            Self::Aedile => 2,
            Self::Praetor => 3,
            Self::Consul => 4,
            Self::Censor => 5,
        }
    }

    /// Signed seniority gap `self - other`.
    pub fn difference(self, other: Rank) -> i32 {
        self.level() - other.level()
    }

    /// Latin title used in addresses and prompts.
    pub fn title(self) -> &'static str {
        match self {
            Self::Senator => "Senator",
            Self::Quaestor => "Quaestor",
            Self::Aedile => "Aedile",
            Self::Praetor => "Praetor",
            Self::Consul => "Consul",
            Self::Censor => "Censor",
        }
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title())
    }
}

/// Personality template driving speech style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Traditionalist,
    Pragmatist,
    Philosopher,
    Populist,
    Militarist,
}

/// Style parameters an archetype contributes to speech prompts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeechStyle {
    /// 0.0 plain speech, 1.0 ceremonial register.
    pub formality: f64,
    /// 0.0 measured, 1.0 impassioned.
    pub emotion: f64,
    /// Share of Latin flourishes the speaker reaches for.
    pub latin_usage: f64,
}

impl Archetype {
    pub fn style(self) -> SpeechStyle {
        match self {
            Self::Traditionalist => SpeechStyle {
                formality: 0.9,
                emotion: 0.3,
                latin_usage: 0.7,
            },
            Self::Pragmatist => SpeechStyle {
                formality: 0.5,
                emotion: 0.2,
                latin_usage: 0.3,
            },
            Self::Philosopher => SpeechStyle {
                formality: 0.7,
                emotion: 0.3,
                latin_usage: 0.6,
            },
            Self::Populist => SpeechStyle {
                formality: 0.3,
                emotion: 0.8,
                latin_usage: 0.2,
            },
            Self::Militarist => SpeechStyle {
                formality: 0.6,
                emotion: 0.6,
                latin_usage: 0.4,
            },
        }
    }

    /// One-line description used in prompts.
    pub fn description(self) -> &'static str {
        match self {
            Self::Traditionalist => "defends the mos maiorum and ancestral custom",
            Self::Pragmatist => "weighs costs and practical consequences",
            Self::Philosopher => "argues from principle and Stoic virtue",
            Self::Populist => "speaks for the plebs and the common citizen",
            Self::Militarist => "judges every question by the security of Rome",
        }
    }
}

impl std::fmt::Display for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Traditionalist => write!(f, "traditionalist"),
            Self::Pragmatist => write!(f, "pragmatist"),
            Self::Philosopher => write!(f, "philosopher"),
            Self::Populist => write!(f, "populist"),
            Self::Militarist => write!(f, "militarist"),
        }
    }
}

/// Error for trait values outside `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("trait {name} out of range: {value}")]
pub struct TraitError {
    pub name: &'static str,
    pub value: f64,
}

/// Static personality traits, each in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Traits {
    eloquence: f64,
    corruption: f64,
    loyalty: f64,
}

impl Traits {
    /// Validate and build a trait set.
    pub fn new(eloquence: f64, corruption: f64, loyalty: f64) -> Result<Self, TraitError> {
        for (name, value) in [
            ("eloquence", eloquence),
            ("corruption", corruption),
            ("loyalty", loyalty),
        ] {
            if !(0.0..=1.0).contains(&value) || value.is_nan() {
                return Err(TraitError { name, value });
            }
        }
        Ok(Self {
            eloquence,
            corruption,
            loyalty,
        })
    }

    pub fn eloquence(&self) -> f64 {
        self.eloquence
    }

    pub fn corruption(&self) -> f64 {
        self.corruption
    }

    pub fn loyalty(&self) -> f64 {
        self.loyalty
    }

    /// Draw a random trait set.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            eloquence: rng.gen_range(0.2..=1.0),
            corruption: rng.gen_range(0.0..=0.8),
            loyalty: rng.gen_range(0.2..=1.0),
        }
    }
}

impl Default for Traits {
    fn default() -> Self {
        Self {
            eloquence: 0.5,
            corruption: 0.2,
            loyalty: 0.5,
        }
    }
}

/// A senator's position on a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Support,
    Oppose,
    Neutral,
}

impl Stance {
    /// Parse a free-text model answer. Looks for the first stance keyword.
    pub fn parse_loose(text: &str) -> Option<Self> {
        let lower = text.to_ascii_lowercase();
        let positions = [
            (lower.find("support"), Self::Support),
            (lower.find("favor").or_else(|| lower.find("favour")), Self::Support),
            (lower.find("oppose"), Self::Oppose),
            (lower.find("against"), Self::Oppose),
            (lower.find("neutral"), Self::Neutral),
            (lower.find("abstain"), Self::Neutral),
        ];
        positions
            .into_iter()
            .filter_map(|(pos, stance)| pos.map(|p| (p, stance)))
            .min_by_key(|(p, _)| *p)
            .map(|(_, stance)| stance)
    }

    /// Whether two stances are on opposite sides.
    pub fn opposes(self, other: Stance) -> bool {
        matches!(
            (self, other),
            (Self::Support, Self::Oppose) | (Self::Oppose, Self::Support)
        )
    }
}

impl std::fmt::Display for Stance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Support => write!(f, "support"),
            Self::Oppose => write!(f, "oppose"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

/// A member of the Senate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Senator {
    pub id: SenatorId,
    pub name: String,
    pub faction: Faction,
    pub rank: Rank,
    pub traits: Traits,
    pub archetype: Archetype,
    /// Optional home province, used only for flavour in prompts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
}

impl Senator {
    /// Create a senator with the faction's default archetype.
    pub fn new(id: &str, name: &str, faction: Faction, rank: Rank, traits: Traits) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            faction,
            rank,
            traits,
            archetype: faction.default_archetype(),
            province: None,
        }
    }

    pub fn with_archetype(mut self, archetype: Archetype) -> Self {
        self.archetype = archetype;
        self
    }

    pub fn with_province(mut self, province: &str) -> Self {
        self.province = Some(province.to_string());
        self
    }

    /// Formal address, e.g. "Consul Marcus Tullius Cicero".
    pub fn styled_name(&self) -> String {
        match self.rank {
            Rank::Senator => self.name.clone(),
            rank => format!("{} {}", rank.title(), self.name),
        }
    }
}

const ROSTER_NAMES: &[&str] = &[
    "Marcus Tullius Cicero",
    "Gaius Julius Caesar",
    "Marcus Porcius Cato",
    "Gnaeus Pompeius Magnus",
    "Marcus Licinius Crassus",
    "Publius Clodius Pulcher",
    "Titus Annius Milo",
    "Quintus Hortensius Hortalus",
    "Lucius Domitius Ahenobarbus",
    "Marcus Calpurnius Bibulus",
    "Gaius Scribonius Curio",
    "Lucius Licinius Lucullus",
    "Quintus Lutatius Catulus",
    "Marcus Junius Brutus",
    "Gaius Cassius Longinus",
    "Servius Sulpicius Rufus",
];

const PROVINCES: &[&str] = &[
    "Latium",
    "Campania",
    "Etruria",
    "Sicilia",
    "Hispania",
    "Gallia Cisalpina",
];

/// Turn a display name into an id slug.
pub fn slugify(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Generate a roster of `count` senators.
///
/// The first senator is always a Consul so a presiding magistrate exists;
/// the rest draw ranks weighted toward the back benches. Names are reused
/// with a numeral suffix once the list is exhausted.
pub fn generate_roster<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<Senator> {
    let mut names: Vec<&str> = ROSTER_NAMES.to_vec();
    names.shuffle(rng);

    (0..count)
        .map(|idx| {
            let base = names[idx % names.len()];
            let name = if idx < names.len() {
                base.to_string()
            } else {
                format!("{} {}", base, roman_numeral(idx / names.len() + 1))
            };
            let faction = Faction::ALL[rng.gen_range(0..Faction::ALL.len())];
            let rank = if idx == 0 {
                Rank::Consul
            } else {
                match rng.gen_range(0..100) {
                    0..=44 => Rank::Senator,
                    45..=64 => Rank::Quaestor,
                    65..=79 => Rank::Aedile,
                    80..=91 => Rank::Praetor,
                    92..=97 => Rank::Consul,
                    _ => Rank::Censor,
                }
            };
            let id = format!("{}-{}", slugify(&name), idx);
            let province = PROVINCES[rng.gen_range(0..PROVINCES.len())];
            Senator::new(&id, &name, faction, rank, Traits::random(rng)).with_province(province)
        })
        .collect()
}

fn roman_numeral(n: usize) -> &'static str {
    match n {
        1 => "I",
        2 => "II",
        3 => "III",
        4 => "IV",
        5 => "V",
        _ => "Minor",
    }
}
