//! Prompt construction for senator agents and topic generation.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever preamble content changes,
//! so a transcript can be traced back to the prompts that produced it.

use curia::events::{InterjectionKind, ReactionKind};
use curia::memory::ObservedEvent;
use curia::senator::{Senator, Stance};
use curia::topics::Topic;

/// Prompt version. Bump on any preamble content change.
pub const PROMPT_VERSION: &str = "1.2.0";

/// Shared preamble for every senator persona.
pub const SENATOR_PREAMBLE: &str = "\
You are a member of the Senate of the Roman Republic. Stay in character at all \
times. Speak as a Roman of your era would: no modern concepts, no anachronisms. \
Address the chamber as \"patres conscripti\" when giving a speech. Never mention \
that you are an AI or a simulation.";

/// Preamble for the topic generator.
pub const TOPIC_PREAMBLE: &str = "\
You are a historian of the Roman Republic preparing the agenda of a Senate session. \
Propose realistic matters the Senate would debate in the given year. Respond with a \
JSON object only.";

/// Persona description for a senator's system prompt.
pub fn senator_persona(senator: &Senator) -> String {
    let style = senator.archetype.style();
    let mut persona = format!(
        "{preamble}\n\nYou are {name}, a {rank} of the {faction} faction. \
         Your temperament: {archetype}.\n\
         Eloquence {eloquence:.1}/1, loyalty to your faction {loyalty:.1}/1.\n\
         Style: formality {formality:.1}, emotion {emotion:.1}, Latin usage {latin:.1}.",
        preamble = SENATOR_PREAMBLE,
        name = senator.name,
        rank = senator.rank.title(),
        faction = senator.faction,
        archetype = senator.archetype.description(),
        eloquence = senator.traits.eloquence(),
        loyalty = senator.traits.loyalty(),
        formality = style.formality,
        emotion = style.emotion,
        latin = style.latin_usage,
    );
    if let Some(province) = &senator.province {
        persona.push_str(&format!("\nYour family's estates lie in {province}."));
    }
    persona
}

/// Ask for a one-word stance.
pub fn stance_prompt(senator: &Senator, topic: &Topic) -> String {
    format!(
        "{persona}\n\nThe Senate will debate: \"{title}\" ({category}).\n\
         Considering your faction's interests and your own temperament, do you \
         support, oppose, or remain neutral on this matter?\n\
         Answer with exactly one word: support, oppose or neutral.",
        persona = senator_persona(senator),
        title = topic.title,
        category = topic.category,
    )
}

/// Ask for a speech.
pub fn speech_prompt(
    senator: &Senator,
    topic: &Topic,
    stance: Stance,
    round: u32,
    heard: &[&ObservedEvent],
) -> String {
    let position = match stance {
        Stance::Support => "in support of",
        Stance::Oppose => "in opposition to",
        Stance::Neutral => "weighing both sides of",
    };
    let mut prompt = format!(
        "The Senate is debating \"{title}\" ({category}). This is round {round} of the debate.\n\
         Deliver a short speech (three to five sentences) {position} the measure.",
        title = topic.title,
        category = topic.category,
    );
    if !heard.is_empty() {
        prompt.push_str("\n\nEarlier in the debate you heard:");
        for obs in heard {
            if let Some(excerpt) = &obs.excerpt {
                prompt.push_str(&format!("\n- {}: \"{}\"", obs.source, excerpt));
            }
        }
        prompt.push_str("\nYou may answer these arguments.");
    }
    prompt.push_str(&format!(
        "\n\nSpeak as {}. Reply with the speech only.",
        senator.styled_name()
    ));
    prompt
}

/// Ask for a brief reaction from the benches.
pub fn reaction_prompt(senator: &Senator, speaker: &str, excerpt: &str, kind: ReactionKind) -> String {
    format!(
        "{persona}\n\n{speaker} has just said: \"{excerpt}\"\n\
         Your reaction is one of {kind}. Describe it in one short sentence, \
         a gesture or a muttered remark. Reply with the reaction only.",
        persona = senator_persona(senator),
    )
}

/// Ask for an interjection.
pub fn interjection_prompt(
    senator: &Senator,
    speaker: &str,
    excerpt: &str,
    kind: InterjectionKind,
) -> String {
    let guidance = match kind {
        InterjectionKind::Acclamation => "shout your approval",
        InterjectionKind::Objection => "object to the argument",
        InterjectionKind::Procedural => "raise a point of order",
        InterjectionKind::Emotional => "cry out in anger or passion",
        InterjectionKind::Collective => "lead your faction in a chant",
    };
    format!(
        "{persona}\n\n{speaker} is speaking: \"{excerpt}\"\n\
         Interrupt the speaker to {guidance}. One sentence, at most fifteen words. \
         Reply with the interjection only.",
        persona = senator_persona(senator),
    )
}

/// Year as written by a Roman historian: negative years are BC.
pub fn era(year: i32) -> String {
    if year < 0 {
        format!("{} BC", -year)
    } else {
        format!("AD {}", year)
    }
}

/// Ask for a topic list as JSON.
pub fn topics_prompt(year: i32, count: usize) -> String {
    let era = era(year);
    format!(
        "List {count} matters the Roman Senate might debate in {era}.\n\
         Respond with JSON of the form \
         {{\"topics\": [{{\"title\": \"...\", \"category\": \"...\"}}]}}.\n\
         Categories should be short, e.g. Military Affairs, Public Works, Grain Supply, \
         Provincial Administration, Religious Matters."
    )
}

/// Strip wrapping quotes and collapse whitespace in a model reply.
pub fn tidy(reply: &str) -> String {
    let collapsed = reply.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '“' || c == '”')
        .trim()
        .to_string()
}
