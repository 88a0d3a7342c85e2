//! Topics for a session: cache first, then the model, then a fixed list.

use curia::topics::{fallback_topics, Topic, TopicCache};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::llm::{ChatMessage, ChatOptions, ModelTier, SharedProvider};
use crate::prompts;

const TOPICS_MAX_TOKENS: u32 = 800;

#[derive(Debug, Deserialize)]
struct TopicEntry {
    title: String,
    #[serde(default = "default_category")]
    category: String,
}

fn default_category() -> String {
    "General Affairs".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TopicsReply {
    Wrapped { topics: Vec<TopicEntry> },
    Bare(Vec<TopicEntry>),
}

/// Parse a model reply into topics.
///
/// Accepts `{"topics": [...]}` or a bare array, optionally inside a
/// markdown code fence. Entries with an empty title are dropped.
pub fn parse_topics(reply: &str, year: i32) -> Result<Vec<Topic>, serde_json::Error> {
    let trimmed = reply.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    let entries = match serde_json::from_str::<TopicsReply>(body)? {
        TopicsReply::Wrapped { topics } => topics,
        TopicsReply::Bare(topics) => topics,
    };
    Ok(entries
        .into_iter()
        .filter(|e| !e.title.trim().is_empty())
        .map(|e| Topic::new(e.title.trim(), e.category.trim()).in_year(year))
        .collect())
}

pub struct TopicSource {
    llm: SharedProvider,
    cache: TopicCache,
}

impl TopicSource {
    pub fn new(llm: SharedProvider, cache: TopicCache) -> Self {
        Self { llm, cache }
    }

    pub fn cache(&self) -> &TopicCache {
        &self.cache
    }

    /// `count` topics for `year`.
    ///
    /// Cached topics are used when there are enough of them. Otherwise the
    /// model is asked and its answer merged into the cache; a failed call or
    /// malformed answer falls back to the built-in list.
    pub async fn topics(&mut self, year: i32, count: usize) -> Vec<Topic> {
        let cached = fill(self.cache.get(year), usize::MAX);
        if cached.len() >= count {
            debug!(year, cached = cached.len(), "Topics served from cache");
            return cached.into_iter().take(count).collect();
        }

        let messages = [
            ChatMessage::system(prompts::TOPIC_PREAMBLE),
            ChatMessage::user(prompts::topics_prompt(year, count)),
        ];
        let options = ChatOptions {
            temperature: ModelTier::Reasoning.default_temperature(),
            max_tokens: TOPICS_MAX_TOKENS,
            json_mode: true,
        };

        let generated = match self.llm.generate_chat_completion(&messages, &options).await {
            Ok(completion) => match parse_topics(&completion.content, year) {
                Ok(topics) if !topics.is_empty() => Some(fill(topics, usize::MAX)),
                Ok(_) => {
                    warn!(year, "Model returned no topics, using fallback list");
                    None
                }
                Err(e) => {
                    warn!(year, "Malformed topic list from model ({}), using fallback list", e);
                    None
                }
            },
            Err(e) => {
                error!(year, "Topic generation failed: {}", e);
                None
            }
        };

        let topics = match generated {
            Some(topics) => {
                let added = self.cache.insert_topics(year, &topics);
                info!(year, generated = topics.len(), added, "Topics generated");
                if let Err(e) = self.cache.save() {
                    warn!("Could not save topic cache: {}", e);
                }
                topics
            }
            None => Vec::new(),
        };
        fill(
            topics.into_iter().chain(cached).chain(fallback_topics(year)),
            count,
        )
    }
}

/// The first `count` topics with distinct ids.
fn fill(candidates: impl IntoIterator<Item = Topic>, count: usize) -> Vec<Topic> {
    let mut topics: Vec<Topic> = Vec::new();
    for topic in candidates {
        if topics.len() >= count {
            break;
        }
        if !topics.iter().any(|t| t.id == topic.id) {
            topics.push(topic);
        }
    }
    topics
}
