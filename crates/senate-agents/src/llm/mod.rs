//! Text generation backends.
//!
//! Every backend implements [`LlmProvider`]. Callers never match on the
//! concrete type; [`create_provider`] picks one from a string key and a
//! [`ModelTier`].

pub mod local;
pub mod mock;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{ProviderKind, SenateConfig};

pub use local::LocalProvider;
pub use mock::MockProvider;
pub use openai::OpenAiProvider;

/// Error type for LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Response parse error: {0}")]
    ParseError(String),

    #[error("Empty response from {0}")]
    EmptyResponse(String),

    #[error("API key not configured for {0}")]
    MissingApiKey(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Which kind of work a model is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    /// Full speeches.
    Speech,
    /// Structured output such as topic lists.
    Reasoning,
    /// One-word stances and short reactions.
    Simple,
}

impl ModelTier {
    /// Default model name for a backend.
    pub fn default_model(&self, provider: ProviderKind) -> &'static str {
        match (provider, self) {
            (ProviderKind::OpenAi, Self::Speech) => "gpt-4o",
            (ProviderKind::OpenAi, Self::Reasoning) => "gpt-4o",
            (ProviderKind::OpenAi, Self::Simple) => "gpt-4o-mini",
            (ProviderKind::Local, Self::Speech) => "llama3.1:8b",
            (ProviderKind::Local, Self::Reasoning) => "llama3.1:8b",
            (ProviderKind::Local, Self::Simple) => "llama3.2:3b",
            (ProviderKind::Mock, Self::Speech) => "mock-speech",
            (ProviderKind::Mock, Self::Reasoning) => "mock-reasoning",
            (ProviderKind::Mock, Self::Simple) => "mock-simple",
        }
    }

    /// Sampling temperature suited to the tier.
    pub fn default_temperature(&self) -> f32 {
        match self {
            Self::Speech => 0.8,
            Self::Reasoning => 0.3,
            Self::Simple => 0.5,
        }
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Speech => write!(f, "speech"),
            Self::Reasoning => write!(f, "reasoning"),
            Self::Simple => write!(f, "simple"),
        }
    }
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling options for a chat completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the backend for a JSON object.
    pub json_mode: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 400,
            json_mode: false,
        }
    }
}

/// Response from a chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub content: String,
    /// Model used
    pub model: String,
    pub tokens_used: u32,
    pub response_time_ms: u64,
}

/// A text-generation backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Model requests are sent to.
    fn model(&self) -> &str;

    /// Single-prompt completion.
    async fn generate_text(&self, prompt: &str, temperature: f32, max_tokens: u32) -> LlmResult<String> {
        let options = ChatOptions {
            temperature,
            max_tokens,
            json_mode: false,
        };
        let completion = self
            .generate_chat_completion(&[ChatMessage::user(prompt)], &options)
            .await?;
        Ok(completion.content)
    }

    /// Multi-message completion.
    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> LlmResult<ChatCompletion>;
}

/// Shared reference to a provider
pub type SharedProvider = Arc<dyn LlmProvider>;

/// Build a provider from its key (`openai`, `local`, `mock`).
pub fn create_provider(key: &str, tier: ModelTier, config: &SenateConfig) -> LlmResult<SharedProvider> {
    let kind: ProviderKind = key
        .parse()
        .map_err(|_| LlmError::UnknownProvider(key.to_string()))?;
    let model = {
        let mut scoped = config.clone();
        scoped.provider = kind;
        scoped.model_for(tier)
    };

    let provider: SharedProvider = match kind {
        ProviderKind::OpenAi => {
            let api_key = config
                .openai_api_key
                .clone()
                .ok_or_else(|| LlmError::MissingApiKey("openai".to_string()))?;
            Arc::new(OpenAiProvider::new(
                &config.openai_url,
                &api_key,
                &model,
                config.request_timeout,
            )?)
        }
        ProviderKind::Local => Arc::new(LocalProvider::new(
            &config.local_url,
            &model,
            config.request_timeout,
        )?),
        ProviderKind::Mock => Arc::new(MockProvider::new(&model)),
    };

    tracing::debug!(provider = provider.name(), model = provider.model(), %tier, "Created LLM provider");
    Ok(provider)
}

/// One provider per tier.
#[derive(Clone)]
pub struct LlmSet {
    pub speech: SharedProvider,
    pub reasoning: SharedProvider,
    pub simple: SharedProvider,
}

impl LlmSet {
    /// Build all three tiers from the same backend.
    pub fn from_config(key: &str, config: &SenateConfig) -> LlmResult<Self> {
        Ok(Self {
            speech: create_provider(key, ModelTier::Speech, config)?,
            reasoning: create_provider(key, ModelTier::Reasoning, config)?,
            simple: create_provider(key, ModelTier::Simple, config)?,
        })
    }

    /// Use one provider for every tier.
    pub fn uniform(provider: SharedProvider) -> Self {
        Self {
            speech: provider.clone(),
            reasoning: provider.clone(),
            simple: provider,
        }
    }

    pub fn for_tier(&self, tier: ModelTier) -> &SharedProvider {
        match tier {
            ModelTier::Speech => &self.speech,
            ModelTier::Reasoning => &self.reasoning,
            ModelTier::Simple => &self.simple,
        }
    }
}

/// Build a `reqwest` client with the request timeout.
pub(crate) fn http_client(timeout: std::time::Duration) -> LlmResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::RequestFailed(format!("failed to build HTTP client: {e}")))
}
