use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::llm::ModelTier;

/// Which text-generation backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// OpenAI chat completions API
    OpenAi,
    /// Ollama-style local inference server
    Local,
    /// Deterministic in-process mock
    Mock,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Local => write!(f, "local"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "local" | "ollama" => Ok(Self::Local),
            "mock" => Ok(Self::Mock),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

/// Error type for configuration problems
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown provider '{0}' (expected openai, local or mock)")]
    UnknownProvider(String),

    #[error("OPENAI_API_KEY is required for the openai provider")]
    MissingApiKey,

    #[error("Temperature {0} out of range [0.0, 2.0]")]
    InvalidTemperature(f32),

    #[error("max_tokens must be positive")]
    InvalidMaxTokens,
}

/// Top-level simulator configuration.
#[derive(Debug, Clone)]
pub struct SenateConfig {
    pub provider: ProviderKind,
    pub openai_api_key: Option<String>,
    /// Base URL for the OpenAI API (including `/v1`)
    pub openai_url: String,
    /// Base URL for the local inference server
    pub local_url: String,
    /// Per-tier model overrides; `None` uses the tier default for the provider.
    pub speech_model: Option<String>,
    pub reasoning_model: Option<String>,
    pub simple_model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub topics_cache: PathBuf,
    pub request_timeout: Duration,
}

impl Default for SenateConfig {
    fn default() -> Self {
        Self {
            provider: std::env::var("SENATE_PROVIDER")
                .ok()
                .and_then(|p| match p.parse() {
                    Ok(kind) => Some(kind),
                    Err(e) => {
                        warn!("Ignoring SENATE_PROVIDER: {e}");
                        None
                    }
                })
                .unwrap_or(ProviderKind::Mock),
            openai_api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            openai_url: std::env::var("SENATE_OPENAI_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            local_url: std::env::var("SENATE_LOCAL_URL")
                .unwrap_or_else(|_| "http://localhost:11434".into()),
            speech_model: std::env::var("SENATE_SPEECH_MODEL").ok(),
            reasoning_model: std::env::var("SENATE_REASONING_MODEL").ok(),
            simple_model: std::env::var("SENATE_SIMPLE_MODEL").ok(),
            temperature: env_parse("SENATE_TEMPERATURE", 0.7),
            max_tokens: env_parse("SENATE_MAX_TOKENS", 400),
            topics_cache: std::env::var("SENATE_TOPICS_CACHE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(curia::topics::DEFAULT_CACHE_FILE)),
            request_timeout: Duration::from_secs(env_parse("SENATE_REQUEST_TIMEOUT_SECS", 60)),
        }
    }
}

impl SenateConfig {
    /// Configuration for tests and offline runs: mock provider, no env lookups.
    pub fn offline() -> Self {
        Self {
            provider: ProviderKind::Mock,
            openai_api_key: None,
            openai_url: "https://api.openai.com/v1".into(),
            local_url: "http://localhost:11434".into(),
            speech_model: None,
            reasoning_model: None,
            simple_model: None,
            temperature: 0.7,
            max_tokens: 400,
            topics_cache: PathBuf::from(curia::topics::DEFAULT_CACHE_FILE),
            request_timeout: Duration::from_secs(60),
        }
    }

    /// Model name for a tier, honouring overrides.
    pub fn model_for(&self, tier: ModelTier) -> String {
        let override_name = match tier {
            ModelTier::Speech => &self.speech_model,
            ModelTier::Reasoning => &self.reasoning_model,
            ModelTier::Simple => &self.simple_model,
        };
        override_name
            .clone()
            .unwrap_or_else(|| tier.default_model(self.provider).to_string())
    }

    /// Check values that would otherwise fail at the first request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider == ProviderKind::OpenAi && self.openai_api_key.is_none() {
            return Err(ConfigError::MissingApiKey);
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::InvalidMaxTokens);
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Unparseable value, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("ollama".parse::<ProviderKind>().unwrap(), ProviderKind::Local);
        assert!(matches!(
            "bard".parse::<ProviderKind>(),
            Err(ConfigError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_model_overrides() {
        let mut config = SenateConfig::offline();
        assert_eq!(
            config.model_for(ModelTier::Speech),
            ModelTier::Speech.default_model(ProviderKind::Mock)
        );
        config.speech_model = Some("custom".into());
        assert_eq!(config.model_for(ModelTier::Speech), "custom");
    }

    #[test]
    fn test_validate() {
        let mut config = SenateConfig::offline();
        assert!(config.validate().is_ok());

        config.provider = ProviderKind::OpenAi;
        assert!(matches!(config.validate(), Err(ConfigError::MissingApiKey)));
        config.openai_api_key = Some("sk-test".into());
        assert!(config.validate().is_ok());

        config.temperature = 3.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTemperature(_))));
        config.temperature = 0.5;
        config.max_tokens = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidMaxTokens)));
    }

    #[test]
    fn test_env_parse_fallback() {
        assert_eq!(env_parse("SENATE_TEST_UNSET_VARIABLE_XYZ", 42u32), 42);
    }
}
