//! Deterministic in-process backend for tests and offline runs.
//!
//! Response selection, first match wins:
//! 1. failure switch → `LlmError::Unavailable`
//! 2. scripted queue (FIFO)
//! 3. substring rules over the request text
//! 4. `json_mode` → canned topic list
//! 5. a stance sentence chosen by hashing the prompt

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{ChatCompletion, ChatMessage, ChatOptions, LlmError, LlmProvider, LlmResult};

const DEFAULT_JSON: &str = r#"{"topics": [
  {"title": "Funding for a new aqueduct to the Aventine", "category": "Public Works"},
  {"title": "Grain distribution to the urban poor", "category": "Grain Supply"},
  {"title": "Recall of the proconsul of Asia", "category": "Provincial Administration"},
  {"title": "Levy of troops against the Cilician pirates", "category": "Military Affairs"}
]}"#;

pub struct MockProvider {
    model: String,
    rules: Vec<(String, String)>,
    script: Mutex<VecDeque<String>>,
    json_response: String,
    failing: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            rules: Vec::new(),
            script: Mutex::new(VecDeque::new()),
            json_response: DEFAULT_JSON.to_string(),
            failing: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose every call fails.
    pub fn failing(model: &str) -> Self {
        let mock = Self::new(model);
        mock.set_failing(true);
        mock
    }

    /// Respond with `response` whenever the request contains `needle`.
    pub fn with_rule(mut self, needle: &str, response: &str) -> Self {
        self.rules.push((needle.to_string(), response.to_string()));
        self
    }

    /// Body returned for `json_mode` requests.
    pub fn with_json(mut self, json: &str) -> Self {
        self.json_response = json.to_string();
        self
    }

    /// Queue responses returned before any rule applies.
    pub fn push_script(&self, response: &str) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response.to_string());
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Request texts received so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn respond(&self, request: &str, json_mode: bool) -> LlmResult<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.to_string());

        if self.failing.load(Ordering::SeqCst) {
            return Err(LlmError::Unavailable(format!("{} is switched off", self.model)));
        }
        if let Some(scripted) = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
        {
            return Ok(scripted);
        }
        if let Some((_, response)) = self.rules.iter().find(|(needle, _)| request.contains(needle.as_str())) {
            return Ok(response.clone());
        }
        if json_mode {
            return Ok(self.json_response.clone());
        }
        Ok(stance_sentence(request))
    }
}

fn stance_sentence(request: &str) -> String {
    let hash = request
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |h, b| (h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3));
    match hash % 3 {
        0 => "I support this measure, patres conscripti, for the good of the Republic.",
        1 => "I oppose this measure, patres conscripti, for it threatens the Republic.",
        _ => "I remain neutral on this measure until the Senate has heard more.",
    }
    .to_string()
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> LlmResult<ChatCompletion> {
        let request = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let content = self.respond(&request, options.json_mode)?;
        Ok(ChatCompletion {
            tokens_used: content.split_whitespace().count() as u32,
            content,
            model: self.model.clone(),
            response_time_ms: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_selection_order() {
        let mock = MockProvider::new("m").with_rule("grain", "Bread!");
        mock.push_script("Scripted.");

        assert_eq!(mock.generate_text("grain", 0.5, 10).await.unwrap(), "Scripted.");
        assert_eq!(mock.generate_text("grain", 0.5, 10).await.unwrap(), "Bread!");

        let json = mock
            .generate_chat_completion(
                &[ChatMessage::user("topics please")],
                &ChatOptions {
                    json_mode: true,
                    ..ChatOptions::default()
                },
            )
            .await
            .unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&json.content).is_ok());
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_default_is_deterministic() {
        let mock = MockProvider::new("m");
        let a = mock.generate_text("Cato on roads", 0.5, 10).await.unwrap();
        let b = mock.generate_text("Cato on roads", 0.5, 10).await.unwrap();
        assert_eq!(a, b);
        assert!(curia::Stance::parse_loose(&a).is_some());
    }

    #[tokio::test]
    async fn test_failing() {
        let mock = MockProvider::failing("m");
        assert!(matches!(
            mock.generate_text("x", 0.5, 10).await,
            Err(LlmError::Unavailable(_))
        ));
        mock.set_failing(false);
        assert!(mock.generate_text("x", 0.5, 10).await.is_ok());
        assert_eq!(mock.calls(), vec!["x", "x"]);
    }
}
