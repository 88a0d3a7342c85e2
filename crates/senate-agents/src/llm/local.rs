//! Local inference server backend (Ollama HTTP API).
//!
//! `generate_text` uses `/api/generate`; chat completions use `/api/chat`.
//! Both are called with `stream: false`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use super::{http_client, ChatCompletion, ChatMessage, ChatOptions, LlmError, LlmProvider, LlmResult};

pub struct LocalProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl LocalProvider {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> LlmResult<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: http_client(timeout)?,
        })
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> LlmResult<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))
    }
}

fn sampling(temperature: f32, max_tokens: u32) -> serde_json::Value {
    serde_json::json!({
        "temperature": temperature,
        "num_predict": max_tokens,
    })
}

fn token_count(resp: &serde_json::Value) -> u32 {
    (resp["prompt_eval_count"].as_u64().unwrap_or(0) + resp["eval_count"].as_u64().unwrap_or(0)) as u32
}

fn non_empty(text: Option<&str>, field: &str) -> LlmResult<String> {
    let text = text
        .ok_or_else(|| LlmError::ParseError(format!("missing {field}")))?
        .trim();
    if text.is_empty() {
        return Err(LlmError::EmptyResponse("local".to_string()));
    }
    Ok(text.to_string())
}

#[async_trait]
impl LlmProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate_text(&self, prompt: &str, temperature: f32, max_tokens: u32) -> LlmResult<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": sampling(temperature, max_tokens),
        });
        let resp = self.post("/api/generate", &body).await?;
        non_empty(resp["response"].as_str(), "response")
    }

    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> LlmResult<ChatCompletion> {
        let start = Instant::now();
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": sampling(options.temperature, options.max_tokens),
        });
        if options.json_mode {
            body["format"] = serde_json::json!("json");
        }

        let resp = self.post("/api/chat", &body).await?;
        let content = non_empty(resp["message"]["content"].as_str(), "message.content")?;
        let response_time_ms = start.elapsed().as_millis() as u64;
        debug!(model = %self.model, response_time_ms, "Local chat completion");

        Ok(ChatCompletion {
            content,
            model: resp["model"].as_str().unwrap_or(&self.model).to_string(),
            tokens_used: token_count(&resp),
            response_time_ms,
        })
    }
}
