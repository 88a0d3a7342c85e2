//! OpenAI chat completions backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use super::{http_client, ChatCompletion, ChatMessage, ChatOptions, LlmError, LlmProvider, LlmResult};

pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> LlmResult<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: http_client(timeout)?,
        })
    }

    fn request_body(&self, messages: &[ChatMessage], options: &ChatOptions) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
        });
        if options.json_mode {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        body
    }
}

/// Extract the completion from a `/chat/completions` response body.
pub(crate) fn parse_response(resp: &serde_json::Value, fallback_model: &str) -> LlmResult<(String, String, u32)> {
    let content = resp["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| LlmError::ParseError("missing choices[0].message.content".to_string()))?
        .trim()
        .to_string();
    if content.is_empty() {
        return Err(LlmError::EmptyResponse("openai".to_string()));
    }
    let model = resp["model"].as_str().unwrap_or(fallback_model).to_string();
    let tokens = resp["usage"]["total_tokens"].as_u64().unwrap_or(0) as u32;
    Ok((content, model, tokens))
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> LlmResult<ChatCompletion> {
        let start = Instant::now();
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(messages, options))
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        let resp_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        let (content, model, tokens_used) = parse_response(&resp_json, &self.model)?;
        let response_time_ms = start.elapsed().as_millis() as u64;
        debug!(model = %model, tokens_used, response_time_ms, "OpenAI completion");

        Ok(ChatCompletion {
            content,
            model,
            tokens_used,
            response_time_ms,
        })
    }
}
