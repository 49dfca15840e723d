//! Inference gateway and its Ollama implementation.

use crate::errors::InferenceError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// A chat-completion backend. One call per analysis pass; the agent owns
/// prompt construction and output decoding.
#[async_trait]
pub trait InferenceGateway: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, InferenceError>;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

/// Client for a local Ollama server's `/api/chat` endpoint.
pub struct OllamaGateway {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaGateway {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout,
        }
    }
}

#[async_trait]
impl InferenceGateway for OllamaGateway {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, InferenceError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "stream": false,
            "options": {
                "temperature": temperature,
                "num_predict": max_tokens,
            },
        });
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                InferenceError::Unavailable(format!("request to {url} failed: {err}"))
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(InferenceError::Unavailable(format!(
                "inference backend returned {status}"
            )));
        }
        let chat: ChatResponse = response.json().await.map_err(|err| {
            InferenceError::Unavailable(format!("invalid response from {url}: {err}"))
        })?;
        Ok(chat.message.content)
    }
}
