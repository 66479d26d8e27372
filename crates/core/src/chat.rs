use crate::error::BackendError;
use crate::models::ChatMessage;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// One synchronous completion over the full message list; no streaming.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, BackendError>;
}

/// Calls an OpenAI-compatible `/chat/completions` endpoint at temperature 0.
pub struct OpenAiChatModel {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChatModel {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, BackendError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0,
        });

        debug!(url = %url, model = %self.model, messages = messages.len(), "chat request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::BackendResponse {
                backend: "chat".to_string(),
                details: format!("{status}: {body}"),
            });
        }

        let parsed: Value = response.json().await?;
        parse_completion(&parsed)
    }
}

fn parse_completion(response: &Value) -> Result<String, BackendError> {
    response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| BackendError::BackendResponse {
            backend: "chat".to_string(),
            details: "missing choices[0].message.content".to_string(),
        })
}
