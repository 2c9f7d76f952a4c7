//! Local inference adapter (Ollama).

use async_trait::async_trait;
use serde_json::{json, Value};

use workbench_core::{ChatMessage, ProviderAdapter, ProviderCredential, ProviderKind, Result};

use crate::http::{required_str, send_json};

pub struct OllamaAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaAdapter {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    async fn chat(
        &self,
        model: &str,
        transcript: &[ChatMessage],
        _credential: Option<&ProviderCredential>,
    ) -> Result<String> {
        let messages: Vec<Value> = transcript
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        tracing::debug!(model = %model, messages = messages.len(), "Sending Ollama chat request");
        let body = send_json(
            self.client
                .post(format!("{}/api/chat", self.base_url))
                .json(&json!({ "model": model, "messages": messages, "stream": false })),
            "ollama",
        )
        .await?;

        required_str(&body, "/message/content", "ollama")
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let body = send_json(
            self.client.get(format!("{}/api/tags", self.base_url)),
            "ollama",
        )
        .await?;

        Ok(body
            .get("models")
            .and_then(Value::as_array)
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }
}
