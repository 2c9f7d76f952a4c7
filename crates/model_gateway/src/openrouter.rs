//! OpenRouter adapter (OpenAI-compatible chat completions).

use async_trait::async_trait;
use serde_json::{json, Value};

use workbench_core::{ChatMessage, Error, ProviderAdapter, ProviderCredential, ProviderKind, Result};

use crate::http::{required_str, send_json};

pub struct OpenRouterAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl OpenRouterAdapter {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenRouterAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenRouter
    }

    async fn chat(
        &self,
        model: &str,
        transcript: &[ChatMessage],
        credential: Option<&ProviderCredential>,
    ) -> Result<String> {
        let credential = credential.ok_or_else(|| {
            Error::provider(format!("credential not provided for model {}", model))
        })?;

        let messages: Vec<Value> = transcript
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        tracing::debug!(model = %model, messages = messages.len(), "Sending OpenRouter chat request");
        let body = send_json(
            self.client
                .post(format!("{}/api/v1/chat/completions", self.base_url))
                .bearer_auth(credential.expose())
                .json(&json!({ "model": model, "messages": messages })),
            "openrouter",
        )
        .await?;

        required_str(&body, "/choices/0/message/content", "openrouter")
    }
}
