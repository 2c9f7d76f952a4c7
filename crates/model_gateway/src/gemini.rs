//! Gemini adapter.
//!
//! Wire differences from the shared transcript: `assistant` becomes `model`,
//! system messages are lifted into `systemInstruction`, and the credential
//! travels as the `key` query parameter.

use async_trait::async_trait;
use serde_json::{json, Value};

use workbench_core::{
    ChatMessage, ChatRole, Error, ProviderAdapter, ProviderCredential, ProviderKind, Result,
};

use crate::http::send_json;

pub struct GeminiAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl GeminiAdapter {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn request_body(transcript: &[ChatMessage]) -> Value {
        let system: Vec<&str> = transcript
            .iter()
            .filter(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str())
            .collect();

        let contents: Vec<Value> = transcript
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| {
                let role = match m.role {
                    ChatRole::Assistant => "model",
                    _ => "user",
                };
                json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect();

        let mut body = json!({ "contents": contents });
        if !system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system.join("\n\n") }] });
        }
        body
    }

    /// `{base}/v1beta/models/{model}:generateContent` with the model pushed as
    /// one percent-encoded path segment.
    fn endpoint(&self, model: &str) -> Result<reqwest::Url> {
        if model.is_empty() || model == "." || model == ".." || model.contains(['/', '\\', '?', '#'])
        {
            return Err(Error::validation(format!("invalid gemini model id '{}'", model)));
        }
        let segment = format!("{}:generateContent", model);
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| Error::internal(format!("invalid gemini base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::internal("gemini base url cannot carry a path"))?
            .pop_if_empty()
            .extend(["v1beta", "models", segment.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
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

        let url = self.endpoint(model)?;

        tracing::debug!(model = %model, "Sending Gemini generateContent request");
        let body = send_json(
            self.client
                .post(url)
                .query(&[("key", credential.expose())])
                .json(&Self::request_body(transcript)),
            "gemini",
        )
        .await?;

        let parts = body
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::provider("gemini response contained no candidates"))?;

        Ok(parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""))
    }
}
