//! Provider Router.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use workbench_core::{
    config::ProvidersConfig, ChatCompletion, ChatMessage, ChatRole, Error, ProviderAdapter,
    ProviderKind, Result, UserRecord,
};

use crate::classifier::classify;
use crate::credentials::CredentialResolver;
use crate::gemini::GeminiAdapter;
use crate::ollama::OllamaAdapter;
use crate::openrouter::OpenRouterAdapter;

/// Dispatches a transcript to exactly one provider adapter.
///
/// No fallback to another provider and no retry: a failed call reports once.
pub struct ProviderRouter {
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
    credentials: CredentialResolver,
    default_model: String,
    system_prompt: Option<String>,
}

impl ProviderRouter {
    /// Create a router with no adapters.
    pub fn new(default_model: impl Into<String>, credentials: CredentialResolver) -> Self {
        Self {
            adapters: HashMap::new(),
            credentials,
            default_model: default_model.into(),
            system_prompt: None,
        }
    }

    /// Build the three HTTP adapters from configuration.
    pub fn from_config(config: &ProvidersConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        let mut router = Self::new(
            config.default_model.clone(),
            CredentialResolver::from_config(config),
        )
        .with_adapter(Arc::new(OllamaAdapter::new(client.clone(), &config.ollama_url)))
        .with_adapter(Arc::new(GeminiAdapter::new(client.clone(), &config.gemini_base_url)))
        .with_adapter(Arc::new(OpenRouterAdapter::new(client, &config.openrouter_base_url)));
        router.system_prompt = config.system_prompt.clone();
        Ok(router)
    }

    /// Register (or replace) the adapter for its provider kind.
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    /// Inject `prompt` as a leading system message when a transcript has none.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Classify `model_id`, resolve the credential and forward the transcript.
    pub async fn route(
        &self,
        transcript: &[ChatMessage],
        model_id: Option<&str>,
        user: Option<&UserRecord>,
    ) -> Result<ChatCompletion> {
        let route = classify(model_id, &self.default_model);
        let provider = route.kind();
        let model = route.model();

        let adapter = self
            .adapters
            .get(&provider)
            .ok_or_else(|| Error::provider(format!("no adapter configured for provider {}", provider)))?;

        let credential = self.credentials.resolve(provider, user);
        if provider != ProviderKind::Local && credential.is_none() {
            tracing::warn!(provider = %provider, model = %model, "No credential for model");
            return Err(Error::provider(format!(
                "credential not provided for model {}",
                model
            )));
        }

        tracing::debug!(provider = %provider, model = %model, "Routing chat request");
        let transcript = self.prepare(transcript);
        let content = adapter.chat(model, &transcript, credential.as_ref()).await?;

        Ok(ChatCompletion {
            provider,
            model: model.to_string(),
            content,
        })
    }

    /// Models advertised by the local server. Hosted catalogs are open-ended.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        match self.adapters.get(&ProviderKind::Local) {
            Some(adapter) => adapter.list_models().await,
            None => Ok(Vec::new()),
        }
    }

    fn prepare<'a>(&self, transcript: &'a [ChatMessage]) -> Cow<'a, [ChatMessage]> {
        match self.system_prompt {
            Some(ref prompt) if !transcript.iter().any(|m| m.role == ChatRole::System) => {
                let mut with_prompt = Vec::with_capacity(transcript.len() + 1);
                with_prompt.push(ChatMessage::system(prompt.clone()));
                with_prompt.extend_from_slice(transcript);
                Cow::Owned(with_prompt)
            }
            _ => Cow::Borrowed(transcript),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;
    use workbench_core::mocks::MockProviderAdapter;

    struct Fixture {
        router: ProviderRouter,
        local: Arc<MockProviderAdapter>,
        gemini: Arc<MockProviderAdapter>,
        openrouter: Arc<MockProviderAdapter>,
    }

    fn fixture(credentials: CredentialResolver) -> Fixture {
        let local = Arc::new(MockProviderAdapter::new(ProviderKind::Local, "from local"));
        let gemini = Arc::new(MockProviderAdapter::new(ProviderKind::Gemini, "from gemini"));
        let openrouter = Arc::new(MockProviderAdapter::new(ProviderKind::OpenRouter, "from openrouter"));
        let router = ProviderRouter::new("deepseek-r1:latest", credentials)
            .with_adapter(local.clone())
            .with_adapter(gemini.clone())
            .with_adapter(openrouter.clone());
        Fixture {
            router,
            local,
            gemini,
            openrouter,
        }
    }

    fn all_keys() -> CredentialResolver {
        CredentialResolver::new(Some(Secret::new("g".into())), Some(Secret::new("o".into())))
    }

    #[tokio::test]
    async fn test_dispatch_per_branch() {
        let f = fixture(all_keys());
        let transcript = [ChatMessage::user("hi")];

        let c = f.router.route(&transcript, Some("gemini-1.5-flash"), None).await.unwrap();
        assert_eq!(c.provider, ProviderKind::Gemini);
        assert_eq!(c.content, "from gemini");

        let c = f.router.route(&transcript, Some("deepseek/llama-3:free"), None).await.unwrap();
        assert_eq!(c.provider, ProviderKind::OpenRouter);

        let c = f.router.route(&transcript, Some("llama3:latest"), None).await.unwrap();
        assert_eq!(c.provider, ProviderKind::Local);

        let c = f.router.route(&transcript, None, None).await.unwrap();
        assert_eq!(c.model, "deepseek-r1:latest");

        assert_eq!(f.gemini.call_count(), 1);
        assert_eq!(f.openrouter.call_count(), 1);
        assert_eq!(f.local.call_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_credential_never_calls_adapter() {
        let f = fixture(CredentialResolver::default());
        let transcript = [ChatMessage::user("hi")];

        for model in ["gemini-pro", "mistral/mistral-7b"] {
            let err = f.router.route(&transcript, Some(model), None).await.unwrap_err();
            assert!(matches!(err, Error::Provider(_)));
            assert!(err.to_string().contains("credential not provided"));
            assert!(err.to_string().contains(model));
        }
        assert_eq!(f.gemini.call_count(), 0);
        assert_eq!(f.openrouter.call_count(), 0);
    }

    #[tokio::test]
    async fn test_user_credential_reaches_adapter() {
        let f = fixture(CredentialResolver::default());
        let mut user = UserRecord::new("u1", "u1@example.com");
        user.preferences.openrouter_api_key = Some(Secret::new("user-key".into()));

        f.router
            .route(&[ChatMessage::user("hi")], Some("a/b"), Some(&user))
            .await
            .unwrap();
        assert!(f.openrouter.calls()[0].had_credential);
    }

    #[tokio::test]
    async fn test_system_prompt_injected_once() {
        let f = fixture(all_keys());
        let router = f.router.with_system_prompt("You are helpful.");

        router.route(&[ChatMessage::user("hi")], None, None).await.unwrap();
        let sent = &f.local.calls()[0].transcript;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].role, ChatRole::System);

        router
            .route(&[ChatMessage::system("custom"), ChatMessage::user("hi")], None, None)
            .await
            .unwrap();
        let sent = &f.local.calls()[1].transcript;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].content, "custom");
    }
}
