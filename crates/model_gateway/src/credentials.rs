//! Per-call credential resolution.

use secrecy::{ExposeSecret, Secret};

use workbench_core::{config::ProvidersConfig, ProviderCredential, ProviderKind, UserRecord};

/// Picks the API key for a chat call.
///
/// Precedence: the calling user's stored key for the provider, then the
/// process-wide default from configuration. Nothing is cached; every call
/// resolves afresh.
#[derive(Debug, Clone, Default)]
pub struct CredentialResolver {
    gemini_default: Option<Secret<String>>,
    openrouter_default: Option<Secret<String>>,
}

impl CredentialResolver {
    pub fn new(
        gemini_default: Option<Secret<String>>,
        openrouter_default: Option<Secret<String>>,
    ) -> Self {
        Self {
            gemini_default,
            openrouter_default,
        }
    }

    pub fn from_config(config: &ProvidersConfig) -> Self {
        Self::new(
            config.gemini_api_key.clone(),
            config.openrouter_api_key.clone(),
        )
    }

    /// Resolve the credential for `provider`, if any. Local needs none.
    pub fn resolve(&self, provider: ProviderKind, user: Option<&UserRecord>) -> Option<ProviderCredential> {
        let default = match provider {
            ProviderKind::Local => return None,
            ProviderKind::Gemini => self.gemini_default.as_ref(),
            ProviderKind::OpenRouter => self.openrouter_default.as_ref(),
        };

        user.and_then(|u| u.api_key(provider))
            .filter(|key| !key.expose_secret().trim().is_empty())
            .or_else(|| default.filter(|key| !key.expose_secret().trim().is_empty()))
            .map(|key| ProviderCredential::from(key.clone()))
    }
}
