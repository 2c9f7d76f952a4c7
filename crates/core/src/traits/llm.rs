//! Model provider traits.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatMessage, ProviderCredential, ProviderKind};

/// Translation layer between the shared transcript and one model backend.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which provider family this adapter speaks to.
    fn kind(&self) -> ProviderKind;

    /// Send the transcript and return the assistant reply text.
    ///
    /// Adapters that need a credential fail with `Error::Provider` when
    /// `credential` is `None`, before any network call.
    async fn chat(
        &self,
        model: &str,
        transcript: &[ChatMessage],
        credential: Option<&ProviderCredential>,
    ) -> Result<String>;

    /// Models the backend advertises. Hosted catalogs return an empty list.
    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}
