use chrono::{DateTime, Utc};
use secrecy::Secret;
use serde::{Deserialize, Serialize};

use super::chat::{ChatMessage, ProviderKind};

// =============================================================================
// Records owned by the surrounding application
// =============================================================================

/// Authenticated user as supplied by the authentication layer.
#[derive(Debug, Clone, Deserialize)]
pub struct UserRecord {
    /// Stable user ID.
    pub id: String,

    /// Email, used to derive the user's home directory.
    pub email: String,

    /// Stored preferences, including per-provider credentials.
    #[serde(default)]
    pub preferences: UserPreferences,
}

impl UserRecord {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            preferences: UserPreferences::default(),
        }
    }

    /// Stored credential for a provider, if the user configured one.
    pub fn api_key(&self, provider: ProviderKind) -> Option<&Secret<String>> {
        match provider {
            ProviderKind::Gemini => self.preferences.gemini_api_key.as_ref(),
            ProviderKind::OpenRouter => self.preferences.openrouter_api_key.as_ref(),
            ProviderKind::Local => None,
        }
    }
}

/// User preferences relevant to the core.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    /// Model selected in the UI.
    #[serde(alias = "current_model")]
    pub current_model: Option<String>,

    /// Gemini API key.
    #[serde(alias = "gemini_api_key")]
    pub gemini_api_key: Option<Secret<String>>,

    /// OpenRouter API key.
    #[serde(alias = "openrouter_api_key")]
    pub openrouter_api_key: Option<Secret<String>>,
}

/// A persisted chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// Session ID.
    pub id: String,

    /// Owning user.
    pub user_id: String,

    /// Title derived from the first message.
    pub title: String,

    /// Model the session was started with.
    pub model: String,

    /// Append-only transcript.
    pub messages: Vec<ChatMessage>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which gateway operation produced a memory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryOperation {
    Chat,
    Bash,
    Python,
    Tool,
}

/// Record of an operation, written by the caller after a core call returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    pub id: String,
    pub user_id: String,
    pub operation: MemoryOperation,
    pub input: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    pub fn new(
        user_id: impl Into<String>,
        operation: MemoryOperation,
        input: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            operation,
            input: input.into(),
            output: output.into(),
            model: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}
