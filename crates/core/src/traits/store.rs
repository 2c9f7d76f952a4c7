//! Persistence traits.
//!
//! The persistence layer is an external collaborator; these traits describe
//! the slice of it the gateway needs.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatMessage, ChatSession, MemoryRecord, UserRecord};

/// Lookup of authenticated users and their stored preferences.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Get a user by ID.
    async fn get(&self, user_id: &str) -> Result<Option<UserRecord>>;

    /// Insert or replace a user.
    async fn upsert(&self, user: UserRecord) -> Result<()>;
}

/// Chat session storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create an empty session owned by `user_id`.
    async fn create(&self, user_id: &str, model: &str, title: &str) -> Result<ChatSession>;

    /// Get a session by ID.
    async fn get(&self, session_id: &str) -> Result<Option<ChatSession>>;

    /// Append messages to a session, returning the updated session.
    async fn append(&self, session_id: &str, messages: Vec<ChatMessage>) -> Result<ChatSession>;
}

/// Operation history written after each gateway call.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Append a record.
    async fn append(&self, record: MemoryRecord) -> Result<()>;

    /// Most recent records for a user, newest first.
    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<MemoryRecord>>;
}
