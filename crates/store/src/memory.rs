//! DashMap-backed stores.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use workbench_core::{
    ChatMessage, ChatSession, Error, MemoryRecord, MemoryStore, Result, SessionStore, UserRecord,
    UserStore,
};

// =============================================================================
// Users
// =============================================================================

/// In-memory user store.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: DashMap<String, UserRecord>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, replacing records with the same ID.
    pub fn with_users(users: impl IntoIterator<Item = UserRecord>) -> Self {
        let store = Self::new();
        for user in users {
            store.users.insert(user.id.clone(), user);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get(&self, user_id: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.get(user_id).map(|r| r.value().clone()))
    }

    async fn upsert(&self, user: UserRecord) -> Result<()> {
        self.users.insert(user.id.clone(), user);
        Ok(())
    }
}

// =============================================================================
// Chat sessions
// =============================================================================

/// In-memory session store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, ChatSession>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, user_id: &str, model: &str, title: &str) -> Result<ChatSession> {
        let now = Utc::now();
        let session = ChatSession {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            model: model.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.sessions.insert(session.id.clone(), session.clone());
        tracing::debug!(session_id = %session.id, user_id = %user_id, "Created chat session");
        Ok(session)
    }

    async fn get(&self, session_id: &str) -> Result<Option<ChatSession>> {
        Ok(self.sessions.get(session_id).map(|r| r.value().clone()))
    }

    async fn append(&self, session_id: &str, messages: Vec<ChatMessage>) -> Result<ChatSession> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::not_found(format!("session '{}'", session_id)))?;
        session.messages.extend(messages);
        session.updated_at = Utc::now();
        Ok(session.clone())
    }
}

// =============================================================================
// Operation history
// =============================================================================

/// In-memory operation history, kept per user in append order.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: DashMap<String, Vec<MemoryRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryRecordStore {
    async fn append(&self, record: MemoryRecord) -> Result<()> {
        self.records
            .entry(record.user_id.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<MemoryRecord>> {
        Ok(self
            .records
            .get(user_id)
            .map(|r| r.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
