//! Audit logging of gateway outcomes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use workbench_core::{Error, ErrorKind, Result};

/// Outcome of an audited action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Denied,
    Error(String),
}

impl AuditOutcome {
    /// Classify a failed operation. Sandbox refusals are `Denied`.
    pub fn from_error(kind: ErrorKind, message: impl Into<String>) -> Self {
        match kind {
            ErrorKind::AccessDenied => Self::Denied,
            _ => Self::Error(message.into()),
        }
    }
}

/// A single audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry ID.
    pub id: String,
    /// Timestamp (RFC 3339).
    pub timestamp: String,
    /// Caller identity.
    pub user_id: String,
    /// Action performed (e.g. "invoke_tool", "execute_bash").
    pub action: String,
    /// Resource affected (tool name, model, working directory).
    pub resource: String,
    pub outcome: AuditOutcome,
}

impl AuditEntry {
    pub fn new(
        user_id: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            user_id: user_id.into(),
            action: action.into(),
            resource: resource.into(),
            outcome,
        }
    }
}

/// Filter for querying audit logs.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub user_id: Option<String>,
    pub action: Option<String>,
    pub resource: Option<String>,
    pub limit: Option<usize>,
}

impl AuditFilter {
    fn matches(&self, e: &AuditEntry) -> bool {
        self.user_id.as_ref().map_or(true, |u| &e.user_id == u)
            && self.action.as_ref().map_or(true, |a| &e.action == a)
            && self.resource.as_ref().map_or(true, |r| &e.resource == r)
    }

    fn apply<'a>(&self, entries: impl Iterator<Item = &'a AuditEntry>) -> Vec<AuditEntry> {
        entries
            .filter(|e| self.matches(e))
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

/// Trait for audit log persistence.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Log an audit entry.
    async fn log(&self, entry: AuditEntry) -> Result<()>;

    /// Query audit logs in insertion order.
    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEntry>>;
}

/// In-memory audit store.
#[derive(Default)]
pub struct InMemoryAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn log(&self, entry: AuditEntry) -> Result<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEntry>> {
        let entries = self.entries.read().await;
        Ok(filter.apply(entries.iter()))
    }
}

/// Append-only JSON-lines audit file.
pub struct FileAuditStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileAuditStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditStore for FileAuditStore {
    async fn log(&self, entry: AuditEntry) -> Result<()> {
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditEntry>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let entries = raw
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| {
                serde_json::from_str::<AuditEntry>(l)
                    .map_err(|e| Error::internal(format!("corrupt audit line: {}", e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(filter.apply(entries.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed(store: &dyn AuditStore) {
        store
            .log(AuditEntry::new("alice", "invoke_tool", "tree_simple", AuditOutcome::Success))
            .await
            .unwrap();
        store
            .log(AuditEntry::new(
                "bob",
                "execute_bash",
                ".",
                AuditOutcome::Error("exit code 1: boom".into()),
            ))
            .await
            .unwrap();
        store
            .log(AuditEntry::new("alice", "execute_bash", "../etc", AuditOutcome::Denied))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_in_memory_query() {
        let store = InMemoryAuditStore::new();
        seed(&store).await;

        let alice = store
            .query(AuditFilter {
                user_id: Some("alice".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(alice.len(), 2);
        assert_eq!(alice[1].outcome, AuditOutcome::Denied);

        let limited = store
            .query(AuditFilter {
                action: Some("execute_bash".into()),
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].user_id, "bob");
    }

    #[tokio::test]
    async fn test_file_store_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAuditStore::new(dir.path().join("audit.jsonl"));

        assert!(store.query(AuditFilter::default()).await.unwrap().is_empty());
        seed(&store).await;

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw.lines().count(), 3);

        let all = store.query(AuditFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].outcome, AuditOutcome::Error("exit code 1: boom".into()));
    }

    #[test]
    fn test_outcome_from_error() {
        assert_eq!(
            AuditOutcome::from_error(ErrorKind::AccessDenied, "escape"),
            AuditOutcome::Denied
        );
        assert_eq!(
            AuditOutcome::from_error(ErrorKind::Provider, "down"),
            AuditOutcome::Error("down".into())
        );
    }
}
