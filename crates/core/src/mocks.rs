//! Mock implementations of core traits for testing.
//!
//! Used by unit and integration tests across the workspace.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::{
    traits::{ProviderAdapter, Tool},
    types::{ChatMessage, ExecutionContext, ProviderCredential, ProviderKind},
    Error, Result,
};

// =============================================================================
// Mock Provider Adapter
// =============================================================================

/// A call observed by [`MockProviderAdapter`].
#[derive(Debug, Clone)]
pub struct ObservedChat {
    pub model: String,
    pub transcript: Vec<ChatMessage>,
    pub had_credential: bool,
}

/// Scripted provider adapter that returns a fixed reply.
pub struct MockProviderAdapter {
    kind: ProviderKind,
    reply: String,
    requires_credential: bool,
    calls: Mutex<Vec<ObservedChat>>,
}

impl MockProviderAdapter {
    /// Create a mock for `kind` that always replies with `reply`.
    ///
    /// Hosted kinds require a credential, like the real adapters.
    pub fn new(kind: ProviderKind, reply: &str) -> Self {
        Self {
            kind,
            reply: reply.to_string(),
            requires_credential: kind != ProviderKind::Local,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Calls that reached the adapter.
    pub fn calls(&self) -> Vec<ObservedChat> {
        self.calls
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Number of calls that reached the adapter.
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

#[async_trait]
impl ProviderAdapter for MockProviderAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn chat(
        &self,
        model: &str,
        transcript: &[ChatMessage],
        credential: Option<&ProviderCredential>,
    ) -> Result<String> {
        if self.requires_credential && credential.is_none() {
            return Err(Error::provider(format!(
                "credential not provided for model {}",
                model
            )));
        }

        if let Ok(mut calls) = self.calls.lock() {
            calls.push(ObservedChat {
                model: model.to_string(),
                transcript: transcript.to_vec(),
                had_credential: credential.is_some(),
            });
        }

        Ok(self.reply.clone())
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec![format!("{}-mock", self.kind)])
    }
}

// =============================================================================
// Mock Tool
// =============================================================================

/// Tool that counts its executions and echoes the required `text` argument.
pub struct RecordingTool {
    name: String,
    executions: AtomicUsize,
    break_output_contract: bool,
}

impl RecordingTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            executions: AtomicUsize::new(0),
            break_output_contract: false,
        }
    }

    /// A tool whose handler returns output violating its own output schema.
    pub fn with_broken_output(name: &str) -> Self {
        Self {
            break_output_contract: true,
            ..Self::new(name)
        }
    }

    /// Number of times the handler body ran.
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Echoes its text argument"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "echo": { "type": "string" } },
            "required": ["echo"]
        })
    }

    fn tags(&self) -> BTreeSet<String> {
        BTreeSet::from(["test".to_string()])
    }

    async fn execute(&self, args: Value, _ctx: &ExecutionContext) -> Result<Value> {
        self.executions.fetch_add(1, Ordering::SeqCst);

        if self.break_output_contract {
            return Ok(json!({ "echo": 42 }));
        }

        let text = args.get("text").and_then(Value::as_str).unwrap_or_default();
        Ok(json!({ "echo": text }))
    }
}
