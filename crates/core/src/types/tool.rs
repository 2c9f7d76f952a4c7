use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{Error, ErrorKind};
use crate::fs_policy::SandboxRoot;

// =============================================================================
// Result Envelope
// =============================================================================

/// Uniform result shape returned by every gateway operation.
///
/// The calling layer never branches on provider- or tool-specific result
/// shapes: it checks `success` and renders `output`/`content` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Whether the operation succeeded.
    pub success: bool,

    /// Structured output (tool results, command output).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,

    /// Text content (chat replies).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Error message, present iff `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Error category, present iff `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl Envelope {
    /// Successful structured output.
    pub fn output(output: serde_json::Value) -> Self {
        Self {
            success: true,
            output: Some(output),
            content: None,
            error: None,
            kind: None,
        }
    }

    /// Successful text content.
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            success: true,
            output: None,
            content: Some(content.into()),
            error: None,
            kind: None,
        }
    }

    /// Failed result from an error.
    pub fn from_error(err: &Error) -> Self {
        let kind = err.kind();
        if kind == ErrorKind::Internal {
            tracing::error!(error = %err, "Internal failure");
        }
        Self {
            success: false,
            output: None,
            content: None,
            error: Some(err.public_message()),
            kind: Some(kind),
        }
    }

    /// Text to record downstream: the content/output on success, the error otherwise.
    pub fn summary(&self) -> String {
        if let Some(ref error) = self.error {
            return error.clone();
        }
        if let Some(ref content) = self.content {
            return content.clone();
        }
        match self.output {
            Some(serde_json::Value::String(ref s)) => s.clone(),
            Some(ref value) => value.to_string(),
            None => String::new(),
        }
    }
}

impl<T: Serialize> From<crate::Result<T>> for Envelope {
    fn from(result: crate::Result<T>) -> Self {
        match result.and_then(|v| serde_json::to_value(v).map_err(Error::from)) {
            Ok(value) => Envelope::output(value),
            Err(e) => Envelope::from_error(&e),
        }
    }
}

// =============================================================================
// Tool Types
// =============================================================================

/// Tool definition as exposed to callers: a manifest without its handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,

    /// Human-readable description.
    pub description: String,

    /// JSON Schema for tool arguments.
    pub input_schema: serde_json::Value,

    /// JSON Schema the tool's output conforms to.
    pub output_schema: serde_json::Value,

    /// Free-form tags.
    pub tags: BTreeSet<String>,

    /// Whether the tool may currently be invoked.
    pub enabled: bool,
}

/// Per-call bundle handed to a tool handler.
///
/// Built only after the tool has been found and its arguments validated.
/// Handlers borrow it for the duration of the call and must not keep it.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// The sandbox root every filesystem access is confined to.
    pub workspace_root: SandboxRoot,
}

impl ExecutionContext {
    /// Create a context for the given workspace root.
    pub fn new(workspace_root: SandboxRoot) -> Self {
        Self { workspace_root }
    }
}
