//! Tool traits.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;

use crate::error::Result;
use crate::types::ExecutionContext;

/// A named, schema-typed capability.
///
/// The registry validates `args` against [`Tool::input_schema`] before
/// `execute` runs and validates the returned value against
/// [`Tool::output_schema`] afterwards.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the unique name of the tool.
    fn name(&self) -> &str;

    /// Get the human-readable description.
    fn description(&self) -> &str;

    /// Get the JSON Schema for arguments.
    fn input_schema(&self) -> Value;

    /// Get the JSON Schema the output conforms to.
    fn output_schema(&self) -> Value;

    /// Free-form tags.
    fn tags(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Execute the tool with already-validated arguments.
    async fn execute(&self, args: Value, ctx: &ExecutionContext) -> Result<Value>;
}
