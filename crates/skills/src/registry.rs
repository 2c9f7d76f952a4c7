//! Tool registry implementation.
//!
//! Tools are registered once at startup. Both schemas are compiled at
//! registration so invocation only pays for validation. The `enabled` flag is
//! the only per-tool state mutated afterwards.

use dashmap::DashMap;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use workbench_core::{
    traits::Tool,
    types::{ExecutionContext, ToolDefinition},
    Error, Result,
};

/// A tool with its compiled schemas and runtime toggle.
struct ToolEntry {
    tool: Arc<dyn Tool>,
    input_schema: Value,
    output_schema: Value,
    input: jsonschema::Validator,
    output: jsonschema::Validator,
    enabled: AtomicBool,
}

impl ToolEntry {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.tool.name().to_string(),
            description: self.tool.description().to_string(),
            input_schema: self.input_schema.clone(),
            output_schema: self.output_schema.clone(),
            tags: self.tool.tags(),
            enabled: self.enabled.load(Ordering::Acquire),
        }
    }
}

/// Registry of named, schema-validated tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: DashMap<String, Arc<ToolEntry>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Register a tool, compiling its input and output schemas.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if name.is_empty() {
            return Err(Error::Config("tool name must not be empty".into()));
        }
        if self.tools.contains_key(&name) {
            return Err(Error::already_exists(format!("tool '{}'", name)));
        }

        let input_schema = tool.input_schema();
        let output_schema = tool.output_schema();
        let input = jsonschema::validator_for(&input_schema).map_err(|e| {
            Error::Config(format!("invalid input schema for tool '{}': {}", name, e))
        })?;
        let output = jsonschema::validator_for(&output_schema).map_err(|e| {
            Error::Config(format!("invalid output schema for tool '{}': {}", name, e))
        })?;

        tracing::info!(tool = %name, "Registering tool");
        self.tools.insert(
            name,
            Arc::new(ToolEntry {
                tool,
                input_schema,
                output_schema,
                input,
                output,
                enabled: AtomicBool::new(true),
            }),
        );
        Ok(())
    }

    /// Register every tool in `tools`, stopping at the first failure.
    pub fn register_all<I>(&self, tools: I) -> Result<()>
    where
        I: IntoIterator<Item = Arc<dyn Tool>>,
    {
        tools.into_iter().try_for_each(|tool| self.register(tool))
    }

    /// Look up a tool by exact, case-sensitive name.
    pub fn find(&self, name: &str) -> Result<ToolDefinition> {
        self.tools
            .get(name)
            .map(|entry| entry.definition())
            .ok_or_else(|| Error::tool_not_found(name))
    }

    /// All tools, sorted by name, without handlers.
    pub fn list(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<_> = self.tools.iter().map(|e| e.definition()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Enable or disable a tool.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let entry = self
            .tools
            .get(name)
            .ok_or_else(|| Error::tool_not_found(name))?;
        entry.enabled.store(enabled, Ordering::Release);
        tracing::info!(tool = %name, enabled, "Tool toggled");
        Ok(())
    }

    /// Validate `args`, build the execution context and run the tool.
    ///
    /// `make_context` runs only once the tool exists, is enabled and the
    /// arguments passed validation.
    pub async fn invoke<F, Fut>(&self, name: &str, args: Value, make_context: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ExecutionContext>>,
    {
        // Clone out so no map guard is held across the handler's await points.
        let entry = self
            .tools
            .get(name)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| Error::tool_not_found(name))?;

        if !entry.enabled.load(Ordering::Acquire) {
            return Err(Error::validation(format!("tool '{}' is disabled", name)));
        }

        let violations: Vec<String> = entry.input.iter_errors(&args).map(|e| e.to_string()).collect();
        if !violations.is_empty() {
            tracing::warn!(tool = %name, violations = violations.len(), "Rejected tool arguments");
            return Err(Error::validation(format!(
                "invalid arguments for tool '{}': {}",
                name,
                violations.join("; ")
            )));
        }

        let ctx = make_context().await?;

        tracing::debug!(tool = %name, "Executing tool");
        let output = entry.tool.execute(args, &ctx).await?;

        let violations: Vec<String> = entry
            .output
            .iter_errors(&output)
            .map(|e| e.to_string())
            .collect();
        if !violations.is_empty() {
            tracing::error!(tool = %name, "Tool output violates its declared schema");
            return Err(Error::execution(format!(
                "tool '{}' returned output violating its schema: {}",
                name,
                violations.join("; ")
            )));
        }

        Ok(output)
    }
}
