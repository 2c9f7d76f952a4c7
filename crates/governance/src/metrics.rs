//! Metrics implementation using Prometheus.

use std::time::Duration;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use workbench_core::{Error, ErrorKind, Result};

pub const TOOL_INVOCATIONS: &str = "workbench_tool_invocations_total";
pub const COMMAND_RUNS: &str = "workbench_command_runs_total";
pub const CHAT_REQUESTS: &str = "workbench_chat_requests_total";
pub const OPERATION_DURATION: &str = "workbench_operation_duration_seconds";

/// Initialize Prometheus recorder and return the handle.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::internal(format!("failed to install Prometheus recorder: {}", e)))?;

    tracing::info!("Prometheus metrics recorder initialized");
    Ok(handle)
}

/// Label value for an operation outcome: `success`, or the error kind.
pub fn outcome_label(error: Option<ErrorKind>) -> &'static str {
    match error {
        None => "success",
        Some(ErrorKind::Validation) => "validation",
        Some(ErrorKind::AccessDenied) => "access_denied",
        Some(ErrorKind::Execution) => "execution",
        Some(ErrorKind::Provider) => "provider",
        Some(ErrorKind::NotFound) => "not_found",
        Some(ErrorKind::Conflict) => "conflict",
        Some(ErrorKind::Internal) => "internal",
    }
}

/// Label value for tool names that matched no registered tool.
pub const UNKNOWN_TOOL: &str = "unknown";

/// `tool` is the registered name, or `None` when the name missed the registry;
/// those collapse into [`UNKNOWN_TOOL`] so callers cannot mint new series.
pub fn track_tool_invocation(tool: Option<&str>, outcome: &'static str) {
    let tool = tool.unwrap_or(UNKNOWN_TOOL).to_string();
    metrics::counter!(TOOL_INVOCATIONS, "tool" => tool, "outcome" => outcome).increment(1);
}

/// `form` is `shell`, `program` or an interpreter label such as `python`.
pub fn track_command_run(form: &str, outcome: &'static str) {
    metrics::counter!(COMMAND_RUNS, "form" => form.to_string(), "outcome" => outcome).increment(1);
}

pub fn track_chat_request(provider: &str, outcome: &'static str) {
    metrics::counter!(CHAT_REQUESTS, "provider" => provider.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn track_duration(operation: &'static str, elapsed: Duration) {
    metrics::histogram!(OPERATION_DURATION, "operation" => operation).record(elapsed.as_secs_f64());
}
