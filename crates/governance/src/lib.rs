#![deny(unused)]
//! Governance for the workbench gateway.
//!
//! This crate provides:
//! - Tracing subscriber setup (stdout, optional OTLP export)
//! - Prometheus metrics helpers
//! - Audit logging of gateway outcomes

pub mod audit;
pub mod metrics;
pub mod tracing_layer;

pub use audit::{AuditEntry, AuditFilter, AuditOutcome, AuditStore, FileAuditStore, InMemoryAuditStore};
pub use self::metrics::{
    outcome_label, setup_metrics_recorder, track_chat_request, track_command_run, track_duration,
    track_tool_invocation, UNKNOWN_TOOL,
};
pub use tracing_layer::configure_tracing;
