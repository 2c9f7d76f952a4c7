#![deny(unused)]
//! Workbench - tool and command execution gateway.
//!
//! Lets a conversational agent act on a host: chat is routed to one of three
//! model providers, schema-checked tools run against a per-user sandbox root,
//! and shell or Python code runs under time and output limits.

use std::sync::Arc;

use workbench_core::config::AppConfig;
use workbench_gateway::{AgentGateway, AppState, GatewayServer};
use workbench_governance::{FileAuditStore, InMemoryAuditStore};
use workbench_model_gateway::ProviderRouter;
use workbench_sandbox::{CommandRunner, WorkspaceLayout};
use workbench_skills::{discover_scripts, TesseractOcrTool, ToolRegistry, TreeTool};
use workbench_store::{InMemoryRecordStore, InMemorySessionStore, InMemoryUserStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    workbench_governance::configure_tracing(&config.telemetry)?;
    tracing::info!("Starting Workbench v{}", env!("CARGO_PKG_VERSION"));

    // =========================================================================
    // Command Runner & Workspace Layout
    // =========================================================================
    let runner = CommandRunner::from_config(&config.execution);
    let layout = WorkspaceLayout::new(&config.workspace.base_dir)?;
    tracing::info!(base = %layout.base().display(), "Workspace layout initialized");

    // =========================================================================
    // Tool Registry
    // =========================================================================
    let registry = Arc::new(ToolRegistry::new());
    for tool in TreeTool::all() {
        registry.register(Arc::new(tool))?;
    }
    registry.register(Arc::new(TesseractOcrTool::new(runner.clone(), &config.ocr)))?;

    // Discovery and registration are separate steps.
    let scripts = discover_scripts(&config.workspace.scripts_dir, &runner)?;
    for script in scripts {
        registry.register(Arc::new(script))?;
    }
    tracing::info!(tools_count = registry.len(), "Tool registry initialized");

    // =========================================================================
    // Provider Router
    // =========================================================================
    let router = ProviderRouter::from_config(&config.providers)?;
    tracing::info!(
        default_model = %router.default_model(),
        ollama = %config.providers.ollama_url,
        "Provider router initialized"
    );

    // =========================================================================
    // Governance
    // =========================================================================
    let metrics_handle = if config.telemetry.metrics_enabled {
        Some(workbench_governance::setup_metrics_recorder()?)
    } else {
        None
    };

    let audit: Arc<dyn workbench_governance::AuditStore> = match config.telemetry.audit_file {
        Some(ref path) => {
            tracing::info!(path = %path.display(), "Writing audit log to file");
            Arc::new(FileAuditStore::new(path))
        }
        None => Arc::new(InMemoryAuditStore::new()),
    };

    // =========================================================================
    // Agent Gateway & HTTP Server
    // =========================================================================
    let gateway = AgentGateway::new(registry, runner, router, audit)
        .with_python(config.execution.python.clone());

    if config.users.is_empty() {
        tracing::warn!("No users configured; every /api request will be rejected");
    }
    let state = AppState {
        gateway: Arc::new(gateway),
        users: Arc::new(InMemoryUserStore::with_users(config.users.clone())),
        sessions: Arc::new(InMemorySessionStore::new()),
        memory: Arc::new(InMemoryRecordStore::new()),
        layout,
    };

    let mut server = GatewayServer::new(config.server.clone(), state);
    if let Some(handle) = metrics_handle {
        server = server.with_metrics(handle);
    }

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "Gateway initialized"
    );

    server.run().await?;
    Ok(())
}
