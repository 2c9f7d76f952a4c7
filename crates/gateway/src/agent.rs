//! Agent Gateway façade.
//!
//! Every operation is one round trip (validate, execute, wrap) and always
//! answers with an [`Envelope`]; errors never cross this boundary. Each call
//! also bumps its Prometheus counters and writes one audit entry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use workbench_core::{
    ChatMessage, Envelope, Error, ExecutionContext, Result, SandboxRoot, UserRecord,
};
use workbench_governance::{
    outcome_label, track_chat_request, track_command_run, track_duration, track_tool_invocation,
    AuditEntry, AuditOutcome, AuditStore,
};
use workbench_model_gateway::{classify, ProviderRouter};
use workbench_sandbox::{CommandForm, CommandRunner, FileManager};
use workbench_skills::ToolRegistry;

/// An authenticated caller and the sandbox root their calls are confined to.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user: UserRecord,
    pub root: SandboxRoot,
}

impl Caller {
    pub fn new(user: UserRecord, root: SandboxRoot) -> Self {
        Self { user, root }
    }
}

/// Composes the tool registry, command runner and provider router.
///
/// Built once at startup and shared behind an `Arc`; holds no per-call state.
pub struct AgentGateway {
    registry: Arc<ToolRegistry>,
    runner: CommandRunner,
    router: ProviderRouter,
    audit: Arc<dyn AuditStore>,
    python: String,
}

impl AgentGateway {
    pub fn new(
        registry: Arc<ToolRegistry>,
        runner: CommandRunner,
        router: ProviderRouter,
        audit: Arc<dyn AuditStore>,
    ) -> Self {
        Self {
            registry,
            runner,
            router,
            audit,
            python: "python3".into(),
        }
    }

    /// Interpreter binary used by [`execute_python`](Self::execute_python).
    pub fn with_python(mut self, interpreter: impl Into<String>) -> Self {
        self.python = interpreter.into();
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn default_model(&self) -> &str {
        self.router.default_model()
    }

    // =========================================================================
    // Chat
    // =========================================================================

    /// Forward a transcript to the provider selected by `model`.
    ///
    /// On success `content` holds the reply and `output` names the provider
    /// and model that produced it.
    pub async fn chat(
        &self,
        caller: &Caller,
        transcript: &[ChatMessage],
        model: Option<&str>,
    ) -> Envelope {
        let started = Instant::now();
        let route = classify(model, self.router.default_model());
        let provider = route.kind();

        let result = self.router.route(transcript, model, Some(&caller.user)).await;
        let envelope = match result {
            Ok(completion) => {
                let mut envelope = Envelope::content(completion.content);
                envelope.output = Some(json!({
                    "provider": completion.provider,
                    "model": completion.model,
                }));
                envelope
            }
            Err(ref e) => Envelope::from_error(e),
        };

        track_chat_request(provider.as_str(), outcome_label(envelope.kind));
        self.finish(caller, "chat", route.model(), &envelope, started.elapsed())
            .await;
        envelope
    }

    // =========================================================================
    // Tools
    // =========================================================================

    /// Invoke a registered tool against the caller's sandbox root.
    pub async fn invoke_tool(&self, caller: &Caller, name: &str, args: Value) -> Envelope {
        let started = Instant::now();
        let root = caller.root.clone();

        let result = self
            .registry
            .invoke(name, args, move || async move { Ok(ExecutionContext::new(root)) })
            .await;
        let envelope = Envelope::from(result);

        let registered = self.registry.find(name).is_ok().then_some(name);
        track_tool_invocation(registered, outcome_label(envelope.kind));
        self.finish(caller, "invoke_tool", name, &envelope, started.elapsed())
            .await;
        envelope
    }

    /// Catalog of registered tools, handlers omitted.
    pub fn list_tools(&self) -> Envelope {
        Envelope::from(Ok::<_, Error>(self.registry.list()))
    }

    /// Administrative toggle of a tool's `enabled` flag.
    pub async fn set_tool_enabled(&self, caller: &Caller, name: &str, enabled: bool) -> Envelope {
        let started = Instant::now();
        let result = self
            .registry
            .set_enabled(name, enabled)
            .and_then(|()| self.registry.find(name));
        let envelope = Envelope::from(result);

        let action = if enabled { "enable_tool" } else { "disable_tool" };
        self.finish(caller, action, name, &envelope, started.elapsed())
            .await;
        envelope
    }

    // =========================================================================
    // Command execution
    // =========================================================================

    /// Run a shell command in `cwd` (root-relative), defaulting to the root.
    pub async fn execute_bash(&self, caller: &Caller, command: &str, cwd: Option<&str>) -> Envelope {
        let started = Instant::now();
        let requested = cwd.unwrap_or(".");

        let result = self
            .run_in(&caller.root, requested, CommandForm::Shell(command.to_string()))
            .await;
        let envelope = Envelope::from(result);

        track_command_run("shell", outcome_label(envelope.kind));
        self.finish(caller, "execute_bash", requested, &envelope, started.elapsed())
            .await;
        envelope
    }

    /// Run Python source with the caller's root as working directory.
    pub async fn execute_python(&self, caller: &Caller, code: &str) -> Envelope {
        let started = Instant::now();

        let result = self
            .run_in(&caller.root, ".", CommandForm::python(&self.python, code))
            .await;
        let envelope = Envelope::from(result);

        track_command_run("python", outcome_label(envelope.kind));
        self.finish(caller, "execute_python", ".", &envelope, started.elapsed())
            .await;
        envelope
    }

    // =========================================================================
    // Models
    // =========================================================================

    pub async fn list_models(&self) -> Envelope {
        Envelope::from(self.router.list_models().await)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn run_in(&self, root: &SandboxRoot, cwd: &str, form: CommandForm) -> Result<String> {
        if form_is_empty(&form) {
            return Err(Error::validation("nothing to execute"));
        }
        let dir = root.resolve_dir(cwd)?;
        FileManager::new(root.clone()).confine(&dir).await?;
        let opts = self.runner.options().in_dir(dir);
        let output = self.runner.run(form, &opts).await?;
        Ok(output.stdout)
    }

    async fn finish(
        &self,
        caller: &Caller,
        action: &'static str,
        resource: &str,
        envelope: &Envelope,
        elapsed: Duration,
    ) {
        track_duration(action, elapsed);

        let outcome = match envelope.kind {
            None => AuditOutcome::Success,
            Some(kind) => AuditOutcome::from_error(kind, envelope.summary()),
        };
        tracing::info!(
            user_id = %caller.user.id,
            action,
            resource = %resource,
            success = envelope.success,
            elapsed_ms = elapsed.as_millis() as u64,
            "Gateway operation finished"
        );

        let entry = AuditEntry::new(&caller.user.id, action, resource, outcome);
        if let Err(e) = self.audit.log(entry).await {
            tracing::warn!(error = %e, action, "Failed to write audit entry");
        }
    }
}

fn form_is_empty(form: &CommandForm) -> bool {
    match form {
        CommandForm::Shell(command) => command.trim().is_empty(),
        CommandForm::Interpreter { code, .. } => code.trim().is_empty(),
        CommandForm::Program { program, .. } => program.is_empty(),
    }
}
