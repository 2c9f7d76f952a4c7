//! Bounded child-process execution.
//!
//! Every invocation spawns a fresh process in its own process group with a
//! null stdin and piped stdout/stderr. Both pipes are drained concurrently
//! against one shared byte budget; exceeding the budget or the timeout kills
//! the whole group and reports an execution error.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use workbench_core::config::ExecutionConfig;
use workbench_core::{CommandOutput, Error, Result};

/// Maximum diagnostic text carried by a non-zero exit error.
const MAX_DIAGNOSTIC_BYTES: usize = 4096;

// =============================================================================
// Invocation Types
// =============================================================================

/// What to run.
#[derive(Debug, Clone)]
pub enum CommandForm {
    /// A command string run through the host shell (`sh -c`).
    Shell(String),
    /// A program with an explicit argument list, no shell involved.
    Program { program: String, args: Vec<String> },
    /// Source code written to a temporary file and run by an interpreter.
    Interpreter {
        interpreter: String,
        code: String,
        /// File extension for the temporary script, without the dot.
        extension: String,
    },
}

impl CommandForm {
    /// Python code run by the given interpreter binary.
    pub fn python(interpreter: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Interpreter {
            interpreter: interpreter.into(),
            code: code.into(),
            extension: "py".into(),
        }
    }

    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Shell(_) => "shell",
            Self::Program { .. } => "program",
            Self::Interpreter { .. } => "interpreter",
        }
    }
}

/// Limits and working directory for one invocation.
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Working directory. Must already be confined by the caller.
    pub cwd: Option<PathBuf>,
    /// Refuse to run when `cwd` is absent.
    pub require_cwd: bool,
    pub timeout: Duration,
    /// Combined stdout + stderr budget.
    pub max_output_bytes: usize,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            cwd: None,
            require_cwd: false,
            timeout: Duration::from_secs(30),
            max_output_bytes: 1024 * 1024,
        }
    }
}

impl ExecOptions {
    /// Options running in `cwd`, which is then required.
    pub fn in_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self.require_cwd = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.max_output_bytes = max;
        self
    }
}

// =============================================================================
// Command Runner
// =============================================================================

/// Runs shell commands, programs and interpreter scripts as child processes.
///
/// Holds no per-call state; clones are cheap and calls are independent.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    shell: String,
    temp_dir: Option<PathBuf>,
    defaults: ExecOptions,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self {
            shell: "sh".into(),
            temp_dir: None,
            defaults: ExecOptions::default(),
        }
    }
}

impl CommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a runner from the `[execution]` config section.
    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self {
            shell: config.shell.clone(),
            temp_dir: config.temp_dir.clone(),
            defaults: ExecOptions {
                timeout: Duration::from_millis(config.timeout_ms),
                max_output_bytes: config.max_output_bytes,
                ..ExecOptions::default()
            },
        }
    }

    /// Default limits for callers that only need to set a working directory.
    pub fn options(&self) -> ExecOptions {
        self.defaults.clone()
    }

    /// Run a command string through the shell.
    pub async fn shell(&self, command: &str, opts: &ExecOptions) -> Result<CommandOutput> {
        self.run(CommandForm::Shell(command.to_string()), opts).await
    }

    /// Run a command form under the given limits.
    pub async fn run(&self, form: CommandForm, opts: &ExecOptions) -> Result<CommandOutput> {
        if opts.require_cwd && opts.cwd.is_none() {
            return Err(Error::validation("a working directory is required"));
        }
        if let Some(ref cwd) = opts.cwd {
            match tokio::fs::metadata(cwd).await {
                Ok(md) if md.is_dir() => {}
                _ => return Err(Error::not_found("working directory")),
            }
        }

        let label = form.label();

        // The temporary script lives until this function returns, on every path.
        let (mut cmd, _script) = match form {
            CommandForm::Shell(command) => {
                let mut cmd = Command::new(&self.shell);
                cmd.arg("-c").arg(command);
                (cmd, None)
            }
            CommandForm::Program { program, args } => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                (cmd, None)
            }
            CommandForm::Interpreter {
                interpreter,
                code,
                extension,
            } => {
                let script = self.write_script(&code, &extension).await?;
                let mut cmd = Command::new(interpreter);
                cmd.arg(script.path());
                (cmd, Some(script))
            }
        };

        if let Some(ref cwd) = opts.cwd {
            cmd.current_dir(cwd);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        tracing::debug!(form = label, timeout_ms = opts.timeout.as_millis() as u64, "Spawning command");

        let started = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| Error::execution(format!("failed to start {}: {}", label, e)))?;
        let pid = child.id();

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::internal("child stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::internal("child stderr not captured"))?;

        let used = AtomicUsize::new(0);
        let limit = opts.max_output_bytes;
        let collected = tokio::time::timeout(opts.timeout, async {
            let (out, err) = tokio::try_join!(
                read_capped(stdout, &used, limit),
                read_capped(stderr, &used, limit),
            )?;
            let status = child.wait().await?;
            Ok::<_, Error>((out, err, status))
        })
        .await;

        let (out, err, status) = match collected {
            Ok(Ok(done)) => done,
            Ok(Err(e)) => {
                tracing::warn!(form = label, error = %e, "Command aborted");
                kill_group(pid);
                let _ = child.kill().await;
                return Err(e);
            }
            Err(_) => {
                let ms = opts.timeout.as_millis() as u64;
                tracing::warn!(form = label, timeout_ms = ms, "Command timed out");
                kill_group(pid);
                let _ = child.kill().await;
                return Err(Error::Timeout(ms));
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let stdout = String::from_utf8_lossy(&out).trim().to_string();
        let stderr = String::from_utf8_lossy(&err).into_owned();

        match status.code() {
            Some(0) => {
                tracing::debug!(form = label, duration_ms, "Command finished");
                Ok(CommandOutput {
                    stdout,
                    stderr,
                    exit_code: 0,
                    duration_ms,
                })
            }
            code => {
                let diagnostic = if stderr.trim().is_empty() {
                    stdout.as_str()
                } else {
                    stderr.trim()
                };
                let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                tracing::debug!(form = label, exit_code = %code, duration_ms, "Command failed");
                Err(Error::execution(format!(
                    "exit code {}: {}",
                    code,
                    truncate_diagnostic(diagnostic)
                )))
            }
        }
    }

    async fn write_script(&self, code: &str, extension: &str) -> Result<tempfile::NamedTempFile> {
        let dir = self.temp_dir.clone().unwrap_or_else(std::env::temp_dir);
        let suffix = format!(".{}", extension);
        let code = code.to_string();

        tokio::task::spawn_blocking(move || {
            use std::io::Write;

            let mut file = tempfile::Builder::new()
                .prefix("workbench-")
                .suffix(&suffix)
                .tempfile_in(dir)?;
            file.write_all(code.as_bytes())?;
            file.flush()?;
            Ok::<_, Error>(file)
        })
        .await
        .map_err(|e| Error::internal(format!("script writer panicked: {}", e)))?
    }
}

/// Read a pipe to completion, failing once the shared budget is exceeded.
async fn read_capped<R: AsyncRead + Unpin>(
    mut reader: R,
    used: &AtomicUsize,
    limit: usize,
) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(buf);
        }
        if used.fetch_add(n, Ordering::SeqCst) + n > limit {
            return Err(Error::OutputLimitExceeded(limit));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// SIGKILL the child's process group so pipelines die with it.
fn kill_group(pid: Option<u32>) {
    #[cfg(unix)]
    {
        if let Some(pid) = pid {
            // SAFETY: killpg has no memory-safety preconditions.
            unsafe {
                libc::killpg(pid as i32, libc::SIGKILL);
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
    }
}

fn truncate_diagnostic(text: &str) -> &str {
    if text.len() <= MAX_DIAGNOSTIC_BYTES {
        return text;
    }
    let mut end = MAX_DIAGNOSTIC_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_zero_exit_trims_stdout() {
        let runner = CommandRunner::new();
        let out = runner.shell("echo '  hello  '", &runner.options()).await.unwrap();
        assert_eq!(out.stdout, "hello");
        assert_eq!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let runner = CommandRunner::new();
        let err = runner
            .shell("echo boom >&2; exit 3", &runner.options())
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("exit code 3"), "{msg}");
        assert!(msg.contains("boom"), "{msg}");
    }

    #[tokio::test]
    async fn test_nonzero_exit_falls_back_to_stdout() {
        let runner = CommandRunner::new();
        let err = runner.shell("echo only-out; false", &runner.options()).await.unwrap_err();
        assert!(err.to_string().contains("only-out"));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let runner = CommandRunner::new();
        let opts = runner.options().with_timeout(Duration::from_millis(300));
        let started = Instant::now();
        let err = runner.shell("sleep 60", &opts).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(300)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_output_limit_is_failure() {
        let runner = CommandRunner::new();
        let opts = runner.options().with_max_output_bytes(1024 * 1024);
        let err = runner.shell("yes | head -c 10000000", &opts).await.unwrap_err();
        assert!(matches!(err, Error::OutputLimitExceeded(_)));
    }

    #[tokio::test]
    async fn test_output_budget_is_shared() {
        let runner = CommandRunner::new();
        let opts = runner.options().with_max_output_bytes(100);
        let err = runner
            .shell("head -c 60 /dev/zero; head -c 60 /dev/zero >&2", &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OutputLimitExceeded(100)));
    }

    #[tokio::test]
    async fn test_require_cwd() {
        let runner = CommandRunner::new();
        let opts = ExecOptions {
            require_cwd: true,
            ..runner.options()
        };
        let err = runner.shell("true", &opts).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_runs_in_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let runner = CommandRunner::new();
        let out = runner
            .shell("pwd", &runner.options().in_dir(dir.path()))
            .await
            .unwrap();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(std::path::Path::new(&out.stdout).canonicalize().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_program_args_not_shell_interpreted() {
        let runner = CommandRunner::new();
        let form = CommandForm::Program {
            program: "echo".into(),
            args: vec!["$HOME".into(), "a;b".into()],
        };
        let out = runner.run(form, &runner.options()).await.unwrap();
        assert_eq!(out.stdout, "$HOME a;b");
    }

    #[tokio::test]
    async fn test_interpreter_script_removed() {
        let temp = tempfile::tempdir().unwrap();
        let runner = CommandRunner {
            temp_dir: Some(temp.path().to_path_buf()),
            ..CommandRunner::new()
        };

        let form = CommandForm::Interpreter {
            interpreter: "sh".into(),
            code: "echo from-script".into(),
            extension: "sh".into(),
        };
        let out = runner.run(form, &runner.options()).await.unwrap();
        assert_eq!(out.stdout, "from-script");

        let failing = CommandForm::Interpreter {
            interpreter: "sh".into(),
            code: "exit 1".into(),
            extension: "sh".into(),
        };
        assert!(runner.run(failing, &runner.options()).await.is_err());

        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_truncate_diagnostic_on_char_boundary() {
        let text = "é".repeat(3000);
        let cut = truncate_diagnostic(&text);
        assert!(cut.len() <= MAX_DIAGNOSTIC_BYTES);
        assert!(cut.chars().all(|c| c == 'é'));
    }
}
