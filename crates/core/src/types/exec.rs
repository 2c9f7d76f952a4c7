use serde::{Deserialize, Serialize};

/// Captured result of a child process that exited successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    /// Standard output, trimmed.
    pub stdout: String,

    /// Standard error, untrimmed.
    pub stderr: String,

    /// Exit code (always 0 for a successful run).
    pub exit_code: i32,

    /// Wall-clock duration.
    pub duration_ms: u64,
}
