use config::{Config, ConfigError, Environment, File};
use secrecy::Secret;
use serde::Deserialize;
use std::path::PathBuf;

use crate::types::UserRecord;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub workspace: WorkspaceConfig,
    pub execution: ExecutionConfig,
    pub providers: ProvidersConfig,
    pub ocr: OcrConfig,
    pub telemetry: TelemetryConfig,
    /// Users the authentication layer may name. Stands in for the external
    /// user directory when no other store is wired up.
    pub users: Vec<UserRecord>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    pub enable_tracing: bool,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3100,
            enable_cors: true,
            enable_tracing: true,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory holding one subdirectory per user.
    pub base_dir: PathBuf,
    /// Directory enumerated once at startup for script tools.
    pub scripts_dir: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(".local-agent-workspaces"),
            scripts_dir: PathBuf::from("scripts"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExecutionConfig {
    pub timeout_ms: u64,
    pub max_output_bytes: usize,
    pub shell: String,
    pub python: String,
    /// Where interpreter scripts are written. Defaults to the OS temp dir.
    pub temp_dir: Option<PathBuf>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_output_bytes: 1024 * 1024,
            shell: "sh".into(),
            python: "python3".into(),
            temp_dir: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProvidersConfig {
    pub ollama_url: String,
    pub default_model: String,
    pub gemini_base_url: String,
    pub openrouter_base_url: String,

    /// Process-wide fallback keys, used when the user has none stored.
    pub gemini_api_key: Option<Secret<String>>,
    pub openrouter_api_key: Option<Secret<String>>,

    /// Injected as a leading system message when the transcript has none.
    pub system_prompt: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".into(),
            default_model: "deepseek-r1:latest".into(),
            gemini_base_url: "https://generativelanguage.googleapis.com".into(),
            openrouter_base_url: "https://openrouter.ai".into(),
            gemini_api_key: None,
            openrouter_api_key: None,
            system_prompt: None,
            request_timeout_ms: 120_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OcrConfig {
    pub binary: String,
    pub timeout_ms: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            binary: "tesseract".into(),
            timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TelemetryConfig {
    pub json_logs: bool,
    pub metrics_enabled: bool,
    /// Append audit entries to this JSON-lines file instead of memory.
    pub audit_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("WORKBENCH_ENV").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Map WORKBENCH__SERVER__PORT=3100 to server.port
            .add_source(Environment::with_prefix("WORKBENCH").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3100);
        assert_eq!(config.execution.timeout_ms, 30_000);
        assert_eq!(config.execution.max_output_bytes, 1024 * 1024);
        assert_eq!(config.providers.default_model, "deepseek-r1:latest");
        assert!(config.providers.gemini_api_key.is_none());
    }

    #[test]
    fn test_partial_source_keeps_defaults() {
        let config: AppConfig = Config::builder()
            .add_source(config::File::from_str(
                "[server]\nport = 4000\n[providers]\ngemini_api_key = \"k\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.providers.gemini_api_key.is_some());
        assert_eq!(config.ocr.binary, "tesseract");
    }

    #[test]
    fn test_users_section() {
        let config: AppConfig = Config::builder()
            .add_source(config::File::from_str(
                "[[users]]\nid = \"u1\"\nemail = \"u1@example.com\"\n\n[users.preferences]\ngemini_api_key = \"g\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.users.len(), 1);
        assert_eq!(config.users[0].email, "u1@example.com");
        assert!(config.users[0].api_key(crate::ProviderKind::Gemini).is_some());
    }
}
