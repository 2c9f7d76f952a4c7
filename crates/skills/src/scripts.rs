//! Script tool family.
//!
//! Discovery and registration are separate steps: [`discover_scripts`] reads
//! the scripts directory once at startup and returns tools; the caller decides
//! when to register them.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use workbench_core::{traits::Tool, types::ExecutionContext, Error, Result};
use workbench_sandbox::{CommandForm, CommandRunner};

/// Scripts backing dedicated tools rather than the generic family.
const RESERVED_SCRIPTS: &[&str] = &["tesseract_ocr.sh"];

#[derive(Debug, Deserialize, JsonSchema)]
struct ScriptArgs {
    /// Arguments passed to the script.
    #[serde(default)]
    args: Option<Vec<String>>,
}

/// A single `.sh` file exposed as a tool named after its stem.
pub struct ScriptTool {
    name: String,
    description: String,
    script: PathBuf,
    runner: CommandRunner,
}

impl ScriptTool {
    pub fn new(script: PathBuf, runner: CommandRunner) -> Result<Self> {
        let file_name = script
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Config(format!("not a script file: {}", script.display())))?;
        let name = script
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            description: format!("Run the {} shell script.", file_name),
            name,
            script,
            runner,
        })
    }

    /// Absolute path of the backing script.
    pub fn script(&self) -> &Path {
        &self.script
    }
}

#[async_trait]
impl Tool for ScriptTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(ScriptArgs)).unwrap_or_else(|_| json!({}))
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["output"],
            "properties": { "output": { "type": "string" } }
        })
    }

    fn tags(&self) -> BTreeSet<String> {
        ["script", "shell"].into_iter().map(String::from).collect()
    }

    async fn execute(&self, args: Value, ctx: &ExecutionContext) -> Result<Value> {
        let args: ScriptArgs = serde_json::from_value(args)
            .map_err(|e| Error::validation(format!("invalid script arguments: {}", e)))?;

        let form = CommandForm::Program {
            program: self.script.to_string_lossy().into_owned(),
            args: args.args.unwrap_or_default(),
        };
        let opts = self.runner.options().in_dir(ctx.workspace_root.path());
        let out = self.runner.run(form, &opts).await?;

        Ok(json!({ "output": out.stdout }))
    }
}

/// Enumerate `*.sh` files in `dir`, sorted by name.
///
/// A missing directory yields no tools.
pub fn discover_scripts(dir: &Path, runner: &CommandRunner) -> Result<Vec<ScriptTool>> {
    let dir = match std::fs::canonicalize(dir) {
        Ok(dir) => dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(dir = %dir.display(), "Scripts directory not found, no script tools");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut scripts = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy().into_owned();

        if !file_name.ends_with(".sh") || RESERVED_SCRIPTS.contains(&file_name.as_str()) {
            continue;
        }
        if !entry.file_type()?.is_file() {
            continue;
        }
        scripts.push(path);
    }
    scripts.sort();

    let tools = scripts
        .into_iter()
        .map(|path| ScriptTool::new(path, runner.clone()))
        .collect::<Result<Vec<_>>>()?;

    tracing::info!(dir = %dir.display(), count = tools.len(), "Discovered script tools");
    Ok(tools)
}
