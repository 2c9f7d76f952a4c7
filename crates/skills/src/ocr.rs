//! OCR tool backed by the `tesseract` binary.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use workbench_core::{config::OcrConfig, traits::Tool, types::ExecutionContext, Error, Result};
use workbench_sandbox::{CommandForm, CommandRunner, FileManager};

#[derive(Debug, Deserialize, JsonSchema)]
struct OcrArgs {
    /// Image file, relative to the workspace root.
    file: String,
}

/// Extracts text from an image and writes it as a `.txt` file next to the source.
pub struct TesseractOcrTool {
    runner: CommandRunner,
    binary: String,
    timeout: Duration,
}

impl TesseractOcrTool {
    pub fn new(runner: CommandRunner, config: &OcrConfig) -> Self {
        Self {
            runner,
            binary: config.binary.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

#[async_trait]
impl Tool for TesseractOcrTool {
    fn name(&self) -> &str {
        "tesseract_ocr"
    }

    fn description(&self) -> &str {
        "Extract text from an image using Tesseract OCR. Writes the result as a .txt file next to the original."
    }

    fn input_schema(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(OcrArgs)).unwrap_or_else(|_| json!({}))
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["outputFile", "text"],
            "properties": {
                "outputFile": { "type": "string" },
                "text": { "type": "string" }
            }
        })
    }

    fn tags(&self) -> BTreeSet<String> {
        ["ocr", "image", "tesseract"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    async fn execute(&self, args: Value, ctx: &ExecutionContext) -> Result<Value> {
        let args: OcrArgs = serde_json::from_value(args)
            .map_err(|e| Error::validation(format!("invalid OCR arguments: {}", e)))?;

        let root = &ctx.workspace_root;
        let input = root.resolve(&args.file)?;
        FileManager::new(root.clone()).confine(&input).await?;

        match tokio::fs::metadata(&input).await {
            Ok(md) if md.is_file() => {}
            Ok(_) => return Err(Error::validation(format!("'{}' is not a file", args.file))),
            Err(_) => return Err(Error::not_found(format!("'{}'", args.file))),
        }

        // tesseract appends ".txt" to the output base it is given.
        let base = input.with_extension("");
        let mut output: OsString = base.clone().into_os_string();
        output.push(".txt");
        let output = PathBuf::from(output);

        let form = CommandForm::Program {
            program: self.binary.clone(),
            args: vec![
                input.to_string_lossy().into_owned(),
                base.to_string_lossy().into_owned(),
            ],
        };
        let opts = self
            .runner
            .options()
            .in_dir(root.path())
            .with_timeout(self.timeout);
        self.runner.run(form, &opts).await?;

        let text = tokio::fs::read_to_string(&output)
            .await
            .map_err(|_| Error::execution("OCR did not produce an output file"))?;

        let output_file = root.relative(&output);
        tracing::debug!(input = %args.file, output = %output_file, "OCR finished");

        Ok(json!({ "outputFile": output_file, "text": text }))
    }
}
