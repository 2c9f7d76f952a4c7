//! Directory-tree introspection tools.
//!
//! Three fidelity levels share one native walk. The output mirrors the JSON
//! shape of `tree -J`: a directory node followed by a report node.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::fs::{self, Metadata};
use std::io;
use std::path::Path;

use workbench_core::{traits::Tool, types::ExecutionContext, Error, Result};
use workbench_sandbox::FileManager;

const DEFAULT_DEPTH: u8 = 1;
const MAX_DEPTH: u8 = 8;

/// How much metadata each node carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeDetail {
    /// Names and types.
    Simple,
    /// Adds size and permissions.
    Extended,
    /// Adds modification time, directory disk usage and directories-first ordering.
    Full,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct TreeArgs {
    /// Directory to list, relative to the workspace root.
    dir: String,
    /// Levels to descend (default 1).
    #[schemars(range(min = 1, max = 8))]
    depth: Option<u8>,
}

#[derive(Default)]
struct Report {
    directories: u64,
    files: u64,
}

/// Lists a workspace directory as a tree.
pub struct TreeTool {
    detail: TreeDetail,
}

impl TreeTool {
    pub fn new(detail: TreeDetail) -> Self {
        Self { detail }
    }

    /// All three fidelity levels.
    pub fn all() -> Vec<Self> {
        vec![
            Self::new(TreeDetail::Simple),
            Self::new(TreeDetail::Extended),
            Self::new(TreeDetail::Full),
        ]
    }
}

#[async_trait]
impl Tool for TreeTool {
    fn name(&self) -> &str {
        match self.detail {
            TreeDetail::Simple => "tree_simple",
            TreeDetail::Extended => "tree_extended",
            TreeDetail::Full => "tree_full",
        }
    }

    fn description(&self) -> &str {
        match self.detail {
            TreeDetail::Simple => "List files and directories (simple mode: name and type only).",
            TreeDetail::Extended => {
                "List files and directories (extended mode: names, types, sizes, permissions)."
            }
            TreeDetail::Full => {
                "List files and directories (full mode: all metadata, directory disk usage, directories first)."
            }
        }
    }

    fn input_schema(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(TreeArgs)).unwrap_or_else(|_| json!({}))
    }

    fn output_schema(&self) -> Value {
        let mut node = json!({
            "type": "object",
            "required": ["type"],
            "properties": {
                "type": { "type": "string" },
                "name": { "type": "string" },
                "contents": { "type": "array" }
            }
        });
        if self.detail != TreeDetail::Simple {
            node["properties"]["size"] = json!({ "type": "integer", "minimum": 0 });
            node["properties"]["mode"] = json!({ "type": "string" });
            node["properties"]["prot"] = json!({ "type": "string" });
        }
        if self.detail == TreeDetail::Full {
            node["properties"]["time"] = json!({ "type": "string" });
        }

        json!({
            "type": "object",
            "required": ["tree"],
            "properties": {
                "tree": { "type": "array", "items": node }
            }
        })
    }

    fn tags(&self) -> BTreeSet<String> {
        ["filesystem", "tree"].into_iter().map(String::from).collect()
    }

    async fn execute(&self, args: Value, ctx: &ExecutionContext) -> Result<Value> {
        let args: TreeArgs = serde_json::from_value(args)
            .map_err(|e| Error::validation(format!("invalid tree arguments: {}", e)))?;
        let depth = args.depth.unwrap_or(DEFAULT_DEPTH).clamp(1, MAX_DEPTH);

        let root = &ctx.workspace_root;
        let dir = root.resolve_dir(&args.dir)?;
        FileManager::new(root.clone()).confine(&dir).await?;

        let display = root.relative(&dir);
        let detail = self.detail;

        let tree = tokio::task::spawn_blocking(move || -> Result<Value> {
            let md = fs::metadata(&dir).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => Error::not_found(format!("directory '{}'", display)),
                _ => Error::Io(e),
            })?;
            if !md.is_dir() {
                return Err(Error::validation(format!("'{}' is not a directory", display)));
            }

            let mut report = Report::default();
            let mut node = describe(&dir, &md, "directory", display, detail)?;
            node.insert(
                "contents".into(),
                Value::Array(walk(&dir, 1, depth, detail, &mut report)?),
            );

            let mut summary = Map::new();
            summary.insert("type".into(), json!("report"));
            if detail == TreeDetail::Full {
                summary.insert("size".into(), node.get("size").cloned().unwrap_or(json!(0)));
            }
            summary.insert("directories".into(), json!(report.directories));
            summary.insert("files".into(), json!(report.files));

            Ok(json!([Value::Object(node), Value::Object(summary)]))
        })
        .await
        .map_err(|e| Error::internal(format!("tree walk panicked: {}", e)))??;

        Ok(json!({ "tree": tree }))
    }
}

/// List `dir`'s children, descending while `level < depth`. Symlinks are never followed.
fn walk(dir: &Path, level: u8, depth: u8, detail: TreeDetail, report: &mut Report) -> Result<Vec<Value>> {
    let mut children = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let md = match fs::symlink_metadata(entry.path()) {
            Ok(md) => md,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        children.push((entry.file_name().to_string_lossy().into_owned(), entry.path(), md));
    }

    children.sort_by(|a, b| a.0.cmp(&b.0));
    if detail == TreeDetail::Full {
        children.sort_by_key(|(_, _, md)| !md.is_dir());
    }

    let mut nodes = Vec::with_capacity(children.len());
    for (name, path, md) in children {
        let kind = if md.file_type().is_symlink() {
            "link"
        } else if md.is_dir() {
            "directory"
        } else {
            "file"
        };

        let mut node = describe(&path, &md, kind, name, detail)?;
        if kind == "directory" {
            report.directories += 1;
            if level < depth {
                node.insert(
                    "contents".into(),
                    Value::Array(walk(&path, level + 1, depth, detail, report)?),
                );
            }
        } else {
            report.files += 1;
        }
        nodes.push(Value::Object(node));
    }
    Ok(nodes)
}

fn describe(path: &Path, md: &Metadata, kind: &str, name: String, detail: TreeDetail) -> Result<Map<String, Value>> {
    let mut node = Map::new();
    node.insert("type".into(), json!(kind));
    node.insert("name".into(), json!(name));

    if detail == TreeDetail::Simple {
        return Ok(node);
    }

    let size = if detail == TreeDetail::Full && md.is_dir() {
        disk_usage(path)?
    } else {
        md.len()
    };
    node.insert("size".into(), json!(size));

    if let Some((mode, prot)) = permissions(md) {
        node.insert("mode".into(), json!(mode));
        node.insert("prot".into(), json!(prot));
    }

    if detail == TreeDetail::Full {
        if let Ok(modified) = md.modified() {
            node.insert("time".into(), json!(DateTime::<Utc>::from(modified).to_rfc3339()));
        }
    }
    Ok(node)
}

/// Recursive total of entry sizes below and including `dir`.
fn disk_usage(dir: &Path) -> Result<u64> {
    let mut total = fs::symlink_metadata(dir)?.len();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let md = match fs::symlink_metadata(entry.path()) {
            Ok(md) => md,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        total += if md.is_dir() {
            disk_usage(&entry.path())?
        } else {
            md.len()
        };
    }
    Ok(total)
}

#[cfg(unix)]
fn permissions(md: &Metadata) -> Option<(String, String)> {
    use std::os::unix::fs::PermissionsExt;

    let mode = md.permissions().mode();
    let type_char = if md.file_type().is_symlink() {
        'l'
    } else if md.is_dir() {
        'd'
    } else {
        '-'
    };

    let mut prot = String::with_capacity(10);
    prot.push(type_char);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        prot.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        prot.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        prot.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }

    Some((format!("{:04o}", mode & 0o7777), prot))
}

#[cfg(not(unix))]
fn permissions(_md: &Metadata) -> Option<(String, String)> {
    None
}
