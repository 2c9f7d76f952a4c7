//! Filesystem security policy enforcement.
//!
//! Every path a caller hands us is interpreted relative to a fixed
//! [`SandboxRoot`]. Resolution is purely lexical: the requested path is joined
//! onto the root, `.`/`..` segments are collapsed, and the result must still be
//! a descendant of the root. A rejected path never reaches the filesystem.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::{Error, Result};

/// An absolute directory beyond which no operation may read, write or list.
///
/// The root is normalized once at construction and never mutated afterwards;
/// clones share the same underlying path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxRoot {
    root: Arc<PathBuf>,
}

impl SandboxRoot {
    /// Create a sandbox root from an absolute directory path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_absolute() {
            return Err(Error::Config(format!(
                "sandbox root must be an absolute path: {}",
                path.display()
            )));
        }

        Ok(Self {
            root: Arc::new(normalize(path)),
        })
    }

    /// The normalized absolute root path.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a requested path to a strict descendant of the root.
    ///
    /// Used for anything that names an entry (create, rename, delete,
    /// download, upload targets). The root itself is rejected.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf> {
        self.resolve_inner(requested, false)
    }

    /// Resolve a requested directory, allowing the root itself.
    ///
    /// Used for listings, base paths and command working directories.
    pub fn resolve_dir(&self, requested: &str) -> Result<PathBuf> {
        self.resolve_inner(requested, true)
    }

    /// Whether an absolute path is the root or one of its descendants.
    pub fn contains(&self, path: &Path) -> bool {
        normalize(path).starts_with(self.root.as_path())
    }

    /// Render an absolute path inside the root as a root-relative string.
    ///
    /// The root itself renders as `"."`. Paths outside the root fall back to
    /// their file name so host layout is never leaked.
    pub fn relative(&self, path: &Path) -> String {
        match path.strip_prefix(self.root.as_path()) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    fn resolve_inner(&self, requested: &str, allow_root: bool) -> Result<PathBuf> {
        if requested.contains('\0') {
            return Err(Error::validation("path contains a NUL byte"));
        }

        // Drive-rooted paths (`C:\`, `C:/`, `C:`) are refused on any OS. A bare
        // drive prefix such as `a:notes.txt` is only special on Windows.
        let bytes = requested.as_bytes();
        let drive = bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic();
        let drive_rooted = drive && matches!(bytes.get(2), None | Some(b'/') | Some(b'\\'));
        if drive_rooted || (cfg!(windows) && drive) {
            return Err(Error::access_denied(format!(
                "path '{}' is outside the sandbox root",
                requested
            )));
        }

        // A single leading separator means "relative to the root", not host-absolute.
        let relative = requested
            .strip_prefix('/')
            .or_else(|| requested.strip_prefix('\\'))
            .unwrap_or(requested);

        let resolved = normalize(&self.root.join(relative));
        let root = self.root.as_path();

        let accepted = if resolved == root {
            allow_root
        } else {
            resolved.starts_with(root)
        };

        if !accepted {
            tracing::warn!(requested = %requested, "Rejected path outside sandbox root");
            return Err(Error::access_denied(format!(
                "path '{}' is outside the sandbox root",
                requested
            )));
        }

        Ok(resolved)
    }
}

/// Require that `name` is exactly one normal path component.
///
/// Create, rename, delete and upload operate on a single entry at a time;
/// separators, `.` and `..` are refused.
pub fn validate_entry_name(name: &str) -> Result<&str> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None)
            if !name.contains('/') && !name.contains('\\') && !name.contains('\0') =>
        {
            Ok(name)
        }
        _ => Err(Error::validation(format!(
            "'{}' is not a single file or folder name",
            name
        ))),
    }
}

/// Lexically normalize a path, collapsing `.` and `..` without touching disk.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => normalized.push(p.as_os_str()),
            Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(c) => normalized.push(c),
        }
    }
    normalized
}
