//! Per-root file management.
//!
//! [`FileManager`] owns one [`SandboxRoot`] and routes every list, create,
//! rename, delete, download and upload through it. Lexical resolution happens
//! first; existing paths are then canonicalized so a symlink cannot lead out
//! of the root.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use workbench_core::{validate_entry_name, Error, Result, SandboxRoot};

// =============================================================================
// Listing Types
// =============================================================================

/// Entry type in a directory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: EntryKind,

    /// Size in bytes, files only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// RFC 3339 modification time, files only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

// =============================================================================
// File Manager
// =============================================================================

/// Filesystem operations confined to a single sandbox root.
///
/// Operations are not transactional: a concurrent rename and delete of the
/// same entry resolves to whichever OS call lands last.
#[derive(Debug, Clone)]
pub struct FileManager {
    root: SandboxRoot,
}

impl FileManager {
    pub fn new(root: SandboxRoot) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &SandboxRoot {
        &self.root
    }

    /// List a directory, sorted by name.
    pub async fn list(&self, path: &str) -> Result<Vec<FileEntry>> {
        let dir = self.root.resolve_dir(path)?;
        self.confine(&dir).await?;

        let md = fs::metadata(&dir).await.map_err(|e| map_io(e, path))?;
        if !md.is_dir() {
            return Err(Error::validation(format!("'{}' is not a directory", path)));
        }

        let mut entries = Vec::new();
        let mut rd = fs::read_dir(&dir).await?;
        while let Some(entry) = rd.next_entry().await? {
            let md = match entry.metadata().await {
                Ok(md) => md,
                // Vanished between readdir and stat.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let name = entry.file_name().to_string_lossy().into_owned();

            if md.is_dir() {
                entries.push(FileEntry {
                    name,
                    kind: EntryKind::Directory,
                    size: None,
                    last_modified: None,
                });
            } else {
                entries.push(FileEntry {
                    name,
                    kind: EntryKind::File,
                    size: Some(md.len()),
                    last_modified: md
                        .modified()
                        .ok()
                        .map(|t| DateTime::<Utc>::from(t).to_rfc3339()),
                });
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Create a single folder `name` inside `path`.
    pub async fn create_folder(&self, path: &str, name: &str) -> Result<()> {
        let target = self.entry(path, name)?;
        self.confine(&target).await?;

        fs::create_dir(&target).await.map_err(|e| map_io(e, name))?;
        tracing::debug!(path = %self.root.relative(&target), "Created folder");
        Ok(())
    }

    /// Rename `old_name` to `new_name` inside `path`.
    ///
    /// Fails with `AlreadyExists` when the destination exists; never overwrites.
    pub async fn rename(&self, path: &str, old_name: &str, new_name: &str) -> Result<()> {
        let from = self.entry(path, old_name)?;
        let to = self.entry(path, new_name)?;
        self.confine(&from).await?;
        self.confine(&to).await?;

        fs::symlink_metadata(&from)
            .await
            .map_err(|e| map_io(e, old_name))?;
        if fs::symlink_metadata(&to).await.is_ok() {
            return Err(Error::already_exists(format!("'{}'", new_name)));
        }

        fs::rename(&from, &to).await.map_err(|e| map_io(e, old_name))?;
        tracing::debug!(from = %old_name, to = %new_name, "Renamed entry");
        Ok(())
    }

    /// Delete `name` inside `path`; directories are removed recursively.
    pub async fn delete(&self, path: &str, name: &str) -> Result<()> {
        let target = self.entry(path, name)?;
        self.confine(&target).await?;

        let md = fs::symlink_metadata(&target)
            .await
            .map_err(|e| map_io(e, name))?;
        let removed = if md.is_dir() {
            fs::remove_dir_all(&target).await
        } else {
            fs::remove_file(&target).await
        };
        removed.map_err(|e| map_io(e, name))?;

        tracing::debug!(path = %self.root.relative(&target), "Deleted entry");
        Ok(())
    }

    /// Read the raw bytes of a regular file.
    pub async fn download(&self, path: &str, name: &str) -> Result<Vec<u8>> {
        let target = self.entry(path, name)?;
        self.confine(&target).await?;

        let md = fs::metadata(&target).await.map_err(|e| map_io(e, name))?;
        if md.is_dir() {
            return Err(Error::validation(format!("'{}' is a directory", name)));
        }
        Ok(fs::read(&target).await?)
    }

    /// Write an uploaded file into `destination`, refusing to replace an
    /// existing entry. Returns the root-relative path of the new file.
    pub async fn upload(&self, destination: &str, file_name: &str, data: Vec<u8>) -> Result<String> {
        let dir = self.root.resolve_dir(destination)?;
        self.confine(&dir).await?;
        let target = self.entry(destination, file_name)?;

        let md = fs::metadata(&dir)
            .await
            .map_err(|e| map_io(e, destination))?;
        if !md.is_dir() {
            return Err(Error::validation(format!(
                "'{}' is not a directory",
                destination
            )));
        }

        let dest = target.clone();
        let name = file_name.to_string();
        tokio::task::spawn_blocking(move || {
            use std::io::Write;

            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&data)?;
            tmp.flush()?;
            tmp.persist_noclobber(&dest).map_err(|e| map_io(e.error, &name))?;
            Ok::<_, Error>(())
        })
        .await
        .map_err(|e| Error::internal(format!("upload writer panicked: {}", e)))??;

        let relative = self.root.relative(&target);
        tracing::debug!(path = %relative, "Stored upload");
        Ok(relative)
    }

    /// Resolve a single entry name inside a base path.
    fn entry(&self, path: &str, name: &str) -> Result<PathBuf> {
        let name = validate_entry_name(name)?;
        let base = path.trim_end_matches(['/', '\\']);
        if base.is_empty() || base == "." {
            self.root.resolve(name)
        } else {
            self.root.resolve(&format!("{}/{}", base, name))
        }
    }

    /// Reject paths whose nearest existing ancestor canonicalizes outside the root.
    ///
    /// `path` must already have been resolved against the root.
    pub async fn confine(&self, path: &Path) -> Result<()> {
        let root = fs::canonicalize(self.root.path())
            .await
            .map_err(|e| map_io(e, "workspace root"))?;

        let mut next = Some(path);
        while let Some(candidate) = next {
            match fs::canonicalize(candidate).await {
                Ok(real) if real.starts_with(&root) => return Ok(()),
                Ok(_) => {
                    tracing::warn!(
                        path = %self.root.relative(path),
                        "Rejected path resolving outside sandbox root"
                    );
                    return Err(Error::access_denied(format!(
                        "'{}' resolves outside the sandbox root",
                        self.root.relative(path)
                    )));
                }
                Err(_) => next = candidate.parent(),
            }
        }

        Err(Error::access_denied("path has no ancestor inside the sandbox root"))
    }
}

fn map_io(err: io::Error, what: &str) -> Error {
    match err.kind() {
        io::ErrorKind::NotFound => Error::not_found(format!("'{}'", what)),
        io::ErrorKind::AlreadyExists => Error::already_exists(format!("'{}'", what)),
        _ => Error::Io(err),
    }
}

// =============================================================================
// Workspace Layout
// =============================================================================

/// Maps authenticated users to their home sandbox roots.
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    base: PathBuf,
}

impl WorkspaceLayout {
    /// Create a layout rooted at `base`, made absolute against the current directory.
    pub fn new(base: impl Into<PathBuf>) -> Result<Self> {
        let base = base.into();
        let base = if base.is_absolute() {
            base
        } else {
            std::env::current_dir()?.join(base)
        };
        Ok(Self { base })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// `<base>/<sanitised email>/home`, created on first use.
    pub async fn home_for(&self, email: &str) -> Result<SandboxRoot> {
        let dir = self.base.join(sanitize_segment(email)).join("home");
        fs::create_dir_all(&dir).await?;
        SandboxRoot::new(dir)
    }
}

/// Replace characters outside `[A-Za-z0-9@.-]` with `_`.
fn sanitize_segment(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '@' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    // "", "." and ".." are not usable directory names.
    if cleaned.chars().all(|c| c == '.') {
        cleaned.replace('.', "_") + "_"
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (tempfile::TempDir, FileManager) {
        let dir = tempfile::tempdir().unwrap();
        let root = SandboxRoot::new(dir.path()).unwrap();
        (dir, FileManager::new(root))
    }

    #[tokio::test]
    async fn test_create_list_delete_round_trip() {
        let (_dir, files) = manager();

        files.create_folder(".", "x").await.unwrap();
        let listing = files.list(".").await.unwrap();
        assert!(listing
            .iter()
            .any(|e| e.name == "x" && e.kind == EntryKind::Directory && e.size.is_none()));

        files.delete(".", "x").await.unwrap();
        assert!(files.list(".").await.unwrap().iter().all(|e| e.name != "x"));
    }

    #[tokio::test]
    async fn test_listing_metadata_and_order() {
        let (dir, files) = manager();
        std::fs::write(dir.path().join("b.txt"), "hello").unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();

        let listing = files.list("/").await.unwrap();
        assert_eq!(listing[0].name, "a");
        assert_eq!(listing[1].name, "b.txt");
        assert_eq!(listing[1].size, Some(5));
        assert!(listing[1].last_modified.is_some());

        let json = serde_json::to_value(&listing[1]).unwrap();
        assert_eq!(json["type"], "file");
        assert!(json["lastModified"].is_string());
    }

    #[tokio::test]
    async fn test_rename_refuses_overwrite() {
        let (dir, files) = manager();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();

        let err = files.rename(".", "a.txt", "b.txt").await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert_eq!(std::fs::read_to_string(dir.path().join("b.txt")).unwrap(), "b");

        files.rename(".", "a.txt", "c.txt").await.unwrap();
        assert!(dir.path().join("c.txt").exists());
    }

    #[tokio::test]
    async fn test_delete_directory_recursively() {
        let (dir, files) = manager();
        std::fs::create_dir_all(dir.path().join("d/e/f")).unwrap();
        std::fs::write(dir.path().join("d/e/f/g.txt"), "g").unwrap();

        files.delete("", "d").await.unwrap();
        assert!(!dir.path().join("d").exists());
    }

    #[tokio::test]
    async fn test_traversal_rejected_without_side_effects() {
        let (_dir, files) = manager();
        assert!(matches!(
            files.list("../..").await.unwrap_err(),
            Error::AccessDenied(_)
        ));
        assert!(matches!(
            files.create_folder("..", "escape").await.unwrap_err(),
            Error::AccessDenied(_)
        ));
        assert!(matches!(
            files.delete(".", "..").await.unwrap_err(),
            Error::Validation(_)
        ));
        assert!(matches!(
            files.download(".", "../secret").await.unwrap_err(),
            Error::Validation(_)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_rejected() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "s").unwrap();

        let (dir, files) = manager();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        assert!(matches!(
            files.list("link").await.unwrap_err(),
            Error::AccessDenied(_)
        ));
        assert!(matches!(
            files.download("link", "secret.txt").await.unwrap_err(),
            Error::AccessDenied(_)
        ));
    }

    #[tokio::test]
    async fn test_download_and_upload() {
        let (_dir, files) = manager();
        files.create_folder(".", "docs").await.unwrap();

        let rel = files
            .upload("docs", "note.txt", b"content".to_vec())
            .await
            .unwrap();
        assert_eq!(rel, "docs/note.txt");
        assert_eq!(files.download("docs", "note.txt").await.unwrap(), b"content");

        let err = files
            .upload("docs", "note.txt", b"other".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert_eq!(files.download("docs", "note.txt").await.unwrap(), b"content");

        assert!(matches!(
            files.download(".", "docs").await.unwrap_err(),
            Error::Validation(_)
        ));
        assert!(matches!(
            files.download(".", "missing").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_home_for_sanitizes_email() {
        let base = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::new(base.path()).unwrap();

        let root = layout.home_for("a.b+c@example.com").await.unwrap();
        assert_eq!(root.path(), base.path().join("a.b_c@example.com/home"));
        assert!(root.path().is_dir());

        let root = layout.home_for("..").await.unwrap();
        assert!(root.path().starts_with(base.path()));
    }
}
