/// Per-request scratch directories.
///
/// Every judging request gets a fresh directory under a shared root. The
/// handle removes it on `release()` and again from `Drop`, so panics during
/// compilation or execution cannot leak a workspace.
use crate::config::types::{JudgeError, Result};
use chrono::Utc;
use std::fs::{self, DirBuilder, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

const CREATE_ATTEMPTS: usize = 8;

fn workspace_error(action: &str, path: &Path, err: impl std::fmt::Display) -> JudgeError {
    JudgeError::Workspace(format!("{} {}: {}", action, path.display(), err))
}

/// Hands out workspaces under one root directory.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    /// Create the root if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(&root)
            .map_err(|e| workspace_error("failed to create workspace root", &root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate a fresh, uniquely named directory.
    pub fn acquire(&self) -> Result<WorkspaceHandle> {
        let mut last_err = None;
        for _ in 0..CREATE_ATTEMPTS {
            let id = format!(
                "{}-{}",
                Utc::now().format("%Y%m%dT%H%M%S%.3fZ"),
                Uuid::new_v4().simple()
            );
            let path = self.root.join(&id);
            match DirBuilder::new().mode(0o700).create(&path) {
                Ok(()) => {
                    log::debug!("Acquired workspace {}", path.display());
                    return Ok(WorkspaceHandle {
                        id,
                        root: self.root.clone(),
                        path,
                        artifact_extensions: Vec::new(),
                        released: false,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => last_err = Some(e),
                Err(e) => return Err(workspace_error("failed to create workspace", &path, e)),
            }
        }
        Err(JudgeError::Workspace(format!(
            "no unique workspace name under {} after {} attempts: {}",
            self.root.display(),
            CREATE_ATTEMPTS,
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Remove workspaces older than `max_age` left behind by a crashed process.
    pub fn sweep_stale(&self, max_age: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let entries = fs::read_dir(&self.root)
            .map_err(|e| workspace_error("failed to read workspace root", &self.root, e))?;

        let mut removed = 0;
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Failed to read directory entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            // symlink_metadata: never follow a link out of the root
            let metadata = match fs::symlink_metadata(&path) {
                Ok(m) if m.is_dir() => m,
                Ok(_) => continue,
                Err(e) => {
                    log::warn!("Failed to get metadata for {}: {}", path.display(), e);
                    continue;
                }
            };
            let age = match metadata.modified().map(|m| now.duration_since(m)) {
                Ok(Ok(age)) => age,
                _ => continue,
            };
            if age <= max_age {
                continue;
            }
            match remove_tree(&path) {
                Ok(()) => {
                    log::info!("Removed stale workspace: {}", path.display());
                    removed += 1;
                }
                Err(e) => log::warn!("Failed to remove stale workspace {}: {}", path.display(), e),
            }
        }
        Ok(removed)
    }
}

/// Exclusive owner of one workspace directory.
#[derive(Debug)]
pub struct WorkspaceHandle {
    id: String,
    root: PathBuf,
    path: PathBuf,
    artifact_extensions: Vec<String>,
    released: bool,
}

impl WorkspaceHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Write `content` to a new file directly inside the workspace.
    pub fn write_source(&self, file_name: &str, content: &str) -> Result<PathBuf> {
        if file_name.is_empty() || file_name.contains('/') || file_name == "." || file_name == ".."
        {
            return Err(JudgeError::Workspace(format!(
                "invalid source file name '{}'",
                file_name
            )));
        }
        let path = self.path.join(file_name);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&path)
            .map_err(|e| workspace_error("failed to create source file", &path, e))?;
        file.write_all(content.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|e| workspace_error("failed to write source file", &path, e))?;
        Ok(path)
    }

    /// Compiler outputs with these extensions are deleted first on release.
    pub fn register_artifact_extensions<I, S>(&mut self, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.artifact_extensions
            .extend(extensions.into_iter().map(Into::into));
    }

    /// Remove the workspace and everything in it. Idempotent.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let metadata = match fs::symlink_metadata(&self.path) {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(workspace_error("failed to stat workspace", &self.path, e)),
        };
        if !metadata.is_dir() || self.path.parent() != Some(self.root.as_path()) {
            return Err(JudgeError::Workspace(format!(
                "refusing to remove {}: not a workspace directory under {}",
                self.path.display(),
                self.root.display()
            )));
        }

        if !self.artifact_extensions.is_empty() {
            remove_artifacts(&self.path, &self.artifact_extensions);
        }

        match remove_tree(&self.path) {
            Ok(()) => {
                log::debug!("Released workspace {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(workspace_error("failed to remove workspace", &self.path, e)),
        }
    }
}

impl Drop for WorkspaceHandle {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("Workspace cleanup on drop failed: {}", e);
        }
    }
}

/// Remove a directory tree the submission may have locked down with chmod.
/// Owner permissions are restored and the removal retried once.
fn remove_tree(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            log::debug!("Restoring permissions under {} before removal", path.display());
            restore_owner_permissions(path);
            fs::remove_dir_all(path)
        }
        other => other,
    }
}

/// Give the owner rwx on every directory in the tree. Symlinks are never
/// followed; a directory is unlocked before it is listed.
fn restore_owner_permissions(dir: &Path) {
    let Ok(metadata) = fs::symlink_metadata(dir) else {
        return;
    };
    if !metadata.is_dir() {
        return;
    }
    let mode = metadata.permissions().mode();
    if mode & 0o700 != 0o700 {
        if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(mode | 0o700)) {
            log::warn!("Failed to unlock {}: {}", dir.display(), e);
            return;
        }
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            restore_owner_permissions(&entry.path());
        }
    }
}

fn remove_artifacts(dir: &Path, extensions: &[String]) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Failed to list {}: {}", dir.display(), e);
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            remove_artifacts(&path, extensions);
        } else if file_type.is_file() {
            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| extensions.iter().any(|wanted| wanted == ext))
                .unwrap_or(false);
            if matches {
                if let Err(e) = fs::remove_file(&path) {
                    log::warn!("Failed to remove artifact {}: {}", path.display(), e);
                }
            }
        }
    }
}
