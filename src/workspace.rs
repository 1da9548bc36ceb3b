//! Temporary workspaces for intermediate files.
//!
//! Every extraction run owns one [`Workspace`]: a randomly named directory
//! under a shared [`WorkspaceRoot`] that holds the staged upload, the
//! converted PDF and the rendered page images. Names come from
//! [`tempfile::Builder`], which creates the directory atomically with a
//! random suffix, so concurrent runs never collide and no locking is needed.
//!
//! Release is tied to ownership. [`Workspace::destroy`] consumes the handle,
//! removes the directory and logs (never returns) any failure. If the handle
//! is dropped without `destroy` (an abandoned future, a panic) the `Drop`
//! impl performs the same removal, so a workspace is removed exactly once.

use crate::error::LeaseError;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, error, warn};

/// Process-wide parent directory for workspaces.
#[derive(Debug, Clone)]
pub struct WorkspaceRoot {
    path: PathBuf,
}

impl WorkspaceRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Allocate a fresh, uniquely named workspace.
    pub fn create(&self) -> Result<Workspace, LeaseError> {
        std::fs::create_dir_all(&self.path)
            .map_err(|e| LeaseError::workspace(&self.path, e))?;

        let dir = tempfile::Builder::new()
            .prefix("ws-")
            .rand_bytes(12)
            .tempdir_in(&self.path)
            .map_err(|e| LeaseError::workspace(&self.path, e))?;

        debug!("Created workspace {}", dir.path().display());
        Ok(Workspace { dir: Some(dir) })
    }
}

/// An exclusively owned scratch directory.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        match &self.dir {
            Some(dir) => dir.path(),
            // `dir` is only taken by `destroy` and `drop`, both of which consume self.
            None => Path::new(""),
        }
    }

    /// The random token naming this workspace.
    pub fn id(&self) -> &str {
        self.path()
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// Store `bytes` as `name` inside the workspace and return its path.
    ///
    /// `name` must be a bare file name.
    pub fn write_file(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, LeaseError> {
        let path = self.file_path(name)?;
        std::fs::write(&path, bytes).map_err(|e| LeaseError::workspace(&path, e))?;
        debug!("Wrote {} bytes → {}", bytes.len(), path.display());
        Ok(path)
    }

    /// Async variant of [`write_file`](Self::write_file).
    pub async fn write_file_async(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, LeaseError> {
        let path = self.file_path(name)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| LeaseError::workspace(&path, e))?;
        debug!("Wrote {} bytes → {}", bytes.len(), path.display());
        Ok(path)
    }

    fn file_path(&self, name: &str) -> Result<PathBuf, LeaseError> {
        let plain = Path::new(name)
            .file_name()
            .is_some_and(|n| n == std::ffi::OsStr::new(name));
        if !plain {
            return Err(LeaseError::workspace(
                self.path().join(name),
                io::Error::new(io::ErrorKind::InvalidInput, "not a bare file name"),
            ));
        }
        Ok(self.path().join(name))
    }

    /// Recursively remove the workspace.
    ///
    /// Failures are logged and swallowed: cleanup must never replace the
    /// outcome of the run that owned the workspace.
    pub fn destroy(mut self) {
        if let Some(dir) = self.dir.take() {
            release(dir);
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            warn!(
                "Workspace {} released without explicit destroy",
                dir.path().display()
            );
            release(dir);
        }
    }
}

fn release(dir: TempDir) {
    let path = dir.path().to_path_buf();
    match dir.close() {
        Ok(()) => debug!("Deleted workspace {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Workspace {} was already removed", path.display())
        }
        Err(e) => error!("Failed to delete workspace {}: {}", path.display(), e),
    }
}
