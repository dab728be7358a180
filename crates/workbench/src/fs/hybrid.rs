use std::sync::Arc;

use async_trait::async_trait;
use sandbox::Sandbox;
use tracing::{debug, warn};

use super::{DirEntry, FileSystem, LocalFs, SandboxFs};
use crate::error::WorkbenchResult;

/// Keeps the local mirror and the sandbox filesystem in step.
///
/// Mutations go to the sandbox first, since that is where commands run, and
/// are then replicated locally. Absolute paths under the local root are
/// rewritten onto the sandbox home directory; relative paths pass through.
pub struct HybridFs {
    local: LocalFs,
    remote: SandboxFs,
    local_root: String,
}

impl HybridFs {
    pub fn new(local: LocalFs, remote: SandboxFs) -> Self {
        let local_root = local
            .root()
            .to_string_lossy()
            .trim_end_matches('/')
            .to_string();
        Self {
            local,
            remote,
            local_root,
        }
    }

    pub fn sandbox(&self) -> &Arc<dyn Sandbox> {
        self.remote.sandbox()
    }

    /// Path relative to the workspace root, when `path` is under it.
    pub fn relative<'p>(&self, path: &'p str) -> &'p str {
        match self.strip_root(path) {
            Some(rest) => rest.trim_start_matches('/'),
            None => path.trim_start_matches("./"),
        }
    }

    fn strip_root<'p>(&self, path: &'p str) -> Option<&'p str> {
        if !path.starts_with('/') || self.local_root.is_empty() {
            return None;
        }
        let rest = path.strip_prefix(self.local_root.as_str())?;
        (rest.is_empty() || rest.starts_with('/')).then_some(rest)
    }

    /// Translate a local path into its sandbox counterpart.
    pub async fn remote_path(&self, path: &str) -> WorkbenchResult<String> {
        match self.strip_root(path) {
            Some(rest) => {
                let home = self.remote.home().await?;
                Ok(format!("{}{rest}", home.trim_end_matches('/')))
            }
            None => Ok(path.to_string()),
        }
    }

    /// Copy a sandbox file into the mirror only.
    pub async fn pull(&self, path: &str) -> WorkbenchResult<Vec<u8>> {
        let content = self.remote.read_file(&self.remote_path(path).await?).await?;
        self.local.write_file(path, &content).await?;
        debug!(path, bytes = content.len(), "pulled into local mirror");
        Ok(content)
    }

    pub async fn write_file_local(&self, path: &str, content: &[u8]) -> WorkbenchResult<()> {
        self.local.write_file(path, content).await
    }

    pub async fn mkdir_local(&self, path: &str) -> WorkbenchResult<()> {
        self.local.mkdir(path).await
    }

    pub async fn remove_local(&self, path: &str, recursive: bool) -> WorkbenchResult<()> {
        self.local.remove(path, recursive).await
    }
}

#[async_trait]
impl FileSystem for HybridFs {
    /// The sandbox is authoritative: commands there may have rewritten the
    /// file since it was mirrored. The mirror is refreshed on every read.
    async fn read_file(&self, path: &str) -> WorkbenchResult<Vec<u8>> {
        let content = self.remote.read_file(&self.remote_path(path).await?).await?;
        if let Err(e) = self.local.write_file(path, &content).await {
            warn!(path, error = %e, "failed to hydrate local mirror");
        }
        Ok(content)
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> WorkbenchResult<()> {
        self.remote
            .write_file(&self.remote_path(path).await?, content)
            .await?;
        self.local.write_file(path, content).await
    }

    async fn mkdir(&self, path: &str) -> WorkbenchResult<()> {
        self.remote.mkdir(&self.remote_path(path).await?).await?;
        self.local.mkdir(path).await
    }

    async fn remove(&self, path: &str, recursive: bool) -> WorkbenchResult<()> {
        self.remote
            .remove(&self.remote_path(path).await?, recursive)
            .await?;
        match self.local.remove(path, recursive).await {
            Err(e) if e.is_not_found() => {
                debug!(path, "already absent from local mirror");
                Ok(())
            }
            other => other,
        }
    }

    async fn read_dir(&self, path: &str) -> WorkbenchResult<Vec<DirEntry>> {
        self.remote.read_dir(&self.remote_path(path).await?).await
    }

    async fn exists(&self, path: &str) -> WorkbenchResult<bool> {
        self.remote.exists(&self.remote_path(path).await?).await
    }
}
