//! Local mirror, remote sandbox and hybrid filesystems.

mod hybrid;
mod local;
mod remote;

pub use hybrid::HybridFs;
pub use local::LocalFs;
pub use remote::SandboxFs;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::WorkbenchResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Paths are either relative to the filesystem's root or absolute.
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn read_file(&self, path: &str) -> WorkbenchResult<Vec<u8>>;
    /// Creates missing parent directories.
    async fn write_file(&self, path: &str, content: &[u8]) -> WorkbenchResult<()>;
    async fn mkdir(&self, path: &str) -> WorkbenchResult<()>;
    async fn remove(&self, path: &str, recursive: bool) -> WorkbenchResult<()>;
    async fn read_dir(&self, path: &str) -> WorkbenchResult<Vec<DirEntry>>;
    async fn exists(&self, path: &str) -> WorkbenchResult<bool>;
}

/// Parent directory of a `/`-separated path, if it has one.
pub(crate) fn parent(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    let (dir, _) = trimmed.rsplit_once('/')?;
    (!dir.is_empty()).then_some(dir)
}
