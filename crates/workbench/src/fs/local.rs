use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{DirEntry, FileSystem};
use crate::error::{WorkbenchError, WorkbenchResult};

/// Local mirror rooted at the workbench working directory.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

fn io_error(path: &Path, e: std::io::Error) -> WorkbenchError {
    if e.kind() == ErrorKind::NotFound {
        WorkbenchError::NotFound(path.display().to_string())
    } else {
        WorkbenchError::Io(e)
    }
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[async_trait]
impl FileSystem for LocalFs {
    async fn read_file(&self, path: &str) -> WorkbenchResult<Vec<u8>> {
        let full = self.resolve(path);
        tokio::fs::read(&full).await.map_err(|e| io_error(&full, e))
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> WorkbenchResult<()> {
        let full = self.resolve(path);
        if let Some(dir) = full.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| io_error(&full, e))
    }

    async fn mkdir(&self, path: &str) -> WorkbenchResult<()> {
        tokio::fs::create_dir_all(self.resolve(path)).await?;
        Ok(())
    }

    async fn remove(&self, path: &str, recursive: bool) -> WorkbenchResult<()> {
        let full = self.resolve(path);
        let meta = tokio::fs::metadata(&full)
            .await
            .map_err(|e| io_error(&full, e))?;
        let result = match (meta.is_dir(), recursive) {
            (true, true) => tokio::fs::remove_dir_all(&full).await,
            (true, false) => tokio::fs::remove_dir(&full).await,
            (false, _) => tokio::fs::remove_file(&full).await,
        };
        result.map_err(|e| io_error(&full, e))
    }

    async fn read_dir(&self, path: &str) -> WorkbenchResult<Vec<DirEntry>> {
        let full = self.resolve(path);
        let mut dir = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| io_error(&full, e))?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: entry.file_type().await?.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn exists(&self, path: &str) -> WorkbenchResult<bool> {
        Ok(tokio::fs::try_exists(self.resolve(path)).await?)
    }
}
