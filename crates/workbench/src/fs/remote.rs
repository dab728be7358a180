use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sandbox::path::{resolve, shell_quote};
use sandbox::{ExecRequest, Sandbox};
use tokio::sync::OnceCell;
use tracing::debug;

use super::{DirEntry, FileSystem, parent};
use crate::error::{WorkbenchError, WorkbenchResult};

/// Sandbox file API as a [`FileSystem`]. Relative paths resolve against the
/// sandbox home directory.
pub struct SandboxFs {
    sandbox: Arc<dyn Sandbox>,
    home: OnceCell<String>,
    transfer_timeout: Option<Duration>,
}

impl SandboxFs {
    pub fn new(sandbox: Arc<dyn Sandbox>) -> Self {
        Self {
            sandbox,
            home: OnceCell::new(),
            transfer_timeout: None,
        }
    }

    /// Timeout passed to uploads and downloads.
    pub fn with_transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = Some(timeout);
        self
    }

    pub fn sandbox(&self) -> &Arc<dyn Sandbox> {
        &self.sandbox
    }

    pub async fn home(&self) -> WorkbenchResult<&str> {
        let home = self
            .home
            .get_or_try_init(|| self.sandbox.home_dir())
            .await?;
        Ok(home.as_str())
    }
}

#[async_trait]
impl FileSystem for SandboxFs {
    async fn read_file(&self, path: &str) -> WorkbenchResult<Vec<u8>> {
        Ok(self
            .sandbox
            .download_file(path, self.transfer_timeout)
            .await?)
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> WorkbenchResult<()> {
        if let Some(dir) = parent(path)
            && !self.sandbox.file_exists(dir).await?
        {
            self.sandbox.create_folder(dir, "755").await?;
        }
        self.sandbox
            .upload_file(content, path, self.transfer_timeout)
            .await?;
        Ok(())
    }

    async fn mkdir(&self, path: &str) -> WorkbenchResult<()> {
        Ok(self.sandbox.create_folder(path, "755").await?)
    }

    /// The file API cannot delete a non-empty directory, so recursive removal
    /// goes through the shell.
    async fn remove(&self, path: &str, recursive: bool) -> WorkbenchResult<()> {
        if !recursive {
            return Ok(self.sandbox.delete_file(path).await?);
        }
        let target = resolve(self.home().await?, path);
        let command = format!("rm -rf {}", shell_quote(&target));
        debug!(%command, "recursive remote remove");
        let result = self.sandbox.execute_command(&ExecRequest::new(&command)).await?;
        if result.exit_code != 0 {
            return Err(WorkbenchError::CommandFailed {
                command,
                exit_code: result.exit_code,
                output: result.result,
            });
        }
        Ok(())
    }

    async fn read_dir(&self, path: &str) -> WorkbenchResult<Vec<DirEntry>> {
        let files = self.sandbox.list_files(path).await?;
        Ok(files
            .into_iter()
            .map(|f| DirEntry {
                name: f.name,
                is_dir: f.is_dir,
            })
            .collect())
    }

    async fn exists(&self, path: &str) -> WorkbenchResult<bool> {
        Ok(self.sandbox.file_exists(path).await?)
    }
}
