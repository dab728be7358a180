use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    ExecRequest, ExecResult, FileInfo, PreviewLink, SessionCommand, SessionExecuteRequest,
    SessionExecuteResponse,
};

/// Capability interface over a remote dev container.
///
/// Implementations provision the underlying container lazily: constructing a
/// backend never talks to the network, the first operation does. Relative
/// paths are resolved against [`Sandbox::home_dir`].
#[async_trait]
pub trait Sandbox: Send + Sync {
    // -- identity --
    /// Human-readable backend name (e.g. "direct", "proxy").
    fn backend(&self) -> &str;
    /// Remote working directory all sessions start in.
    async fn home_dir(&self) -> Result<String>;

    // -- sessions --
    async fn create_session(&self, session_id: &str) -> Result<()>;
    /// Deleting a session terminates anything still running in it.
    async fn delete_session(&self, session_id: &str) -> Result<()>;
    async fn execute_session_command(
        &self,
        session_id: &str,
        request: &SessionExecuteRequest,
    ) -> Result<SessionExecuteResponse>;
    async fn get_session_command(&self, session_id: &str, cmd_id: &str) -> Result<SessionCommand>;
    /// Cumulative logs of a session command (not incremental).
    async fn get_session_command_logs(
        &self,
        session_id: &str,
        cmd_id: &str,
        timeout: Option<Duration>,
    ) -> Result<String>;

    // -- files --
    async fn file_exists(&self, path: &str) -> Result<bool>;
    async fn create_folder(&self, path: &str, mode: &str) -> Result<()>;
    async fn delete_file(&self, path: &str) -> Result<()>;
    async fn upload_file(&self, content: &[u8], path: &str, timeout: Option<Duration>)
    -> Result<()>;
    async fn download_file(&self, path: &str, timeout: Option<Duration>) -> Result<Vec<u8>>;
    async fn list_files(&self, path: &str) -> Result<Vec<FileInfo>>;
    async fn search_files(&self, path: &str, pattern: &str) -> Result<Vec<String>>;

    // -- misc --
    async fn get_preview_link(&self, port: u16) -> Result<PreviewLink>;
    /// One-shot command outside the session model.
    async fn execute_command(&self, request: &ExecRequest) -> Result<ExecResult>;
    /// Best-effort teardown. Idempotent and non-blocking: the remote request is
    /// fired in the background and never awaited.
    fn dispose(&self);
}
