//! Scripted in-memory sandbox for tests.
//!
//! Every session command is answered by a [`ScriptedRun`]: each log fetch
//! reveals one more chunk, and the exit code becomes visible once at most one
//! chunk is left, so the last chunk arrives on the same poll as the exit code.
//! A run without an exit code keeps "running" until its session is deleted,
//! which is how a dev server behaves.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, SandboxError};
use crate::path;
use crate::sandbox::Sandbox;
use crate::types::{
    ExecRequest, ExecResult, FileInfo, PreviewLink, SessionCommand, SessionExecuteRequest,
    SessionExecuteResponse,
};

pub const MEMORY_HOME: &str = "/home/daytona";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptedRun {
    pub chunks: Vec<String>,
    pub exit_code: Option<i32>,
}

impl ScriptedRun {
    pub fn exits(code: i32, chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            exit_code: Some(code),
        }
    }

    pub fn runs_forever(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            exit_code: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SandboxEvent {
    CreateSession(String),
    DeleteSession(String),
    SessionCommand { session_id: String, command: String },
    Exec(String),
    Upload(String),
    DeleteFile(String),
    CreateFolder(String),
    Dispose,
}

type Script = Box<dyn Fn(&str) -> ScriptedRun + Send + Sync>;

struct RunningCommand {
    run: ScriptedRun,
    revealed: usize,
}

#[derive(Default)]
struct State {
    sessions: HashMap<String, HashMap<String, RunningCommand>>,
    max_open: usize,
    files: BTreeMap<String, Vec<u8>>,
    folders: BTreeSet<String>,
    events: Vec<SandboxEvent>,
    next_cmd: u64,
    fail_logs: bool,
}

pub struct MemorySandbox {
    script: Script,
    state: Mutex<State>,
    disposed: AtomicBool,
}

impl Default for MemorySandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySandbox {
    /// Every command exits 0 immediately without output.
    pub fn new() -> Self {
        Self::with_script(|_| ScriptedRun::exits(0, &[]))
    }

    pub fn with_script(script: impl Fn(&str) -> ScriptedRun + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            state: Mutex::new(State::default()),
            disposed: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every subsequent log fetch fail with a transport error.
    pub fn fail_polling(&self) {
        self.lock().fail_logs = true;
    }

    pub fn put_file(&self, path: &str, content: impl Into<Vec<u8>>) {
        let resolved = path::resolve(MEMORY_HOME, path);
        self.lock().files.insert(resolved, content.into());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(&path::resolve(MEMORY_HOME, path)).cloned()
    }

    pub fn file_text(&self, path: &str) -> Option<String> {
        self.file(path).map(|b| String::from_utf8_lossy(&b).into_owned())
    }

    pub fn events(&self) -> Vec<SandboxEvent> {
        self.lock().events.clone()
    }

    pub fn open_sessions(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Highest number of sessions that were open at the same time.
    pub fn max_open_sessions(&self) -> usize {
        self.lock().max_open
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn check_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(SandboxError::Disposed);
        }
        Ok(())
    }
}

#[async_trait]
impl Sandbox for MemorySandbox {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn home_dir(&self) -> Result<String> {
        Ok(MEMORY_HOME.to_string())
    }

    async fn create_session(&self, session_id: &str) -> Result<()> {
        self.check_live()?;
        let mut state = self.lock();
        if state.sessions.contains_key(session_id) {
            return Err(SandboxError::Http {
                status: 409,
                message: format!("session {session_id} already exists"),
            });
        }
        state.sessions.insert(session_id.to_string(), HashMap::new());
        state.max_open = state.max_open.max(state.sessions.len());
        state.events.push(SandboxEvent::CreateSession(session_id.to_string()));
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut state = self.lock();
        if state.sessions.remove(session_id).is_none() {
            return Err(SandboxError::NotFound(format!("session {session_id}")));
        }
        state.events.push(SandboxEvent::DeleteSession(session_id.to_string()));
        Ok(())
    }

    async fn execute_session_command(
        &self,
        session_id: &str,
        request: &SessionExecuteRequest,
    ) -> Result<SessionExecuteResponse> {
        self.check_live()?;
        let run = (self.script)(&request.command);
        let mut state = self.lock();
        state.next_cmd += 1;
        let cmd_id = format!("cmd-{}", state.next_cmd);
        let Some(session) = state.sessions.get_mut(session_id) else {
            return Err(SandboxError::NotFound(format!("session {session_id}")));
        };
        session.insert(cmd_id.clone(), RunningCommand { run, revealed: 0 });
        state.events.push(SandboxEvent::SessionCommand {
            session_id: session_id.to_string(),
            command: request.command.clone(),
        });
        Ok(SessionExecuteResponse {
            cmd_id,
            output: None,
            exit_code: None,
        })
    }

    async fn get_session_command(&self, session_id: &str, cmd_id: &str) -> Result<SessionCommand> {
        let state = self.lock();
        let cmd = state
            .sessions
            .get(session_id)
            .and_then(|s| s.get(cmd_id))
            .ok_or_else(|| SandboxError::NotFound(format!("command {cmd_id}")))?;
        let finished = cmd.revealed + 1 >= cmd.run.chunks.len();
        Ok(SessionCommand {
            id: cmd_id.to_string(),
            command: String::new(),
            exit_code: if finished { cmd.run.exit_code } else { None },
        })
    }

    async fn get_session_command_logs(
        &self,
        session_id: &str,
        cmd_id: &str,
        _timeout: Option<Duration>,
    ) -> Result<String> {
        let mut state = self.lock();
        if state.fail_logs {
            return Err(SandboxError::Transport("connection reset".into()));
        }
        let cmd = state
            .sessions
            .get_mut(session_id)
            .and_then(|s| s.get_mut(cmd_id))
            .ok_or_else(|| SandboxError::NotFound(format!("command {cmd_id}")))?;
        if cmd.revealed < cmd.run.chunks.len() {
            cmd.revealed += 1;
        }
        Ok(cmd.run.chunks.iter().take(cmd.revealed).cloned().collect())
    }

    async fn file_exists(&self, path: &str) -> Result<bool> {
        let resolved = path::resolve(MEMORY_HOME, path);
        let state = self.lock();
        Ok(state.files.contains_key(&resolved) || state.folders.contains(&resolved))
    }

    async fn create_folder(&self, path: &str, _mode: &str) -> Result<()> {
        self.check_live()?;
        let resolved = path::resolve(MEMORY_HOME, path);
        let mut state = self.lock();
        state.events.push(SandboxEvent::CreateFolder(resolved.clone()));
        state.folders.insert(resolved);
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        self.check_live()?;
        let resolved = path::resolve(MEMORY_HOME, path);
        let mut state = self.lock();
        if state.files.remove(&resolved).is_none() && !state.folders.remove(&resolved) {
            return Err(SandboxError::NotFound(resolved));
        }
        state.events.push(SandboxEvent::DeleteFile(resolved));
        Ok(())
    }

    async fn upload_file(
        &self,
        content: &[u8],
        path: &str,
        _timeout: Option<Duration>,
    ) -> Result<()> {
        self.check_live()?;
        let resolved = path::resolve(MEMORY_HOME, path);
        let mut state = self.lock();
        state.events.push(SandboxEvent::Upload(resolved.clone()));
        state.files.insert(resolved, content.to_vec());
        Ok(())
    }

    async fn download_file(&self, path: &str, _timeout: Option<Duration>) -> Result<Vec<u8>> {
        let resolved = path::resolve(MEMORY_HOME, path);
        self.lock()
            .files
            .get(&resolved)
            .cloned()
            .ok_or(SandboxError::NotFound(resolved))
    }

    async fn list_files(&self, path: &str) -> Result<Vec<FileInfo>> {
        let dir = path::resolve(MEMORY_HOME, path);
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let state = self.lock();
        let mut names: BTreeMap<String, FileInfo> = BTreeMap::new();
        let entries = state
            .files
            .iter()
            .map(|(p, c)| (p, c.len() as u64))
            .chain(state.folders.iter().map(|p| (p, 0)));
        for (full, size) in entries {
            let Some(rest) = full.strip_prefix(&prefix) else {
                continue;
            };
            let (name, is_dir) = match rest.split_once('/') {
                Some((first, _)) => (first, true),
                None => (rest, state.folders.contains(full)),
            };
            names.entry(name.to_string()).or_insert(FileInfo {
                name: name.to_string(),
                is_dir,
                size: if is_dir { 0 } else { size },
                mod_time: None,
            });
        }
        Ok(names.into_values().collect())
    }

    async fn search_files(&self, path: &str, pattern: &str) -> Result<Vec<String>> {
        let dir = path::resolve(MEMORY_HOME, path);
        let needle = pattern.trim_matches('*');
        Ok(self
            .lock()
            .files
            .keys()
            .filter(|p| p.starts_with(&dir) && p.contains(needle))
            .cloned()
            .collect())
    }

    async fn get_preview_link(&self, port: u16) -> Result<PreviewLink> {
        self.check_live()?;
        Ok(PreviewLink {
            url: format!("https://{port}-memory.preview.local"),
            token: "memory-token".into(),
        })
    }

    async fn execute_command(&self, request: &ExecRequest) -> Result<ExecResult> {
        self.check_live()?;
        let mut state = self.lock();
        state.events.push(SandboxEvent::Exec(request.command.clone()));
        if let Some(target) = request.command.strip_prefix("rm -rf ") {
            let target = path::resolve(MEMORY_HOME, target.trim_matches('\''));
            let nested = format!("{}/", target.trim_end_matches('/'));
            state
                .files
                .retain(|p, _| p != &target && !p.starts_with(&nested));
            state
                .folders
                .retain(|p| p != &target && !p.starts_with(&nested));
        }
        Ok(ExecResult {
            exit_code: 0,
            result: String::new(),
        })
    }

    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            self.lock().events.push(SandboxEvent::Dispose);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logs_reveal_one_chunk_per_fetch_then_exit() {
        let sb = MemorySandbox::with_script(|_| ScriptedRun::exits(2, &["a", "b"]));
        sb.create_session("s").await.unwrap();
        let cmd = sb
            .execute_session_command("s", &SessionExecuteRequest::background("x"))
            .await
            .unwrap();

        assert_eq!(sb.get_session_command("s", &cmd.cmd_id).await.unwrap().exit_code, None);
        assert_eq!(sb.get_session_command_logs("s", &cmd.cmd_id, None).await.unwrap(), "a");
        assert_eq!(sb.get_session_command_logs("s", &cmd.cmd_id, None).await.unwrap(), "ab");
        assert_eq!(
            sb.get_session_command("s", &cmd.cmd_id).await.unwrap().exit_code,
            Some(2)
        );
    }

    #[tokio::test]
    async fn tracks_max_open_sessions() {
        let sb = MemorySandbox::new();
        sb.create_session("a").await.unwrap();
        sb.create_session("b").await.unwrap();
        sb.delete_session("a").await.unwrap();
        sb.create_session("c").await.unwrap();
        assert_eq!(sb.max_open_sessions(), 2);
        assert_eq!(sb.open_sessions(), 2);
    }

    #[tokio::test]
    async fn rm_rf_removes_nested_files() {
        let sb = MemorySandbox::new();
        sb.put_file("dist/index.html", "x");
        sb.put_file("dist/assets/app.js", "y");
        sb.put_file("src/main.ts", "z");
        sb.execute_command(&ExecRequest::new("rm -rf /home/daytona/dist"))
            .await
            .unwrap();
        assert!(sb.file("dist/index.html").is_none());
        assert!(sb.file("dist/assets/app.js").is_none());
        assert!(sb.file("src/main.ts").is_some());
    }

    #[tokio::test]
    async fn dispose_is_idempotent() {
        let sb = MemorySandbox::new();
        sb.dispose();
        sb.dispose();
        let disposals = sb
            .events()
            .into_iter()
            .filter(|e| *e == SandboxEvent::Dispose)
            .count();
        assert_eq!(disposals, 1);
        assert!(matches!(
            sb.create_session("s").await,
            Err(SandboxError::Disposed)
        ));
    }
}
