//! Per-terminal command execution.
//!
//! A [`Shell`] runs at most one command at a time. Starting a command while
//! another is in flight supersedes it: the old command's abort callback runs,
//! its session is deleted (the sandbox has no per-process kill) and its
//! future is awaited before the new session is created.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sandbox::{Sandbox, SessionExecuteRequest};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::alert::AlertSink;
use crate::clean::{clean_output, colorize_error};
use crate::error::WorkbenchResult;
use crate::logs::{LogProcessor, MiscErrorProcessor, PortLogProcessor, ViteErrorProcessor};
use crate::port::PortCatcher;
use crate::preprocess::{
    CommandPreprocessor, ConfigSyntaxGuard, InstrumentationInjector, InstrumentationRemover,
    PreviewKill, ScriptSource,
};
use crate::terminal::Terminal;
use crate::workspace::Workspace;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub poll_interval: Duration,
    /// Passed to every log fetch; `None` leaves the backend default.
    pub log_timeout: Option<Duration>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            log_timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Cleaned, accumulated log output.
    pub output: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellState {
    Idle,
    Executing,
    Superseding,
}

/// Local cleanup hook for a command, run when a later command supersedes it.
pub type AbortCallback = Box<dyn FnOnce() + Send>;

struct Execution {
    session_id: String,
    cancel: CancellationToken,
    /// Closed when the command's future has finished.
    done: oneshot::Receiver<()>,
    abort: Option<AbortCallback>,
}

/// Collaborators the interactive preview/build shell is wired with.
#[derive(Clone)]
pub struct Instrumentation {
    pub workspace: Arc<Workspace>,
    pub ports: Arc<PortCatcher>,
    pub alerts: Arc<dyn AlertSink>,
    pub scripts: Arc<dyn ScriptSource>,
    /// Origin of the hosting application.
    pub origin: String,
}

pub struct ShellBuilder {
    sandbox: Arc<dyn Sandbox>,
    terminal: Arc<dyn Terminal>,
    preprocessors: Vec<Box<dyn CommandPreprocessor>>,
    log_processors: Vec<Box<dyn LogProcessor>>,
    config: ShellConfig,
}

impl ShellBuilder {
    pub fn preprocessor(mut self, p: impl CommandPreprocessor + 'static) -> Self {
        self.preprocessors.push(Box::new(p));
        self
    }

    pub fn log_processor(mut self, p: impl LogProcessor + 'static) -> Self {
        self.log_processors.push(Box::new(p));
        self
    }

    pub fn config(mut self, config: ShellConfig) -> Self {
        self.config = config;
        self
    }

    /// Standard wiring for preview/build use. The syntax guard runs before
    /// anything parses the config, and the kill step before a new dev server
    /// starts.
    pub fn interactive(self, inst: &Instrumentation) -> Self {
        let sandbox = Arc::clone(&self.sandbox);
        self.log_processor(PortLogProcessor::new(Arc::clone(&inst.ports)))
            .log_processor(ViteErrorProcessor::new(Arc::clone(&inst.alerts)))
            .log_processor(MiscErrorProcessor::new(Arc::clone(&inst.alerts)))
            .preprocessor(ConfigSyntaxGuard::new(
                Arc::clone(&inst.workspace),
                Arc::clone(&inst.alerts),
            ))
            .preprocessor(PreviewKill::new(sandbox, Arc::clone(&inst.ports)))
            .preprocessor(InstrumentationInjector::new(
                Arc::clone(&inst.workspace),
                Arc::clone(&inst.scripts),
                &inst.origin,
            ))
            .preprocessor(InstrumentationRemover::new(Arc::clone(&inst.workspace)))
    }

    pub fn build(self) -> Shell {
        Shell {
            sandbox: self.sandbox,
            terminal: self.terminal,
            preprocessors: self.preprocessors,
            log_processors: self.log_processors,
            config: self.config,
            launch: tokio::sync::Mutex::new(()),
            current: Mutex::new(None),
            superseding: AtomicBool::new(false),
            cursor: AtomicUsize::new(0),
        }
    }
}

pub struct Shell {
    sandbox: Arc<dyn Sandbox>,
    terminal: Arc<dyn Terminal>,
    preprocessors: Vec<Box<dyn CommandPreprocessor>>,
    log_processors: Vec<Box<dyn LogProcessor>>,
    config: ShellConfig,
    /// Serialises supersede + session creation between concurrent callers.
    launch: tokio::sync::Mutex<()>,
    current: Mutex<Option<Execution>>,
    superseding: AtomicBool,
    /// Length of the log output already streamed.
    cursor: AtomicUsize,
}

enum Poll {
    Exited(CommandOutput),
    Cancelled,
}

impl Shell {
    pub fn builder(sandbox: Arc<dyn Sandbox>, terminal: Arc<dyn Terminal>) -> ShellBuilder {
        ShellBuilder {
            sandbox,
            terminal,
            preprocessors: Vec::new(),
            log_processors: Vec::new(),
            config: ShellConfig::default(),
        }
    }

    fn current(&self) -> MutexGuard<'_, Option<Execution>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ShellState {
        if self.superseding.load(Ordering::Acquire) {
            ShellState::Superseding
        } else if self.current().is_some() {
            ShellState::Executing
        } else {
            ShellState::Idle
        }
    }

    /// Bytes of output streamed so far for the running command.
    pub fn log_cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Run `text` to completion.
    ///
    /// Returns `Ok(None)` when the outcome is unknown: polling failed, a
    /// later command superseded this one, or preprocessing neutralised it.
    /// Failing to create the session or submit the command is an error.
    pub async fn execute_command(
        &self,
        text: &str,
        abort: Option<AbortCallback>,
    ) -> WorkbenchResult<Option<CommandOutput>> {
        let launch = self.launch.lock().await;
        self.supersede().await;

        let session_id = Uuid::new_v4().to_string();
        self.sandbox.create_session(&session_id).await?;
        debug!(%session_id, "session created");

        let mut command = text.to_string();
        for p in &self.preprocessors {
            command = p.process(command).await;
        }
        if command.trim().is_empty() {
            info!(original = %text, "command neutralised by preprocessing");
            self.delete_session(&session_id).await;
            return Ok(None);
        }

        let submitted = self
            .sandbox
            .execute_session_command(&session_id, &SessionExecuteRequest::background(&command))
            .await;
        let cmd_id = match submitted {
            Ok(resp) => resp.cmd_id,
            Err(e) => {
                self.delete_session(&session_id).await;
                return Err(e.into());
            }
        };
        info!(%session_id, %cmd_id, %command, "command started");

        let cancel = CancellationToken::new();
        let (_done, done_rx) = oneshot::channel::<()>();
        *self.current() = Some(Execution {
            session_id: session_id.clone(),
            cancel: cancel.clone(),
            done: done_rx,
            abort,
        });
        self.cursor.store(0, Ordering::Release);
        drop(launch);

        let outcome = self.poll(&session_id, &cmd_id, &cancel).await;
        self.finish(&session_id);
        match outcome {
            Ok(Poll::Exited(output)) => {
                self.delete_session(&session_id).await;
                info!(%session_id, exit_code = output.exit_code, "command finished");
                Ok(Some(output))
            }
            Ok(Poll::Cancelled) => {
                debug!(%session_id, "command superseded");
                Ok(None)
            }
            Err(e) => {
                warn!(%session_id, error = %e, "polling failed, outcome unknown");
                self.delete_session(&session_id).await;
                Ok(None)
            }
        }
    }

    /// Stop the running command, if any, without starting another.
    pub async fn interrupt(&self) {
        let _launch = self.launch.lock().await;
        self.supersede().await;
    }

    async fn supersede(&self) {
        let Some(prior) = self.current().take() else {
            return;
        };
        self.superseding.store(true, Ordering::Release);
        info!(session_id = %prior.session_id, "superseding running command");
        if let Some(abort) = prior.abort {
            abort();
        }
        prior.cancel.cancel();
        self.delete_session(&prior.session_id).await;
        // Err only means the sender is gone, which is what we wait for.
        let _ = prior.done.await;
        self.superseding.store(false, Ordering::Release);
    }

    async fn poll(
        &self,
        session_id: &str,
        cmd_id: &str,
        cancel: &CancellationToken,
    ) -> WorkbenchResult<Poll> {
        let mut cursor = 0usize;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(Poll::Cancelled),
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }

            let status = self.sandbox.get_session_command(session_id, cmd_id).await?;
            let logs = self
                .sandbox
                .get_session_command_logs(session_id, cmd_id, self.config.log_timeout)
                .await?;
            if cancel.is_cancelled() {
                return Ok(Poll::Cancelled);
            }

            let suffix = logs.get(cursor..).unwrap_or_default();
            if !suffix.is_empty() {
                for p in &self.log_processors {
                    p.process(suffix);
                }
                match status.exit_code {
                    Some(code) if code != 0 => self.terminal.write(&colorize_error(suffix)),
                    _ => self.terminal.write(suffix),
                }
            }
            cursor = logs.len();
            self.cursor.store(cursor, Ordering::Release);

            if let Some(exit_code) = status.exit_code {
                return Ok(Poll::Exited(CommandOutput {
                    output: clean_output(&logs),
                    exit_code,
                }));
            }
        }
    }

    /// Drop the execution record if it still belongs to `session_id`.
    fn finish(&self, session_id: &str) {
        let mut current = self.current();
        if current
            .as_ref()
            .is_some_and(|e| e.session_id == session_id)
        {
            *current = None;
            self.cursor.store(0, Ordering::Release);
        }
    }

    async fn delete_session(&self, session_id: &str) {
        match self.sandbox.delete_session(session_id).await {
            Ok(()) => debug!(%session_id, "session deleted"),
            Err(e) => warn!(%session_id, error = %e, "failed to delete session"),
        }
    }
}
