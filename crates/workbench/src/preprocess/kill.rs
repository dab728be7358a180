use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use sandbox::{Sandbox, SessionExecuteRequest};
use tracing::{info, warn};
use uuid::Uuid;

use super::CommandPreprocessor;
use crate::commands::is_preview_command;
use crate::error::WorkbenchResult;
use crate::port::PortCatcher;

/// Seconds between SIGTERM and SIGKILL.
const KILL_GRACE_SECS: u32 = 2;

/// Stops the previous dev server when a preview command starts or ends, so
/// the new process can bind the port.
pub struct PreviewKill {
    sandbox: Arc<dyn Sandbox>,
    ports: Arc<PortCatcher>,
    last: Mutex<Option<String>>,
}

/// Shell snippet that terminates whatever listens on `port`.
fn kill_command(port: u16) -> String {
    let find = format!("(lsof -t -i:{port} 2>/dev/null || fuser {port}/tcp 2>/dev/null)");
    format!(
        "pids=$({find}); if [ -n \"$pids\" ]; then kill -TERM $pids 2>/dev/null; \
         sleep {KILL_GRACE_SECS}; pids=$({find}); \
         [ -n \"$pids\" ] && kill -KILL $pids 2>/dev/null; fi; true"
    )
}

impl PreviewKill {
    pub fn new(sandbox: Arc<dyn Sandbox>, ports: Arc<PortCatcher>) -> Self {
        Self {
            sandbox,
            ports,
            last: Mutex::new(None),
        }
    }

    async fn kill(&self, port: u16) -> WorkbenchResult<()> {
        let session_id = Uuid::new_v4().to_string();
        self.sandbox.create_session(&session_id).await?;
        let request = SessionExecuteRequest {
            command: kill_command(port),
            run_async: false,
        };
        let result = self
            .sandbox
            .execute_session_command(&session_id, &request)
            .await;
        if let Err(e) = self.sandbox.delete_session(&session_id).await {
            warn!(%session_id, error = %e, "failed to delete kill session");
        }
        result?;
        info!(port, "previous preview process stopped");
        Ok(())
    }
}

#[async_trait]
impl CommandPreprocessor for PreviewKill {
    async fn process(&self, command: String) -> String {
        let previous = self
            .last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(command.clone());
        let involves_preview =
            is_preview_command(&command) || previous.as_deref().is_some_and(is_preview_command);
        if !involves_preview {
            return command;
        }
        let Some(port) = self.ports.current() else {
            return command;
        };
        if let Err(e) = self.kill(port).await {
            warn!(port, error = %e, "failed to stop preview process");
        }
        self.ports.remove_port();
        command
    }
}
