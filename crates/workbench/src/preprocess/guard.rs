use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{CommandPreprocessor, find_config};
use crate::alert::{Alert, AlertSink};
use crate::commands::{is_build_command, is_preview_command};
use crate::js::check_syntax;
use crate::workspace::Workspace;

/// Refuses to start a build or dev server on a config that does not parse.
pub struct ConfigSyntaxGuard {
    workspace: Arc<Workspace>,
    alerts: Arc<dyn AlertSink>,
}

impl ConfigSyntaxGuard {
    pub fn new(workspace: Arc<Workspace>, alerts: Arc<dyn AlertSink>) -> Self {
        Self { workspace, alerts }
    }
}

#[async_trait]
impl CommandPreprocessor for ConfigSyntaxGuard {
    async fn process(&self, command: String) -> String {
        if !is_preview_command(&command) && !is_build_command(&command) {
            return command;
        }
        let config = match find_config(&self.workspace).await {
            Ok(Some(config)) => config,
            Ok(None) => {
                debug!("no build-tool config, nothing to check");
                return command;
            }
            Err(e) => {
                warn!(error = %e, "could not read build-tool config, skipping syntax check");
                return command;
            }
        };
        match check_syntax(config.name, &config.source) {
            Ok(()) => command,
            Err(e) => {
                warn!(file = config.name, error = %e, %command, "config does not parse, command suppressed");
                self.alerts.raise(Alert::terminal_error(
                    "Config Syntax Error",
                    format!("{}:{e}", config.name),
                    config.source,
                ));
                String::new()
            }
        }
    }
}
