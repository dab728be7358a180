use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::scripts::{PLUGIN_SCRIPT, REPORTER_SCRIPT};
use super::{CommandPreprocessor, find_config};
use crate::commands::is_build_command;
use crate::error::WorkbenchResult;
use crate::js::patcher_for;
use crate::workspace::Workspace;

/// Before a production build: deletes the generated files and unregisters
/// the plugin, so build output carries no instrumentation.
pub struct InstrumentationRemover {
    workspace: Arc<Workspace>,
}

impl InstrumentationRemover {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }

    async fn remove(&self) -> WorkbenchResult<()> {
        for name in [REPORTER_SCRIPT, PLUGIN_SCRIPT] {
            if self.workspace.exists(name).await? {
                self.workspace.remove(name, false).await?;
            }
        }
        if let Some(config) = find_config(&self.workspace).await? {
            let restored = patcher_for(config.dialect).remove(config.name, &config.source)?;
            if restored != config.source {
                self.workspace
                    .write_file(config.name, restored.as_bytes())
                    .await?;
                info!(file = config.name, "preview reporter unregistered");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CommandPreprocessor for InstrumentationRemover {
    async fn process(&self, command: String) -> String {
        if is_build_command(&command)
            && let Err(e) = self.remove().await
        {
            warn!(error = %e, %command, "instrumentation not removed");
        }
        command
    }
}
