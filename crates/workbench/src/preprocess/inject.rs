use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::scripts::{ORIGIN_WILDCARD, PLUGIN_SCRIPT, REPORTER_SCRIPT, ScriptSource};
use super::{CommandPreprocessor, find_config};
use crate::commands::is_preview_command;
use crate::error::WorkbenchResult;
use crate::js::patcher_for;
use crate::workspace::Workspace;

/// Before a dev server starts: writes the reporter script and plugin into
/// the workspace root and registers the plugin in the build-tool config.
pub struct InstrumentationInjector {
    workspace: Arc<Workspace>,
    scripts: Arc<dyn ScriptSource>,
    origin: String,
}

impl InstrumentationInjector {
    pub fn new(workspace: Arc<Workspace>, scripts: Arc<dyn ScriptSource>, origin: &str) -> Self {
        Self {
            workspace,
            scripts,
            origin: origin.trim_end_matches('/').to_string(),
        }
    }

    async fn inject(&self) -> WorkbenchResult<()> {
        let reporter = self
            .scripts
            .fetch(REPORTER_SCRIPT)
            .await?
            .replace(ORIGIN_WILDCARD, &format!("'{}'", self.origin));
        let plugin = self.scripts.fetch(PLUGIN_SCRIPT).await?;
        self.workspace
            .write_generated(REPORTER_SCRIPT, reporter.as_bytes())
            .await?;
        self.workspace
            .write_generated(PLUGIN_SCRIPT, plugin.as_bytes())
            .await?;

        let Some(config) = find_config(&self.workspace).await? else {
            debug!("no build-tool config to patch");
            return Ok(());
        };
        let patched = patcher_for(config.dialect).inject(config.name, &config.source)?;
        if patched != config.source {
            self.workspace
                .write_file(config.name, patched.as_bytes())
                .await?;
            info!(file = config.name, "preview reporter registered");
        }
        Ok(())
    }
}

#[async_trait]
impl CommandPreprocessor for InstrumentationInjector {
    async fn process(&self, command: String) -> String {
        if is_preview_command(&command)
            && let Err(e) = self.inject().await
        {
            warn!(error = %e, %command, "instrumentation not injected");
        }
        command
    }
}
