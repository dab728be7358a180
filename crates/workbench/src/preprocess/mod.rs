//! Ordered rewrites applied to a command before it reaches the sandbox.
//!
//! Every stage always runs and receives the previous stage's output. A stage
//! that cannot do its side work logs a warning and passes the command on
//! unchanged; only the syntax guard may neutralise a command, by returning
//! an empty string.

mod guard;
mod inject;
mod kill;
mod remove;
mod scripts;

pub use guard::ConfigSyntaxGuard;
pub use inject::InstrumentationInjector;
pub use kill::PreviewKill;
pub use remove::InstrumentationRemover;
pub use scripts::{
    HttpScriptSource, ORIGIN_WILDCARD, PLUGIN_SCRIPT, REPORTER_SCRIPT, ScriptSource,
    StaticScriptSource,
};

use async_trait::async_trait;

use crate::error::WorkbenchResult;
use crate::js::{CONFIG_FILES, ConfigDialect};
use crate::workspace::Workspace;

#[async_trait]
pub trait CommandPreprocessor: Send + Sync {
    async fn process(&self, command: String) -> String;
}

/// A build-tool config present in the workspace root.
pub(crate) struct ConfigFile {
    pub name: &'static str,
    pub dialect: ConfigDialect,
    pub source: String,
}

/// First config file from [`CONFIG_FILES`] that exists.
pub(crate) async fn find_config(workspace: &Workspace) -> WorkbenchResult<Option<ConfigFile>> {
    for &(name, dialect) in CONFIG_FILES {
        if let Some(source) = workspace.read_text(name).await? {
            return Ok(Some(ConfigFile {
                name,
                dialect,
                source,
            }));
        }
    }
    Ok(None)
}
