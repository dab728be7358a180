use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::{WorkbenchError, WorkbenchResult};

/// Error/ready reporter loaded into the preview page.
pub const REPORTER_SCRIPT: &str = "preview-reporter.js";
/// Build-tool plugin that serves the reporter and registers it.
pub const PLUGIN_SCRIPT: &str = "preview-reporter-plugin.js";
/// Target-origin literal in the reporter script, replaced with the hosting
/// application's origin.
pub const ORIGIN_WILDCARD: &str = "'*'";

/// Where instrumentation script bodies come from.
#[async_trait]
pub trait ScriptSource: Send + Sync {
    async fn fetch(&self, name: &str) -> WorkbenchResult<String>;
}

/// Fetches `GET {origin}/scripts/{name}` from the hosting application.
pub struct HttpScriptSource {
    client: Client,
    origin: String,
}

impl HttpScriptSource {
    pub fn new(origin: &str) -> WorkbenchResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| WorkbenchError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            origin: origin.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ScriptSource for HttpScriptSource {
    async fn fetch(&self, name: &str) -> WorkbenchResult<String> {
        let url = format!("{}/scripts/{name}", self.origin);
        debug!(%url, "fetching instrumentation script");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WorkbenchError::ScriptFetch(format!("{name}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(WorkbenchError::ScriptFetch(format!("{name}: {status}")));
        }
        resp.text()
            .await
            .map_err(|e| WorkbenchError::ScriptFetch(format!("{name} body: {e}")))
    }
}

/// Serves script bodies from memory.
#[derive(Default)]
pub struct StaticScriptSource {
    scripts: HashMap<String, String>,
}

impl StaticScriptSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, body: &str) -> Self {
        self.scripts.insert(name.to_string(), body.to_string());
        self
    }
}

#[async_trait]
impl ScriptSource for StaticScriptSource {
    async fn fetch(&self, name: &str) -> WorkbenchResult<String> {
        self.scripts
            .get(name)
            .cloned()
            .ok_or_else(|| WorkbenchError::ScriptFetch(format!("{name}: not available")))
    }
}
