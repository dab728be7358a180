use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sandbox::{DEFAULT_TOOLCHAIN_INSTALL, ProvisionConfig};
use serde::Deserialize;
use workbench::ShellConfig;

use crate::error::{CliError, CliResult};

pub(crate) const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub(crate) const API_KEY_ENV: &str = "WORKBENCH_API_KEY";
pub(crate) const AUTH_TOKEN_ENV: &str = "WORKBENCH_AUTH_TOKEN";

#[derive(Debug, PartialEq, Deserialize)]
pub struct WorkbenchConfig {
    pub backend: BackendConfig,
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub shell: ShellSection,
}

#[derive(Debug, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    Direct(DirectBackend),
    Proxy(ProxyBackend),
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct DirectBackend {
    pub api_url: String,
    pub api_key: Option<String>,
    pub image: Option<String>,
    pub target: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// `null` skips the install.
    #[serde(default = "default_toolchain_install")]
    pub toolchain_install: Option<String>,
    pub home_dir: Option<String>,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct ProxyBackend {
    pub gateway_url: String,
    pub auth_token: Option<String>,
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct WorkspaceConfig {
    pub local_root: PathBuf,
    pub origin: String,
}

#[derive(Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShellSection {
    pub poll_interval_ms: u64,
}

impl Default for ShellSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

fn default_toolchain_install() -> Option<String> {
    Some(DEFAULT_TOOLCHAIN_INSTALL.to_string())
}

/// Load and validate a workbench config from a YAML file.
///
/// `local_root` is resolved against the config file's parent directory.
/// Secrets missing from the file are taken from the environment.
pub async fn load(path: &Path) -> CliResult<WorkbenchConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CliError::Config(format!("read {}: {e}", path.display())))?;
    let mut config = parse(&content, |key| std::env::var(key).ok())
        .map_err(|e| CliError::Config(format!("{}: {e}", path.display())))?;
    if let Some(config_dir) = path.parent() {
        config.resolve_relative_paths(config_dir);
    }
    tokio::fs::create_dir_all(&config.workspace.local_root)
        .await
        .map_err(|e| {
            CliError::Config(format!(
                "create {}: {e}",
                config.workspace.local_root.display()
            ))
        })?;
    Ok(config)
}

fn parse(content: &str, env: impl Fn(&str) -> Option<String>) -> Result<WorkbenchConfig, String> {
    let mut config: WorkbenchConfig =
        serde_yaml_ng::from_str(content).map_err(|e| format!("parse: {e}"))?;
    match &mut config.backend {
        BackendConfig::Direct(direct) => {
            if direct.api_key.is_none() {
                direct.api_key = env(API_KEY_ENV);
            }
            if direct.api_key.is_none() {
                return Err(format!("backend.api_key missing and {API_KEY_ENV} not set"));
            }
        }
        BackendConfig::Proxy(proxy) => {
            if proxy.auth_token.is_none() {
                proxy.auth_token = env(AUTH_TOKEN_ENV);
            }
        }
    }
    let origin = config.workspace.origin.trim_end_matches('/');
    if origin.is_empty() {
        return Err("workspace.origin must not be empty".into());
    }
    config.workspace.origin = origin.to_string();
    if config.shell.poll_interval_ms == 0 {
        return Err("shell.poll_interval_ms must be positive".into());
    }
    Ok(config)
}

impl WorkbenchConfig {
    fn resolve_relative_paths(&mut self, config_dir: &Path) {
        if self.workspace.local_root.is_relative() {
            self.workspace.local_root = config_dir.join(&self.workspace.local_root);
        }
    }

    pub fn shell_config(&self) -> ShellConfig {
        ShellConfig {
            poll_interval: Duration::from_millis(self.shell.poll_interval_ms),
            ..ShellConfig::default()
        }
    }
}

impl DirectBackend {
    pub fn provision(&self) -> ProvisionConfig {
        ProvisionConfig {
            image: self.image.clone(),
            target: self.target.clone(),
            labels: self.labels.clone(),
            toolchain_install: self.toolchain_install.clone(),
            ..ProvisionConfig::default()
        }
    }
}
