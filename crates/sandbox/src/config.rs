use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Installed once, right after a sandbox is provisioned.
pub const DEFAULT_TOOLCHAIN_INSTALL: &str = "npm install -g pnpm";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLimits {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_gb: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_gb: Option<u32>,
}

/// Parameters for provisioning a fresh remote sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub resources: ResourceLimits,
    /// Command run once after provisioning; `None` skips the install.
    #[serde(default = "default_toolchain_install")]
    pub toolchain_install: Option<String>,
}

fn default_toolchain_install() -> Option<String> {
    Some(DEFAULT_TOOLCHAIN_INSTALL.to_string())
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            image: None,
            target: None,
            labels: HashMap::new(),
            resources: ResourceLimits::default(),
            toolchain_install: default_toolchain_install(),
        }
    }
}
