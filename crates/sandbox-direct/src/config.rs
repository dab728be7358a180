use std::time::Duration;

use sandbox::ProvisionConfig;

/// Default timeout for provider requests that don't carry their own.
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct DirectConfig {
    /// Provider API base URL, e.g. `https://app.daytona.io/api`.
    pub api_url: String,
    pub api_key: Option<String>,
    pub provision: ProvisionConfig,
    /// Skip home-directory discovery and use this path instead.
    pub home_dir: Option<String>,
    pub request_timeout: Duration,
}

impl DirectConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: None,
            provision: ProvisionConfig::default(),
            home_dir: None,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }
}
