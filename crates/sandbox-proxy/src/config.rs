use std::time::Duration;

use sandbox::ProvisionConfig;

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Full gateway URL, e.g. `https://app.example.com/api/sandbox`.
    pub gateway_url: String,
    pub auth_token: Option<String>,
    /// Forwarded to the gateway's `createSandbox`.
    pub provision: ProvisionConfig,
    pub request_timeout: Duration,
}

impl ProxyConfig {
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            auth_token: None,
            provision: ProvisionConfig::default(),
            request_timeout: DEFAULT_TIMEOUT,
        }
    }
}
