use std::sync::Arc;

use sandbox::Sandbox;
use sandbox_direct::{DirectConfig, DirectSandbox};
use sandbox_proxy::{ProxyConfig, ProxySandbox};
use tracing::info;

use crate::config::BackendConfig;
use crate::error::CliResult;

/// Build the configured backend. Nothing is provisioned until the first call.
pub fn connect(config: &BackendConfig) -> CliResult<Arc<dyn Sandbox>> {
    let sandbox: Arc<dyn Sandbox> = match config {
        BackendConfig::Direct(direct) => {
            let mut cfg = DirectConfig::new(&direct.api_url);
            cfg.api_key = direct.api_key.clone();
            cfg.home_dir = direct.home_dir.clone();
            cfg.provision = direct.provision();
            Arc::new(DirectSandbox::new(cfg)?)
        }
        BackendConfig::Proxy(proxy) => {
            let mut cfg = ProxyConfig::new(&proxy.gateway_url);
            cfg.auth_token = proxy.auth_token.clone();
            Arc::new(ProxySandbox::new(cfg)?)
        }
    };
    info!(backend = sandbox.backend(), "sandbox backend ready");
    Ok(sandbox)
}
