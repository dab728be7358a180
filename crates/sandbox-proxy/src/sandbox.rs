use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use sandbox::{
    ExecRequest, ExecResult, FileInfo, PreviewLink, Result, Sandbox, SandboxError, SessionCommand,
    SessionExecuteRequest, SessionExecuteResponse,
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ProxyConfig;
use crate::protocol::{Method, RpcRequest};

/// Lazy-initialisation state. Reset when the gateway reports the sandbox
/// gone so the next call re-creates it.
#[derive(Default)]
struct Remote {
    created: bool,
    home: Option<String>,
}

/// Stateless gateway client. Cloning shares the connection pool.
#[derive(Clone)]
struct Gateway {
    client: Client,
    url: url::Url,
    auth_token: Option<String>,
    uuid: Uuid,
}

impl Gateway {
    fn request(
        &self,
        method: Method,
        args: Vec<Value>,
        timeout: Option<Duration>,
    ) -> reqwest::RequestBuilder {
        let body = RpcRequest {
            method,
            args,
            auth_token: self.auth_token.as_deref(),
            uuid: self.uuid,
        };
        let mut req = self.client.post(self.url.clone()).json(&body);
        if let Some(t) = timeout {
            req = req.timeout(t);
        }
        req
    }

    async fn call(
        &self,
        method: Method,
        args: Vec<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        debug!(%method, "gateway call");
        let resp = self
            .request(method, args, timeout)
            .send()
            .await
            .map_err(|e| SandboxError::Transport(format!("{method}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SandboxError::from_status(
                status.as_u16(),
                &status.to_string(),
                method.as_str(),
                &body,
            ));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| SandboxError::Transport(format!("{method} body: {e}")))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| SandboxError::Decode(format!("{method} decode: {e}")))
    }
}

pub struct ProxySandbox {
    gateway: Gateway,
    config: ProxyConfig,
    remote: Mutex<Remote>,
    /// Mirror of `Remote::created` for the synchronous `dispose`.
    created_flag: AtomicBool,
    disposed: AtomicBool,
    teardown_sent: AtomicBool,
}

impl ProxySandbox {
    pub fn new(config: ProxyConfig) -> Result<Self> {
        let url = url::Url::parse(&config.gateway_url)
            .map_err(|e| SandboxError::InvalidConfig(format!("gateway url: {e}")))?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SandboxError::InvalidConfig(format!("http client: {e}")))?;
        let uuid = Uuid::new_v4();
        info!(gateway = %url, client_id = %uuid, "proxy sandbox client initialized");

        Ok(Self {
            gateway: Gateway {
                client,
                url,
                auth_token: config.auth_token.clone(),
                uuid,
            },
            config,
            remote: Mutex::new(Remote::default()),
            created_flag: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            teardown_sent: AtomicBool::new(false),
        })
    }

    /// Client instance id sent as `uuid` with every call.
    pub fn client_id(&self) -> Uuid {
        self.gateway.uuid
    }

    /// Run `createSandbox` exactly once before any other method.
    async fn ensure(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(SandboxError::Disposed);
        }
        let mut remote = self.remote.lock().await;
        if remote.created {
            return Ok(());
        }
        let provision = serde_json::to_value(&self.config.provision)
            .map_err(|e| SandboxError::InvalidConfig(format!("provision config: {e}")))?;
        self.gateway
            .call(Method::CreateSandbox, vec![provision], None)
            .await
            .map_err(|e| match e {
                SandboxError::Http { .. } | SandboxError::Transport(_) => {
                    SandboxError::ProvisionFailed(e.to_string())
                }
                other => other,
            })?;
        remote.created = true;
        self.created_flag.store(true, Ordering::SeqCst);
        info!(client_id = %self.gateway.uuid, "sandbox created via gateway");
        // dispose() ran while createSandbox was in flight and saw nothing to tear down.
        if self.disposed.load(Ordering::SeqCst) {
            self.send_dispose();
            return Err(SandboxError::Disposed);
        }
        Ok(())
    }

    /// Fire the `dispose` RPC at most once per client.
    fn send_dispose(&self) {
        if self.teardown_sent.swap(true, Ordering::AcqRel) {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(client_id = %self.gateway.uuid, "no runtime available, skipping dispose request");
            return;
        };
        let gateway = self.gateway.clone();
        handle.spawn(async move {
            match gateway.call(Method::Dispose, vec![], None).await {
                Ok(_) => info!(client_id = %gateway.uuid, "sandbox disposed"),
                Err(e) => warn!(client_id = %gateway.uuid, error = %e, "sandbox dispose failed"),
            }
        });
    }

    async fn call(
        &self,
        method: Method,
        args: Vec<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        self.ensure().await?;
        let result = self.gateway.call(method, args, timeout).await;
        if let Err(e) = &result
            && e.is_gone()
        {
            warn!(%method, error = %e, "sandbox gone, will re-create on next call");
            let mut remote = self.remote.lock().await;
            *remote = Remote::default();
            self.created_flag.store(false, Ordering::Release);
        }
        result
    }

    async fn call_as<T: DeserializeOwned>(
        &self,
        method: Method,
        args: Vec<Value>,
        timeout: Option<Duration>,
    ) -> Result<T> {
        let value = self.call(method, args, timeout).await?;
        serde_json::from_value(value)
            .map_err(|e| SandboxError::Decode(format!("{method} result: {e}")))
    }
}

fn timeout_arg(timeout: Option<Duration>) -> Value {
    timeout.map_or(Value::Null, |t| json!(t.as_secs()))
}

#[async_trait]
impl Sandbox for ProxySandbox {
    fn backend(&self) -> &str {
        "proxy"
    }

    async fn home_dir(&self) -> Result<String> {
        if let Some(home) = self.remote.lock().await.home.clone() {
            return Ok(home);
        }
        let home: String = self.call_as(Method::GetHomeDir, vec![], None).await?;
        self.remote.lock().await.home = Some(home.clone());
        Ok(home)
    }

    async fn create_session(&self, session_id: &str) -> Result<()> {
        self.call(Method::CreateSession, vec![json!(session_id)], None)
            .await
            .map(drop)
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.call(Method::DeleteSession, vec![json!(session_id)], None)
            .await
            .map(drop)
    }

    async fn execute_session_command(
        &self,
        session_id: &str,
        request: &SessionExecuteRequest,
    ) -> Result<SessionExecuteResponse> {
        let req = serde_json::to_value(request)
            .map_err(|e| SandboxError::Decode(format!("session exec args: {e}")))?;
        self.call_as(Method::ExecuteSessionCommand, vec![json!(session_id), req], None)
            .await
    }

    async fn get_session_command(&self, session_id: &str, cmd_id: &str) -> Result<SessionCommand> {
        self.call_as(
            Method::GetSessionCommand,
            vec![json!(session_id), json!(cmd_id)],
            None,
        )
        .await
    }

    async fn get_session_command_logs(
        &self,
        session_id: &str,
        cmd_id: &str,
        timeout: Option<Duration>,
    ) -> Result<String> {
        let value = self
            .call(
                Method::GetSessionCommandLogs,
                vec![json!(session_id), json!(cmd_id), timeout_arg(timeout)],
                timeout,
            )
            .await?;
        Ok(match value {
            Value::Null => String::new(),
            Value::String(s) => s,
            other => other.to_string(),
        })
    }

    async fn file_exists(&self, path: &str) -> Result<bool> {
        self.call_as(Method::FileExists, vec![json!(path)], None).await
    }

    async fn create_folder(&self, path: &str, mode: &str) -> Result<()> {
        self.call(Method::CreateFolder, vec![json!(path), json!(mode)], None)
            .await
            .map(drop)
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        self.call(Method::DeleteFile, vec![json!(path)], None)
            .await
            .map(drop)
    }

    async fn upload_file(
        &self,
        content: &[u8],
        path: &str,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(content);
        self.call(
            Method::UploadFile,
            vec![json!(encoded), json!(path), timeout_arg(timeout)],
            timeout,
        )
        .await
        .map(drop)
    }

    async fn download_file(&self, path: &str, timeout: Option<Duration>) -> Result<Vec<u8>> {
        let encoded: String = self
            .call_as(
                Method::DownloadFile,
                vec![json!(path), timeout_arg(timeout)],
                timeout,
            )
            .await?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| SandboxError::Decode(format!("downloadFile base64: {e}")))
    }

    async fn list_files(&self, path: &str) -> Result<Vec<FileInfo>> {
        self.call_as(Method::ListFiles, vec![json!(path)], None).await
    }

    async fn search_files(&self, path: &str, pattern: &str) -> Result<Vec<String>> {
        self.call_as(Method::SearchFiles, vec![json!(path), json!(pattern)], None)
            .await
    }

    async fn get_preview_link(&self, port: u16) -> Result<PreviewLink> {
        self.call_as(Method::GetPreviewLink, vec![json!(port)], None).await
    }

    async fn execute_command(&self, request: &ExecRequest) -> Result<ExecResult> {
        self.call_as(
            Method::ExecuteCommand,
            vec![
                json!(request.command),
                json!(request.cwd),
                timeout_arg(request.timeout),
            ],
            request.timeout,
        )
        .await
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if !self.created_flag.load(Ordering::SeqCst) {
            info!("dispose before createSandbox, nothing to tear down");
            return;
        }
        self.send_dispose();
    }
}
