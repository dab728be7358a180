use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex as StdMutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use sandbox::path;
use sandbox::{
    ExecRequest, ExecResult, FileInfo, PreviewLink, Result, Sandbox, SandboxError, SessionCommand,
    SessionExecuteRequest, SessionExecuteResponse,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::DirectConfig;
use crate::http::{self, HttpClient};
use crate::wire::{
    CreateSandboxRequest, CreateSessionRequest, CreatedSandbox, ExecuteRequest, ProjectDir,
    SearchResponse,
};

/// A provisioned remote container.
#[derive(Debug, Clone)]
struct Provisioned {
    id: String,
    home: String,
}

fn toolbox_path(id: &str, suffix: &str) -> String {
    format!("/toolbox/{id}/toolbox{suffix}")
}

impl Provisioned {
    fn toolbox(&self, suffix: &str) -> String {
        toolbox_path(&self.id, suffix)
    }

    fn session(&self, session_id: &str, suffix: &str) -> String {
        self.toolbox(&format!("/process/session/{session_id}{suffix}"))
    }
}

pub struct DirectSandbox {
    http: HttpClient,
    config: DirectConfig,
    /// Held across provisioning so concurrent first callers wait for one
    /// container instead of racing to create several.
    state: Mutex<Option<Provisioned>>,
    /// Mirror of the provisioned id for the synchronous `dispose`.
    sandbox_id: StdMutex<Option<String>>,
    disposed: AtomicBool,
}

impl DirectSandbox {
    pub fn new(config: DirectConfig) -> Result<Self> {
        let http = HttpClient::new(
            &config.api_url,
            config.api_key.clone(),
            config.request_timeout,
        )?;
        Ok(Self {
            http,
            config,
            state: Mutex::new(None),
            sandbox_id: StdMutex::new(None),
            disposed: AtomicBool::new(false),
        })
    }

    /// Id of the provisioned container, if any.
    pub fn sandbox_id(&self) -> Option<String> {
        self.sandbox_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_sandbox_id(&self, id: Option<String>) {
        *self.sandbox_id.lock().unwrap_or_else(PoisonError::into_inner) = id;
    }

    async fn ensure(&self) -> Result<Provisioned> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(SandboxError::Disposed);
        }
        let mut state = self.state.lock().await;
        if let Some(p) = state.as_ref() {
            return Ok(p.clone());
        }
        let provisioned = self.provision().await?;
        if self.disposed.load(Ordering::Acquire) {
            // dispose() ran while we were provisioning and saw no id.
            self.teardown(provisioned.id);
            return Err(SandboxError::Disposed);
        }
        self.set_sandbox_id(Some(provisioned.id.clone()));
        *state = Some(provisioned.clone());
        Ok(provisioned)
    }

    async fn provision(&self) -> Result<Provisioned> {
        let p = &self.config.provision;
        let body = CreateSandboxRequest {
            image: p.image.as_deref(),
            target: p.target.as_deref(),
            labels: &p.labels,
            cpu: p.resources.cpu,
            memory: p.resources.memory_gb,
            disk: p.resources.disk_gb,
        };
        info!(image = ?p.image, "provisioning sandbox");
        let req = self.http.request(Method::POST, "/sandbox").json(&body);
        let resp = http::send(req, "create sandbox")
            .await
            .map_err(|e| SandboxError::ProvisionFailed(e.to_string()))?;
        let created: CreatedSandbox = http::decode(resp, "create sandbox").await?;

        let home = match self.home_of(&created.id).await {
            Ok(home) => home,
            Err(e) => {
                warn!(sandbox_id = %created.id, error = %e, "home lookup failed, deleting new sandbox");
                self.teardown(created.id);
                return Err(e);
            }
        };
        let provisioned = Provisioned {
            id: created.id,
            home,
        };
        info!(sandbox_id = %provisioned.id, home = %provisioned.home, "sandbox provisioned");

        if let Some(install) = &p.toolchain_install {
            match self.exec(&provisioned, install, None, None).await {
                Ok(r) if r.exit_code == 0 => {
                    info!(sandbox_id = %provisioned.id, "toolchain installed");
                }
                Ok(r) => warn!(
                    sandbox_id = %provisioned.id,
                    exit_code = r.exit_code,
                    output = %r.result,
                    "toolchain install failed"
                ),
                Err(e) => {
                    warn!(sandbox_id = %provisioned.id, error = %e, "toolchain install failed");
                }
            }
        }
        Ok(provisioned)
    }

    async fn home_of(&self, id: &str) -> Result<String> {
        if let Some(dir) = &self.config.home_dir {
            return Ok(dir.clone());
        }
        let req = self.http.request(Method::GET, &toolbox_path(id, "/project-dir"));
        let resp = http::send(req, "project dir").await?;
        Ok(http::decode::<ProjectDir>(resp, "project dir").await?.dir)
    }

    /// Forget the container when the provider reports it gone, so the next
    /// call provisions a fresh one.
    async fn observe<T>(&self, sandbox: &Provisioned, result: Result<T>) -> Result<T> {
        if let Err(e) = &result
            && e.is_gone()
        {
            let mut state = self.state.lock().await;
            if state.as_ref().is_some_and(|p| p.id == sandbox.id) {
                warn!(sandbox_id = %sandbox.id, error = %e, "sandbox gone, will re-provision");
                *state = None;
                self.set_sandbox_id(None);
            }
        }
        result
    }

    async fn exec(
        &self,
        sandbox: &Provisioned,
        command: &str,
        cwd: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<ExecResult> {
        let body = ExecuteRequest {
            command,
            cwd: Some(cwd.unwrap_or(&sandbox.home)),
            timeout: timeout.map(|t| t.as_secs()),
        };
        let mut req = self
            .http
            .request(Method::POST, &sandbox.toolbox("/process/execute"))
            .json(&body);
        if let Some(t) = timeout {
            req = req.timeout(t);
        }
        let resp = http::send(req, "execute").await?;
        http::decode(resp, "execute").await
    }

    fn files_request(
        &self,
        sandbox: &Provisioned,
        method: Method,
        suffix: &str,
        path: &str,
    ) -> reqwest::RequestBuilder {
        let remote = path::resolve(&sandbox.home, path);
        self.http
            .request(method, &sandbox.toolbox(&format!("/files{suffix}")))
            .query(&[("path", remote)])
    }
}

#[async_trait]
impl Sandbox for DirectSandbox {
    fn backend(&self) -> &str {
        "direct"
    }

    async fn home_dir(&self) -> Result<String> {
        Ok(self.ensure().await?.home)
    }

    async fn create_session(&self, session_id: &str) -> Result<()> {
        let sb = self.ensure().await?;
        let req = self
            .http
            .request(Method::POST, &sb.toolbox("/process/session"))
            .json(&CreateSessionRequest { session_id });
        let result = http::send(req, "create session").await.map(drop);
        self.observe(&sb, result).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let sb = self.ensure().await?;
        let req = self.http.request(Method::DELETE, &sb.session(session_id, ""));
        let result = http::send(req, "delete session").await.map(drop);
        self.observe(&sb, result).await
    }

    async fn execute_session_command(
        &self,
        session_id: &str,
        request: &SessionExecuteRequest,
    ) -> Result<SessionExecuteResponse> {
        let sb = self.ensure().await?;
        let body = SessionExecuteRequest {
            command: path::in_dir(&sb.home, &request.command),
            run_async: request.run_async,
        };
        let req = self
            .http
            .request(Method::POST, &sb.session(session_id, "/exec"))
            .json(&body);
        let result = match http::send(req, "session exec").await {
            Ok(resp) => http::decode(resp, "session exec").await,
            Err(e) => Err(e),
        };
        self.observe(&sb, result).await
    }

    async fn get_session_command(&self, session_id: &str, cmd_id: &str) -> Result<SessionCommand> {
        let sb = self.ensure().await?;
        let req = self
            .http
            .request(Method::GET, &sb.session(session_id, &format!("/command/{cmd_id}")));
        let result = match http::send(req, "session command").await {
            Ok(resp) => http::decode(resp, "session command").await,
            Err(e) => Err(e),
        };
        self.observe(&sb, result).await
    }

    async fn get_session_command_logs(
        &self,
        session_id: &str,
        cmd_id: &str,
        timeout: Option<Duration>,
    ) -> Result<String> {
        let sb = self.ensure().await?;
        let mut req = self.http.request(
            Method::GET,
            &sb.session(session_id, &format!("/command/{cmd_id}/logs")),
        );
        if let Some(t) = timeout {
            req = req.timeout(t);
        }
        let result = match http::send(req, "session logs").await {
            Ok(resp) => resp
                .text()
                .await
                .map_err(|e| SandboxError::Decode(format!("session logs: {e}"))),
            Err(e) => Err(e),
        };
        self.observe(&sb, result).await
    }

    async fn file_exists(&self, path: &str) -> Result<bool> {
        let sb = self.ensure().await?;
        let req = self.files_request(&sb, Method::GET, "/info", path);
        let result = match http::send(req, "file info").await {
            Ok(_) => Ok(true),
            Err(SandboxError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        };
        self.observe(&sb, result).await
    }

    async fn create_folder(&self, path: &str, mode: &str) -> Result<()> {
        let sb = self.ensure().await?;
        let req = self
            .files_request(&sb, Method::POST, "/folder", path)
            .query(&[("mode", mode)]);
        let result = http::send(req, "create folder").await.map(drop);
        self.observe(&sb, result).await
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let sb = self.ensure().await?;
        let req = self.files_request(&sb, Method::DELETE, "", path);
        let result = http::send(req, "delete file").await.map(drop);
        self.observe(&sb, result).await
    }

    async fn upload_file(
        &self,
        content: &[u8],
        path: &str,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let sb = self.ensure().await?;
        let file_name = path.rsplit('/').next().unwrap_or(path).to_string();
        let form = Form::new().part("file", Part::bytes(content.to_vec()).file_name(file_name));
        let mut req = self
            .files_request(&sb, Method::POST, "/upload", path)
            .multipart(form);
        if let Some(t) = timeout {
            req = req.timeout(t);
        }
        let result = http::send(req, "upload").await.map(drop);
        self.observe(&sb, result).await
    }

    async fn download_file(&self, path: &str, timeout: Option<Duration>) -> Result<Vec<u8>> {
        let sb = self.ensure().await?;
        let mut req = self.files_request(&sb, Method::GET, "/download", path);
        if let Some(t) = timeout {
            req = req.timeout(t);
        }
        let result = match http::send(req, "download").await {
            Ok(resp) => resp
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| SandboxError::Decode(format!("download: {e}"))),
            Err(e) => Err(e),
        };
        self.observe(&sb, result).await
    }

    async fn list_files(&self, path: &str) -> Result<Vec<FileInfo>> {
        let sb = self.ensure().await?;
        let req = self.files_request(&sb, Method::GET, "", path);
        let result = match http::send(req, "list files").await {
            Ok(resp) => http::decode(resp, "list files").await,
            Err(e) => Err(e),
        };
        self.observe(&sb, result).await
    }

    async fn search_files(&self, path: &str, pattern: &str) -> Result<Vec<String>> {
        let sb = self.ensure().await?;
        let req = self
            .files_request(&sb, Method::GET, "/search", path)
            .query(&[("pattern", pattern)]);
        let result = match http::send(req, "search files").await {
            Ok(resp) => http::decode::<SearchResponse>(resp, "search files")
                .await
                .map(|r| r.files),
            Err(e) => Err(e),
        };
        self.observe(&sb, result).await
    }

    async fn get_preview_link(&self, port: u16) -> Result<PreviewLink> {
        let sb = self.ensure().await?;
        let req = self.http.request(
            Method::GET,
            &format!("/sandbox/{}/ports/{port}/preview-url", sb.id),
        );
        let result = match http::send(req, "preview link").await {
            Ok(resp) => http::decode(resp, "preview link").await,
            Err(e) => Err(e),
        };
        self.observe(&sb, result).await
    }

    async fn execute_command(&self, request: &ExecRequest) -> Result<ExecResult> {
        let sb = self.ensure().await?;
        let result = self
            .exec(&sb, &request.command, request.cwd.as_deref(), request.timeout)
            .await;
        self.observe(&sb, result).await
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        match self.sandbox_id() {
            Some(id) => self.teardown(id),
            None => info!("dispose before provisioning, nothing to tear down"),
        }
    }
}

impl DirectSandbox {
    /// Fire the delete request on the current runtime without awaiting it.
    fn teardown(&self, id: String) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(sandbox_id = %id, "no runtime available, sandbox left for provider cleanup");
            return;
        };
        let req = self.http.request(Method::DELETE, &format!("/sandbox/{id}"));
        handle.spawn(async move {
            match http::send(req, "delete sandbox").await {
                Ok(_) => info!(sandbox_id = %id, "sandbox disposed"),
                Err(e) => warn!(sandbox_id = %id, error = %e, "sandbox dispose failed"),
            }
        });
    }
}
