#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Non-2xx response from the provider or gateway.
    #[error("request failed ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),

    /// The sandbox itself no longer exists on the remote side. Backends reset
    /// their provisioning state when they see this.
    #[error("sandbox gone: {0}")]
    SandboxGone(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("sandbox disposed")]
    Disposed,

    #[error("provisioning failed: {0}")]
    ProvisionFailed(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SandboxError {
    pub fn is_gone(&self) -> bool {
        matches!(self, Self::SandboxGone(_))
    }

    /// Classify a non-2xx response. `status` is the display form of the
    /// status line (e.g. "404 Not Found").
    pub fn from_status(code: u16, status: &str, what: &str, body: &str) -> Self {
        let mentions_sandbox = body.to_ascii_lowercase().contains("sandbox");
        if code == 410 || (code == 404 && mentions_sandbox) {
            return Self::SandboxGone(format!("{what} {status}: {body}"));
        }
        if code == 404 {
            return Self::NotFound(format!("{what}: {body}"));
        }
        Self::Http {
            status: code,
            message: format!("{what} {status}: {body}"),
        }
    }
}


pub type Result<T> = std::result::Result<T, SandboxError>;
