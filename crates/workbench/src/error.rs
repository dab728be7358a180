#[derive(Debug, thiserror::Error)]
pub enum WorkbenchError {
    #[error("sandbox error: {0}")]
    Sandbox(#[from] sandbox::SandboxError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Build-tool config that cannot be parsed as a module.
    #[error("{line}:{column}: {message}")]
    ConfigSyntax {
        line: usize,
        column: usize,
        message: String,
    },

    /// Config parsed but has a shape the patcher does not understand.
    #[error("unsupported config: {0}")]
    UnsupportedConfig(String),

    #[error("script fetch failed: {0}")]
    ScriptFetch(String),

    #[error("{0} is generated and locked")]
    Locked(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("`{command}` exited with {exit_code}: {output}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        output: String,
    },
}

impl WorkbenchError {
    /// Missing file or directory, on either side of the hybrid filesystem.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) | Self::Sandbox(sandbox::SandboxError::NotFound(_)) => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

pub type WorkbenchResult<T> = Result<T, WorkbenchError>;
