mod config;
mod error;
pub mod path;
mod sandbox;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod types;

pub use config::{DEFAULT_TOOLCHAIN_INSTALL, ProvisionConfig, ResourceLimits};
pub use error::{Result, SandboxError};
pub use sandbox::Sandbox;
pub use types::{
    ExecRequest, ExecResult, FileInfo, PreviewLink, SessionCommand, SessionExecuteRequest,
    SessionExecuteResponse,
};
