//! Sandbox backend that talks to the remote provider's REST API directly.
//!
//! The container is provisioned on the first operation, a package-manager
//! toolchain is installed once, and every relative path is resolved against
//! the sandbox's home directory.

mod config;
mod http;
mod sandbox;
mod wire;

pub use config::DirectConfig;
pub use sandbox::DirectSandbox;
