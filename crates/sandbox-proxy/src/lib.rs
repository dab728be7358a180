//! Sandbox backend that proxies every call through a backend gateway.
//!
//! Each operation becomes a `POST` of `{method, args, authToken, uuid}` to a
//! single gateway URL. The gateway owns the real provider credentials; this
//! client only carries the caller's auth token.

mod config;
mod protocol;
mod sandbox;

pub use config::ProxyConfig;
pub use protocol::{Method, RpcRequest};
pub use sandbox::ProxySandbox;
