#![allow(dead_code, clippy::unwrap_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use sandbox::Sandbox;
use sandbox::testing::{MemorySandbox, SandboxEvent};
use tempfile::TempDir;
use workbench::fs::{HybridFs, LocalFs, SandboxFs};
use workbench::{MemoryTerminal, ShellBuilder, Shell, ShellConfig, Workspace};

pub const ORIGIN: &str = "https://app.example.com";

pub fn fast_config() -> ShellConfig {
    ShellConfig {
        poll_interval: Duration::from_millis(10),
        log_timeout: None,
    }
}

pub fn builder(sandbox: &Arc<MemorySandbox>) -> (ShellBuilder, MemoryTerminal) {
    let terminal = MemoryTerminal::new();
    let sandbox: Arc<dyn Sandbox> = sandbox.clone();
    let builder = Shell::builder(sandbox, Arc::new(terminal.clone())).config(fast_config());
    (builder, terminal)
}

/// Workspace whose local mirror lives in a fresh temp dir.
pub fn workspace(sandbox: &Arc<MemorySandbox>) -> (Arc<Workspace>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let remote: Arc<dyn Sandbox> = sandbox.clone();
    let fs = HybridFs::new(LocalFs::new(dir.path()), SandboxFs::new(remote));
    (Arc::new(Workspace::new(fs)), dir)
}

pub fn created_sessions(sandbox: &MemorySandbox) -> Vec<String> {
    sandbox
        .events()
        .into_iter()
        .filter_map(|e| match e {
            SandboxEvent::CreateSession(id) => Some(id),
            _ => None,
        })
        .collect()
}

pub fn position(sandbox: &MemorySandbox, event: &SandboxEvent) -> usize {
    sandbox
        .events()
        .iter()
        .position(|e| e == event)
        .unwrap_or_else(|| panic!("{event:?} not recorded"))
}

/// Wait (in paused test time) until `cond` holds.
pub async fn eventually(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never became true");
}
