//! Workspace node model on top of the hybrid filesystem.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use base64::Engine as _;
use serde::Serialize;
use tracing::info;

use crate::error::{WorkbenchError, WorkbenchResult};
use crate::fs::{FileSystem, HybridFs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "encoding", content = "data", rename_all = "lowercase")]
pub enum NodeContent {
    Text(String),
    Base64(String),
}

impl NodeContent {
    fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::Text(text.to_string()),
            Err(_) => Self::Base64(base64::engine::general_purpose::STANDARD.encode(bytes)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub path: String,
    pub kind: NodeKind,
    pub content: Option<NodeContent>,
    /// Write issued but not yet confirmed by both stores.
    pub pending: bool,
    /// Generated by instrumentation; never user-editable or persisted.
    pub locked: bool,
}

/// Files the workbench knows about, keyed by path relative to the root.
pub struct Workspace {
    fs: HybridFs,
    nodes: Mutex<BTreeMap<String, FileNode>>,
}

impl Workspace {
    pub fn new(fs: HybridFs) -> Self {
        Self {
            fs,
            nodes: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn fs(&self) -> &HybridFs {
        &self.fs
    }

    fn nodes(&self) -> MutexGuard<'_, BTreeMap<String, FileNode>> {
        self.nodes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn node(&self, path: &str) -> Option<FileNode> {
        self.nodes().get(self.fs.relative(path)).cloned()
    }

    pub fn is_locked(&self, path: &str) -> bool {
        self.node(path).is_some_and(|n| n.locked)
    }

    /// Non-locked file nodes, for persisting project content.
    pub fn user_files(&self) -> Vec<FileNode> {
        self.nodes()
            .values()
            .filter(|n| n.kind == NodeKind::File && !n.locked)
            .cloned()
            .collect()
    }

    /// Write a user file. Generated files are refused.
    pub async fn write_file(&self, path: &str, content: &[u8]) -> WorkbenchResult<()> {
        if self.is_locked(path) {
            return Err(WorkbenchError::Locked(path.to_string()));
        }
        self.store(path, content, false).await
    }

    /// Write a generated file and mark it locked.
    pub async fn write_generated(&self, path: &str, content: &[u8]) -> WorkbenchResult<()> {
        self.store(path, content, true).await?;
        info!(path, "generated file written");
        Ok(())
    }

    async fn store(&self, path: &str, content: &[u8], locked: bool) -> WorkbenchResult<()> {
        let key = self.fs.relative(path).to_string();
        let previous = self.nodes().insert(
            key.clone(),
            FileNode {
                path: key.clone(),
                kind: NodeKind::File,
                content: Some(NodeContent::from_bytes(content)),
                pending: true,
                locked,
            },
        );
        if let Err(e) = self.fs.write_file(path, content).await {
            let mut nodes = self.nodes();
            match previous {
                Some(node) => nodes.insert(key, node),
                None => nodes.remove(&key),
            };
            return Err(e);
        }
        if let Some(node) = self.nodes().get_mut(&key) {
            node.pending = false;
        }
        Ok(())
    }

    pub async fn mkdir(&self, path: &str) -> WorkbenchResult<()> {
        self.fs.mkdir(path).await?;
        let key = self.fs.relative(path).to_string();
        self.nodes().insert(
            key.clone(),
            FileNode {
                path: key,
                kind: NodeKind::Folder,
                content: None,
                pending: false,
                locked: false,
            },
        );
        Ok(())
    }

    pub async fn read_file(&self, path: &str) -> WorkbenchResult<Vec<u8>> {
        self.fs.read_file(path).await
    }

    /// UTF-8 contents, or `None` when the file exists in neither store.
    pub async fn read_text(&self, path: &str) -> WorkbenchResult<Option<String>> {
        match self.fs.read_file(path).await {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn exists(&self, path: &str) -> WorkbenchResult<bool> {
        self.fs.exists(path).await
    }

    /// Remove a path and every node below it.
    pub async fn remove(&self, path: &str, recursive: bool) -> WorkbenchResult<()> {
        self.fs.remove(path, recursive).await?;
        let key = self.fs.relative(path).to_string();
        let nested = format!("{}/", key.trim_end_matches('/'));
        self.nodes()
            .retain(|p, _| p != &key && !p.starts_with(&nested));
        Ok(())
    }

    /// Refresh a file from the sandbox into the mirror only, e.g. build
    /// output that must not be uploaded again.
    pub async fn pull(&self, path: &str) -> WorkbenchResult<()> {
        let content = self.fs.pull(path).await?;
        let key = self.fs.relative(path).to_string();
        let mut nodes = self.nodes();
        let node = nodes.entry(key.clone()).or_insert_with(|| FileNode {
            path: key,
            kind: NodeKind::File,
            content: None,
            pending: false,
            locked: false,
        });
        node.content = Some(NodeContent::from_bytes(&content));
        Ok(())
    }
}
