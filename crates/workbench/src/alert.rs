//! Structured alerts emitted to the surrounding application.
//!
//! Alerts are fire-and-forget: no acknowledgement and no de-duplication.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Error,
    Preview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSource {
    Terminal,
    Preview,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub title: String,
    pub description: String,
    pub content: String,
    pub source: AlertSource,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        kind: AlertKind,
        source: AlertSource,
        title: impl Into<String>,
        description: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            title: title.into(),
            description: description.into(),
            content: content.into(),
            source,
            raised_at: Utc::now(),
        }
    }

    /// Error surfaced from terminal output.
    pub fn terminal_error(
        title: impl Into<String>,
        description: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(AlertKind::Error, AlertSource::Terminal, title, description, content)
    }

    /// Uncaught error reported by the running preview page.
    pub fn preview_error(
        title: impl Into<String>,
        description: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(AlertKind::Preview, AlertSource::Preview, title, description, content)
    }
}

pub trait AlertSink: Send + Sync {
    fn raise(&self, alert: Alert);
}

/// Forwards alerts to an unbounded channel consumed by the application.
#[derive(Clone)]
pub struct ChannelAlertSink {
    tx: mpsc::UnboundedSender<Alert>,
}

impl ChannelAlertSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Alert>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AlertSink for ChannelAlertSink {
    fn raise(&self, alert: Alert) {
        if self.tx.send(alert).is_err() {
            warn!("alert receiver dropped");
        }
    }
}

/// Logs alerts instead of delivering them anywhere.
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn raise(&self, alert: Alert) {
        error!(
            kind = ?alert.kind,
            source = ?alert.source,
            title = %alert.title,
            "{}",
            alert.description
        );
    }
}
