use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use super::LogProcessor;
use crate::alert::{Alert, AlertSink};

/// Token the preview reporter prints before each JSON error payload.
pub const RUNTIME_ERROR_MARKER: &str = "[Runtime Error]";

/// Error payload produced by the preview reporter script.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuntimeError {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub source: String,
    pub lineno: u32,
    pub colno: u32,
    pub stack: String,
}

impl RuntimeError {
    fn location(&self) -> String {
        format!("{}:{}:{}", self.source, self.lineno, self.colno)
    }
}

/// Decodes runtime errors reported from the preview and raises them as
/// preview alerts.
pub struct RuntimeErrorProcessor {
    alerts: Arc<dyn AlertSink>,
}

impl RuntimeErrorProcessor {
    pub fn new(alerts: Arc<dyn AlertSink>) -> Self {
        Self { alerts }
    }
}

/// Extent of the JSON object starting at the first `{` of `text`, honouring
/// string literals and escapes. `None` when the object is unterminated.
fn object_extent(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let body = text.get(start..)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return body.get(..=i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Every payload following a marker in `chunk`.
pub(crate) fn decode_all(chunk: &str) -> Vec<RuntimeError> {
    let mut errors = Vec::new();
    for (at, _) in chunk.match_indices(RUNTIME_ERROR_MARKER) {
        let Some(rest) = chunk.get(at + RUNTIME_ERROR_MARKER.len()..) else {
            continue;
        };
        let Some(json) = object_extent(rest) else {
            continue;
        };
        match serde_json::from_str::<RuntimeError>(json) {
            Ok(error) => errors.push(error),
            Err(e) => warn!(error = %e, "undecodable runtime error payload"),
        }
    }
    errors
}

impl LogProcessor for RuntimeErrorProcessor {
    fn process(&self, chunk: &str) {
        for error in decode_all(chunk) {
            let content = if error.stack.is_empty() {
                error.location()
            } else {
                format!("{}\n{}", error.location(), error.stack)
            };
            self.alerts
                .raise(Alert::preview_error("Runtime Error", error.message, content));
        }
    }
}
