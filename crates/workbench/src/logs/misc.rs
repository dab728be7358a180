use std::sync::Arc;

use super::LogProcessor;
use crate::alert::{Alert, AlertSink};
use crate::clean::strip_escapes;

/// Raises an alert for each line carrying a bracketed error code such as
/// `[ERR_MODULE_NOT_FOUND]` or `[ERROR]`.
pub struct MiscErrorProcessor {
    alerts: Arc<dyn AlertSink>,
}

impl MiscErrorProcessor {
    pub fn new(alerts: Arc<dyn AlertSink>) -> Self {
        Self { alerts }
    }
}

/// First `[E...]` token made of uppercase letters, digits and underscores.
fn error_code(line: &str) -> Option<&str> {
    line.match_indices("[E").find_map(|(at, _)| {
        let rest = line.get(at + 1..)?;
        let end = rest.find(']')?;
        let code = rest.get(..end)?;
        let valid = code.len() >= 3
            && code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
        valid.then_some(code)
    })
}

impl LogProcessor for MiscErrorProcessor {
    fn process(&self, chunk: &str) {
        let plain = strip_escapes(chunk);
        for line in plain.lines() {
            if let Some(code) = error_code(line) {
                self.alerts
                    .raise(Alert::terminal_error(code, line.trim(), plain.trim()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::ChannelAlertSink;

    #[test]
    fn matches_bracketed_codes() {
        assert_eq!(
            error_code("Error [ERR_MODULE_NOT_FOUND]: Cannot find package"),
            Some("ERR_MODULE_NOT_FOUND")
        );
        assert_eq!(error_code("✘ [ERROR] Could not resolve"), Some("ERROR"));
        assert_eq!(error_code("[Eh] nope"), None);
        assert_eq!(error_code("[ERR_UNCLOSED"), None);
    }

    #[test]
    fn one_alert_per_matching_line() {
        let (sink, mut rx) = ChannelAlertSink::new();
        let processor = MiscErrorProcessor::new(Arc::new(sink));
        processor.process("ok\n[ERROR] one\nfine\n[ERR_X] two\n");
        assert_eq!(rx.try_recv().unwrap().title, "ERROR");
        assert_eq!(rx.try_recv().unwrap().description, "[ERR_X] two");
        assert!(rx.try_recv().is_err());
    }
}
