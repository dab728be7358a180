use std::sync::Arc;

use super::LogProcessor;
use crate::alert::{Alert, AlertSink};
use crate::clean::strip_escapes;

const MARKERS: &[&str] = &["[vite]", "vite:", "[plugin:vite", "vite v"];

/// Raises one "Build Error" alert per chunk whose lines mention an error
/// together with a Vite marker.
pub struct ViteErrorProcessor {
    alerts: Arc<dyn AlertSink>,
}

impl ViteErrorProcessor {
    pub fn new(alerts: Arc<dyn AlertSink>) -> Self {
        Self { alerts }
    }
}

fn is_vite_error(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.contains("error") && MARKERS.iter().any(|m| lower.contains(m))
}

impl LogProcessor for ViteErrorProcessor {
    fn process(&self, chunk: &str) {
        let plain = strip_escapes(chunk);
        if let Some(line) = plain.lines().find(|l| is_vite_error(l)) {
            self.alerts.raise(Alert::terminal_error(
                "Build Error",
                line.trim(),
                plain.trim(),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::ChannelAlertSink;

    #[test]
    fn raises_once_per_chunk() {
        let (sink, mut rx) = ChannelAlertSink::new();
        let processor = ViteErrorProcessor::new(Arc::new(sink));
        processor.process(
            "\x1b[31m[vite] Internal server error: Failed to resolve import\x1b[0m\n[vite] error again\n",
        );
        let alert = rx.try_recv().unwrap();
        assert_eq!(alert.title, "Build Error");
        assert_eq!(
            alert.description,
            "[vite] Internal server error: Failed to resolve import"
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn needs_both_error_and_marker() {
        let (sink, mut rx) = ChannelAlertSink::new();
        let processor = ViteErrorProcessor::new(Arc::new(sink));
        processor.process("[vite] hmr update /src/App.tsx\n");
        processor.process("error: something unrelated\n");
        assert!(rx.try_recv().is_err());
    }
}
