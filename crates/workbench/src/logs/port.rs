use std::sync::Arc;

use tracing::info;

use super::LogProcessor;
use crate::clean::strip_escapes;
use crate::port::PortCatcher;

const LOCALHOST: &str = "http://localhost:";

/// Feeds the port catcher with the port of the first
/// `http://localhost:<port>` URL in a chunk, ignoring terminal styling.
pub struct PortLogProcessor {
    ports: Arc<PortCatcher>,
}

impl PortLogProcessor {
    pub fn new(ports: Arc<PortCatcher>) -> Self {
        Self { ports }
    }
}

fn find_port(chunk: &str) -> Option<u16> {
    chunk.match_indices(LOCALHOST).find_map(|(at, _)| {
        let rest = chunk.get(at + LOCALHOST.len()..)?;
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        rest.get(..end)?.parse().ok()
    })
}

impl LogProcessor for PortLogProcessor {
    fn process(&self, chunk: &str) {
        if let Some(port) = find_port(&strip_escapes(chunk)) {
            info!(port, "dev server port detected");
            self.ports.put_new_port(port);
        }
    }
}
