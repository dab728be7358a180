use std::io::Write;
use std::sync::{Mutex, PoisonError};

use tokio::io::AsyncReadExt;
use tracing::warn;
use workbench::Terminal;
use workbench::terminal::DataHandler;

/// Process stdio as a terminal. The tty echoes input itself.
#[derive(Default)]
pub struct StdioTerminal {
    handlers: Mutex<Vec<DataHandler>>,
}

impl StdioTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward stdin to the data handlers until end of input.
    pub async fn pump(&self) -> std::io::Result<()> {
        let mut stdin = tokio::io::stdin();
        let mut buf = [0u8; 4096];
        loop {
            let n = stdin.read(&mut buf).await?;
            let Some(chunk) = buf.get(..n).filter(|c| !c.is_empty()) else {
                return Ok(());
            };
            let data = String::from_utf8_lossy(chunk);
            let handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
            for handler in handlers.iter() {
                handler(&data);
            }
        }
    }
}

impl Terminal for StdioTerminal {
    fn write(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
            warn!(error = %e, "stdout write failed");
        }
    }

    fn on_data(&self, handler: DataHandler) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }
}
