//! Observers over freshly streamed log text.
//!
//! Log retrieval is not line-buffered: a chunk may end mid-line, and a line
//! may straddle two chunks. Processors look only at the chunk they are given.

mod misc;
mod port;
mod runtime;
mod vite;

pub use misc::MiscErrorProcessor;
pub use port::PortLogProcessor;
pub use runtime::{RUNTIME_ERROR_MARKER, RuntimeError, RuntimeErrorProcessor};
pub use vite::ViteErrorProcessor;

pub trait LogProcessor: Send + Sync {
    fn process(&self, chunk: &str);
}
