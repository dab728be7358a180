//! Remote session execution and workspace sync on top of a [`sandbox::Sandbox`].

pub mod alert;
pub mod buffer;
pub mod clean;
pub mod commands;
mod error;
pub mod fs;
pub mod js;
pub mod logs;
pub mod port;
pub mod preprocess;
pub mod shell;
pub mod terminal;
pub mod workspace;

pub use alert::{Alert, AlertKind, AlertSink, AlertSource, ChannelAlertSink, LogAlertSink};
pub use buffer::CommandBuffer;
pub use error::{WorkbenchError, WorkbenchResult};
pub use port::PortCatcher;
pub use shell::{
    AbortCallback, CommandOutput, Instrumentation, Shell, ShellBuilder, ShellConfig, ShellState,
};
pub use terminal::{MemoryTerminal, Terminal};
pub use workspace::{FileNode, NodeContent, NodeKind, Workspace};
