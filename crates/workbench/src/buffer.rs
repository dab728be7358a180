//! Keystrokes to commands.

use std::sync::{Arc, Mutex, PoisonError};

use crate::terminal::Terminal;

/// Navigation and function-key sequences, matched against whole data events.
const IGNORED_SEQUENCES: &[&str] = &[
    "\x1b[A", "\x1b[B", "\x1b[C", "\x1b[D", // arrows
    "\x1b[5~", "\x1b[6~", // page up/down
    "\x1b[H", "\x1b[F", "\x1b[1~", "\x1b[4~", "\x1bOH", "\x1bOF", // home/end
    "\x1bOP", "\x1bOQ", "\x1bOR", "\x1bOS", // F1-F4
    "\x1b[15~", "\x1b[17~", "\x1b[18~", "\x1b[19~", "\x1b[20~", "\x1b[21~", "\x1b[23~",
    "\x1b[24~", // F5-F12
    "\x1b[Z", // shift-tab
];

const ERASE: &str = "\x08 \x08";

pub type CommandHandler = Box<dyn Fn(String) + Send + Sync>;

/// Accumulates keystrokes and dispatches a command on Enter.
pub struct CommandBuffer {
    terminal: Arc<dyn Terminal>,
    on_command: CommandHandler,
    echo: bool,
    line: Mutex<String>,
}

impl CommandBuffer {
    pub fn new(terminal: Arc<dyn Terminal>, on_command: CommandHandler) -> Self {
        Self {
            terminal,
            on_command,
            echo: true,
            line: Mutex::new(String::new()),
        }
    }

    /// For terminals that echo input themselves.
    pub fn without_echo(mut self) -> Self {
        self.echo = false;
        self
    }

    /// Feed every data event of the terminal into this buffer.
    pub fn attach(self: &Arc<Self>) {
        let buffer = Arc::clone(self);
        self.terminal
            .on_data(Box::new(move |data| buffer.handle(data)));
    }

    fn echo(&self, text: &str) {
        if self.echo {
            self.terminal.write(text);
        }
    }

    pub fn handle(&self, data: &str) {
        if IGNORED_SEQUENCES.contains(&data) {
            return;
        }
        let mut ready = Vec::new();
        {
            let mut line = self.line.lock().unwrap_or_else(PoisonError::into_inner);
            for c in data.chars() {
                match c {
                    '\x7f' | '\x08' => {
                        if line.pop().is_some() {
                            self.echo(ERASE);
                        }
                    }
                    '\r' | '\n' => {
                        self.echo("\r\n");
                        if !line.is_empty() {
                            ready.push(std::mem::take(&mut *line));
                        }
                    }
                    _ => {
                        self.echo(c.encode_utf8(&mut [0; 4]));
                        line.push(c);
                    }
                }
            }
        }
        for command in ready {
            (self.on_command)(command);
        }
    }
}
