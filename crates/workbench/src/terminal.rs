use std::sync::{Arc, Mutex, PoisonError};

/// Receives raw keystroke data from the terminal.
pub type DataHandler = Box<dyn Fn(&str) + Send + Sync>;

/// Terminal capability the engine writes to. Rendering is not ours.
pub trait Terminal: Send + Sync {
    fn write(&self, text: &str);
    fn on_data(&self, handler: DataHandler);
}

/// Terminal that keeps everything written to it. Input is injected with
/// [`MemoryTerminal::input`].
#[derive(Default, Clone)]
pub struct MemoryTerminal {
    output: Arc<Mutex<String>>,
    handlers: Arc<Mutex<Vec<DataHandler>>>,
}

impl MemoryTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> String {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn input(&self, data: &str) {
        let handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        for handler in handlers.iter() {
            handler(data);
        }
    }
}

impl Terminal for MemoryTerminal {
    fn write(&self, text: &str) {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_str(text);
    }

    fn on_data(&self, handler: DataHandler) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }
}
