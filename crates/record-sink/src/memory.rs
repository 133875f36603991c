use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::errors::SinkError;
use crate::AppendSink;

/// In-memory sink; clones share the same line buffer.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<Value>>>,
    flushed: Arc<Mutex<usize>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<Value> {
        self.lines.lock().clone()
    }

    /// Number of lines covered by the last flush.
    pub fn flushed(&self) -> usize {
        *self.flushed.lock()
    }
}

impl AppendSink for MemorySink {
    fn append_json(&mut self, record: &Value) -> Result<(), SinkError> {
        self.lines.lock().push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        let count = self.lines.lock().len();
        *self.flushed.lock() = count;
        Ok(())
    }

    fn discard(&mut self) {
        let flushed = *self.flushed.lock();
        self.lines.lock().truncate(flushed);
    }
}
