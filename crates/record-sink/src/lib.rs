//! Append-only record sinks.
//!
//! Analysis output is handed to an [`AppendSink`] one JSON object at a time.
//! Sinks never rewrite what they already accepted. Lines become durable on
//! [`AppendSink::flush`]; [`AppendSink::discard`] drops everything appended
//! since, so a page that fails halfway leaves nothing behind.

pub mod errors;
pub mod memory;
pub mod writer;

use serde::Serialize;
use serde_json::Value;

pub use errors::{SinkError, SinkErrorKind};
pub use memory::MemorySink;
pub use writer::{JsonLinesSink, OpenMode};

pub trait AppendSink: Send {
    fn append_json(&mut self, record: &Value) -> Result<(), SinkError>;
    fn flush(&mut self) -> Result<(), SinkError>;
    /// Forget lines appended since the last flush.
    fn discard(&mut self);
}

/// Serialize `record` and append it to `sink`.
pub fn append<S, T>(sink: &mut S, record: &T) -> Result<(), SinkError>
where
    S: AppendSink + ?Sized,
    T: Serialize,
{
    let value = serde_json::to_value(record)?;
    sink.append_json(&value)
}

impl<S: AppendSink + ?Sized> AppendSink for Box<S> {
    fn append_json(&mut self, record: &Value) -> Result<(), SinkError> {
        (**self).append_json(record)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }

    fn discard(&mut self) {
        (**self).discard()
    }
}
