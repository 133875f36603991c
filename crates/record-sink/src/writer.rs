use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{SinkError, SinkErrorKind};
use crate::AppendSink;

/// How an existing output file is treated when the sink opens it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OpenMode {
    /// Keep existing lines and append after them.
    #[default]
    Append,
    /// Start the file empty, then append.
    Fresh,
}

/// Newline-delimited JSON file sink. Lines are only ever appended.
///
/// Appended lines wait in memory until `flush`, which writes them with a
/// single `write_all` and syncs the file.
pub struct JsonLinesSink {
    path: PathBuf,
    file: File,
    pending: Vec<u8>,
    pending_lines: u64,
    lines: u64,
}

impl JsonLinesSink {
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let open_err = |source: std::io::Error| {
            SinkError::new(SinkErrorKind::Open {
                path: path.clone(),
                source,
            })
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(open_err)?;
        }
        if mode == OpenMode::Fresh {
            File::create(&path).map_err(open_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(open_err)?;
        debug!(target: "record-sink", path = %path.display(), ?mode, "sink opened");
        Ok(Self {
            path,
            file,
            pending: Vec::new(),
            pending_lines: 0,
            lines: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines written to the file through this handle.
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Lines appended but not yet flushed.
    pub fn pending_lines(&self) -> u64 {
        self.pending_lines
    }

    fn write_pending(&mut self) -> Result<(), SinkError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let lines = std::mem::take(&mut self.pending_lines);
        let written = self
            .file
            .write_all(&self.pending)
            .map_err(|err| SinkError::new(SinkErrorKind::Write(err)));
        self.pending.clear();
        written?;
        self.lines += lines;
        Ok(())
    }
}

impl AppendSink for JsonLinesSink {
    fn append_json(&mut self, record: &Value) -> Result<(), SinkError> {
        let line = serde_json::to_vec(record)?;
        self.pending.extend_from_slice(&line);
        self.pending.push(b'\n');
        self.pending_lines += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.write_pending()?;
        self.file
            .sync_data()
            .map_err(|err| SinkError::new(SinkErrorKind::Flush(err)))
    }

    fn discard(&mut self) {
        if self.pending_lines > 0 {
            debug!(
                target: "record-sink",
                path = %self.path.display(),
                lines = self.pending_lines,
                "unflushed lines discarded"
            );
        }
        self.pending.clear();
        self.pending_lines = 0;
    }
}

impl Drop for JsonLinesSink {
    fn drop(&mut self) {
        let _ = self.write_pending();
    }
}
