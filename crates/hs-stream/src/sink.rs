// SPDX-License-Identifier: MIT OR Apache-2.0
//! Output sinks.

use anyhow::Result;
use hs_record::{Record, coerce_string};
use std::io::Write;
use std::sync::Mutex;

/// Consumes output records. Safe for concurrent use by multiple workers.
pub trait RecordSink: Send + Sync {
    /// Writes one record.
    fn write(&self, rec: &Record) -> Result<()>;
}

/// Writes records newline-terminated — strings as-is, everything else as
/// compact JSON — serialized under a mutex.
pub struct JsonLineSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonLineSink {
    /// Wraps a writer.
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        JsonLineSink {
            writer: Mutex::new(writer),
        }
    }
}

impl RecordSink for JsonLineSink {
    fn write(&self, rec: &Record) -> Result<()> {
        let line = coerce_string(rec);
        let mut w = self.writer.lock().expect("sink lock poisoned");
        w.write_all(line.as_bytes())?;
        w.write_all(b"\n")?;
        Ok(())
    }
}
