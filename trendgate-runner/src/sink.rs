//! Order intent sinks.
//!
//! The engine only emits intents; what happens to them is the sink's business.
//! [`JsonlSink`] writes one JSON object per line, [`MemorySink`] keeps them for
//! inspection.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use trendgate_core::domain::OrderIntent;

use crate::error::RunnerError;

pub trait OrderSink {
    fn submit(&mut self, order: &OrderIntent) -> Result<(), RunnerError>;

    fn flush(&mut self) -> Result<(), RunnerError> {
        Ok(())
    }
}

/// Append-only JSON Lines file.
pub struct JsonlSink {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl JsonlSink {
    /// Create (or truncate) `path`, creating parent directories as needed.
    pub fn create(path: &Path) -> Result<Self, RunnerError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| RunnerError::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| RunnerError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl OrderSink for JsonlSink {
    fn submit(&mut self, order: &OrderIntent) -> Result<(), RunnerError> {
        serde_json::to_writer(&mut self.writer, order)?;
        self.writer
            .write_all(b"\n")
            .map_err(|e| RunnerError::io(&self.path, e))?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RunnerError> {
        self.writer
            .flush()
            .map_err(|e| RunnerError::io(&self.path, e))
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    pub orders: Vec<OrderIntent>,
}

impl OrderSink for MemorySink {
    fn submit(&mut self, order: &OrderIntent) -> Result<(), RunnerError> {
        self.orders.push(order.clone());
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl OrderSink for NullSink {
    fn submit(&mut self, _order: &OrderIntent) -> Result<(), RunnerError> {
        Ok(())
    }
}

/// Read back a JSON Lines intent file.
pub fn read_jsonl(path: &Path) -> Result<Vec<OrderIntent>, RunnerError> {
    let content = fs::read_to_string(path).map_err(|e| RunnerError::io(path, e))?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(RunnerError::from))
        .collect()
}
