//! JSON-lines event log.
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use eyre::WrapErr;
use serde::Serialize;

use crate::events::{DeviceEvent, RuntimeRecord};
use crate::ports::EventLog;

#[derive(Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum Line<'a> {
    Event(&'a DeviceEvent),
    Runtime(&'a RuntimeRecord),
}

/// Appends one JSON object per record to a file.
pub struct JsonlEventLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn append(&self, line: &Line<'_>) -> eyre::Result<()> {
        let json = serde_json::to_string(line)?;
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .wrap_err_with(|| format!("open event log {}", self.path.display()))?;
        writeln!(file, "{json}").wrap_err("append event log")?;
        Ok(())
    }
}

impl EventLog for JsonlEventLog {
    fn record_event(&self, event: &DeviceEvent) -> eyre::Result<()> {
        self.append(&Line::Event(event))
    }

    fn record_runtime(&self, record: &RuntimeRecord) -> eyre::Result<()> {
        self.append(&Line::Runtime(record))
    }
}
