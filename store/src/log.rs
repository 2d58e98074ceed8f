//! Append-only record log.
//!
//! Files are opened in append mode and never truncated. Each record is flushed before
//! [`RecordLog::append`] returns.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clockke_types::{RawRecord, TickRecord};

use crate::error::StoreError;

/// On-disk record encoding, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Csv,
    /// One JSON object per line.
    Jsonl,
}

impl RecordFormat {
    /// `.jsonl` and `.ndjson` are JSON lines; anything else is CSV.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("jsonl" | "ndjson") => Self::Jsonl,
            _ => Self::Csv,
        }
    }
}

enum LogWriter {
    Csv(csv::Writer<File>),
    Jsonl(BufWriter<File>),
}

pub struct RecordLog {
    path: PathBuf,
    format: RecordFormat,
    writer: LogWriter,
    appended: u64,
}

impl std::fmt::Debug for RecordLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordLog")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("appended", &self.appended)
            .finish_non_exhaustive()
    }
}

impl RecordLog {
    /// Open a log for a new chain. Refuses a file that already holds data.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let (file, empty) = open_append(path.as_ref())?;
        if !empty {
            return Err(StoreError::NotEmpty {
                path: path.as_ref().to_path_buf(),
            });
        }
        Self::from_file(path.as_ref(), file, true)
    }

    /// Open a log to continue the chain already stored in it.
    pub fn append_to(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let (file, empty) = open_append(path.as_ref())?;
        Self::from_file(path.as_ref(), file, empty)
    }

    fn from_file(path: &Path, file: File, write_header: bool) -> Result<Self, StoreError> {
        let format = RecordFormat::from_path(path);
        let writer = match format {
            RecordFormat::Csv => {
                LogWriter::Csv(csv::WriterBuilder::new().has_headers(false).from_writer(file))
            }
            RecordFormat::Jsonl => LogWriter::Jsonl(BufWriter::new(file)),
        };
        let mut log = Self {
            path: path.to_path_buf(),
            format,
            writer,
            appended: 0,
        };
        if write_header && let LogWriter::Csv(writer) = &mut log.writer {
            writer
                .write_record(RawRecord::COLUMNS)
                .map_err(|source| StoreError::Csv {
                    path: log.path.clone(),
                    source,
                })?;
            writer.flush().map_err(|source| StoreError::Write {
                path: log.path.clone(),
                source,
            })?;
        }
        tracing::debug!(path = %log.path.display(), ?format, "record log opened");
        Ok(log)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn format(&self) -> RecordFormat {
        self.format
    }

    /// Records appended through this handle.
    #[must_use]
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Append one record and flush it.
    pub fn append(&mut self, record: &TickRecord) -> Result<(), StoreError> {
        let raw = record.to_raw();
        match &mut self.writer {
            LogWriter::Csv(writer) => {
                let row = RawRecord::COLUMNS.map(|col| raw.field(col).unwrap_or(""));
                writer.write_record(row).map_err(|source| StoreError::Csv {
                    path: self.path.clone(),
                    source,
                })?;
                writer.flush().map_err(|source| StoreError::Write {
                    path: self.path.clone(),
                    source,
                })?;
            }
            LogWriter::Jsonl(writer) => {
                let line = json_line(record, &raw);
                serde_json::to_writer(&mut *writer, &line).map_err(|source| {
                    StoreError::Json {
                        path: self.path.clone(),
                        source,
                    }
                })?;
                writer
                    .write_all(b"\n")
                    .and_then(|()| writer.flush())
                    .map_err(|source| StoreError::Write {
                        path: self.path.clone(),
                        source,
                    })?;
            }
        }
        self.appended += 1;
        Ok(())
    }
}

// Integers stay JSON numbers; the score stays text so its committed form survives.
fn json_line(record: &TickRecord, raw: &RawRecord) -> serde_json::Value {
    let mut line = serde_json::json!({
        "tick_index": record.tick_index,
        "time_utc": raw.time_utc,
        "dt_ms": record.dt_ms,
        "a_out": raw.a_out,
        "band": raw.band,
        "stamp": raw.stamp,
    });
    if let (Some(payload), Some(map)) = (&raw.payload, line.as_object_mut()) {
        map.insert("payload".into(), payload.clone().into());
    }
    line
}

fn open_append(path: &Path) -> Result<(File, bool), StoreError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    let len = file
        .metadata()
        .map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?
        .len();
    Ok((file, len == 0))
}
