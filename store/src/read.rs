//! Reading stored records back for verification.
//!
//! Nothing here interprets field values. A row that cannot be decoded becomes a
//! [`RawRecord`] with missing fields, so the verifier reports it in place instead of
//! the read aborting and hiding every later row.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use clockke_types::RawRecord;

use crate::error::StoreError;
use crate::log::RecordFormat;

/// Read every stored row in file order.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<RawRecord>, StoreError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    match RecordFormat::from_path(path) {
        RecordFormat::Csv => read_csv(path, file),
        RecordFormat::Jsonl => read_jsonl(path, file),
    }
}

fn read_csv(path: &Path, file: File) -> Result<Vec<RawRecord>, StoreError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(err) => return Err(csv_read_error(path, err)),
    };

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        match result {
            Ok(record) => {
                let mut raw = RawRecord::default();
                for (column, value) in headers.iter().zip(record.iter()) {
                    raw.set_field(column.trim(), value.to_string());
                }
                rows.push(raw);
            }
            Err(err) if err.is_io_error() => return Err(csv_read_error(path, err)),
            Err(err) => {
                tracing::warn!(row = idx + 1, "Undecodable CSV row in {:?}: {}", path, err);
                rows.push(RawRecord::default());
            }
        }
    }
    Ok(rows)
}

fn csv_read_error(path: &Path, err: csv::Error) -> StoreError {
    match err.into_kind() {
        csv::ErrorKind::Io(source) => StoreError::Read {
            path: path.to_path_buf(),
            source,
        },
        kind => StoreError::Read {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, format!("{kind:?}")),
        },
    }
}

fn read_jsonl(path: &Path, file: File) -> Result<Vec<RawRecord>, StoreError> {
    let mut reader = BufReader::new(file);
    let mut rows = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|source| StoreError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if read == 0 {
            break;
        }
        let Ok(line) = std::str::from_utf8(&buf) else {
            tracing::warn!(row = rows.len() + 1, "Non UTF-8 line in {:?}", path);
            rows.push(RawRecord::default());
            continue;
        };
        if line.trim().is_empty() {
            continue;
        }
        let row = rows.len() + 1;
        let raw = decode_json_line(line).unwrap_or_else(|| {
            tracing::warn!(row, "Undecodable JSON line in {:?}", path);
            RawRecord::default()
        });
        rows.push(raw);
    }
    Ok(rows)
}

fn decode_json_line(line: &str) -> Option<RawRecord> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    let object = value.as_object()?;
    let mut raw = RawRecord::default();
    for column in RawRecord::COLUMNS {
        let text = match object.get(column) {
            None | Some(serde_json::Value::Null) => continue,
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        raw.set_field(column, text);
    }
    Some(raw)
}
