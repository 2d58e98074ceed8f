//! Record log round trips through the verifier

use std::fs;
use std::io::Write;

use clockke_core::{FailureKind, VerifyState, verify};
use clockke_store::{RecordLog, StoreError, read_records};
use tempfile::tempdir;

use crate::common::{crc32_manifest, default_manifest, run_opaque, run_ticks};

#[test]
fn csv_log_verifies() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stamps.csv");
    let manifest = default_manifest();
    let records = run_ticks(&manifest, &[1000, 1100, 900, 3000, 1000]);

    let mut log = RecordLog::create(&path).unwrap();
    for record in &records {
        log.append(record).unwrap();
    }

    let report = verify(&read_records(&path).unwrap(), &manifest);
    assert_eq!(report.state, VerifyState::Verified, "{}", report.render());
    assert_eq!(report.rows, records.len());
}

#[test]
fn jsonl_log_with_opaque_payloads_verifies() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stamps.jsonl");
    let manifest = crc32_manifest();
    let records = run_opaque(&manifest, 4);

    let mut log = RecordLog::create(&path).unwrap();
    for record in &records {
        log.append(record).unwrap();
    }

    let rows = read_records(&path).unwrap();
    assert_eq!(rows[0].payload.as_deref(), Some("7469636b2d30"));
    let report = verify(&rows, &manifest);
    assert_eq!(report.state, VerifyState::Verified, "{}", report.render());
}

#[test]
fn empty_log_is_an_empty_sequence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stamps.csv");
    drop(RecordLog::create(&path).unwrap());

    let report = verify(&read_records(&path).unwrap(), &default_manifest());
    assert_eq!(report.state, VerifyState::Empty);
    assert!(report.is_ok());
}

#[test]
fn new_chain_refuses_a_non_empty_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stamps.csv");
    fs::write(&path, "anything\n").unwrap();
    assert!(matches!(
        RecordLog::create(&path),
        Err(StoreError::NotEmpty { .. })
    ));
}

#[test]
fn garbage_line_is_reported_in_place() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stamps.jsonl");
    let manifest = default_manifest();
    let records = run_ticks(&manifest, &[1000; 3]);

    let mut log = RecordLog::create(&path).unwrap();
    log.append(&records[0]).unwrap();
    drop(log);
    fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .unwrap()
        .write_all(b"{oops\n")
        .unwrap();
    let mut log = RecordLog::append_to(&path).unwrap();
    log.append(&records[1]).unwrap();

    let report = verify(&read_records(&path).unwrap(), &manifest);
    let kinds: Vec<_> = report.failures.iter().map(|f| (f.row, f.kind)).collect();
    assert_eq!(
        kinds,
        vec![(2, FailureKind::MalformedRow), (3, FailureKind::ChainBroken)]
    );
    // Row 3 was stamped right after row 1; the garbage line sits between them
    assert_eq!(report.failures[1].locally_linked, Some(false));
}
