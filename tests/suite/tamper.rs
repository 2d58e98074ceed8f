//! Tamper evidence: edits, reorders and deletions of stored rows

use clockke_core::{FailureKind, StampChain, VerifyReport, VerifyState, verify};
use clockke_types::{HashKind, Manifest, RawRecord};

use crate::common::{crc32_manifest, default_manifest, run_opaque, run_ticks, to_rows, ts};

/// Row `k` (1-based) is the first failure and every row after it fails too.
fn assert_fails_from(report: &VerifyReport, k: usize, kind: FailureKind) {
    assert_eq!(report.state, VerifyState::Invalid);
    let first = report.first_failure().unwrap();
    assert_eq!((first.row, first.kind), (k, kind), "{}", report.render());

    let rows: Vec<usize> = report.failures.iter().map(|f| f.row).collect();
    let expected: Vec<usize> = (k..=report.rows).collect();
    assert_eq!(rows, expected, "{}", report.render());
    for failure in &report.failures[1..] {
        assert_eq!(failure.kind, FailureKind::ChainBroken);
        assert_eq!(failure.downstream_of, Some(k));
    }
}

fn opaque_rows(n: usize) -> (Vec<RawRecord>, Manifest) {
    let manifest = default_manifest();
    let rows = to_rows(&run_opaque(&manifest, n));
    (rows, (*manifest).clone())
}

#[test]
fn edited_payload_breaks_chain() {
    let (mut rows, manifest) = opaque_rows(8);
    rows[3].payload = Some(hex_of("tick-X"));
    assert_fails_from(&verify(&rows, &manifest), 4, FailureKind::ChainBroken);
}

#[test]
fn edited_time_breaks_chain() {
    let (mut rows, manifest) = opaque_rows(8);
    rows[2].time_utc = Some(ts(2).canonical().replace(":02Z", ":03Z"));
    assert_fails_from(&verify(&rows, &manifest), 3, FailureKind::ChainBroken);
}

#[test]
fn edited_stamp_breaks_chain() {
    let (mut rows, manifest) = opaque_rows(8);
    let mut stamp = rows[5].stamp.clone().unwrap();
    let flipped = if stamp.ends_with('0') { '1' } else { '0' };
    stamp.pop();
    stamp.push(flipped);
    rows[5].stamp = Some(stamp);

    let report = verify(&rows, &manifest);
    assert_fails_from(&report, 6, FailureKind::ChainBroken);
    let first = report.first_failure().unwrap();
    assert_ne!(first.stored, first.expected);
    assert!(report.render().contains("expected: "));
}

#[test]
fn edited_score_within_band_breaks_derived_chain() {
    let manifest = default_manifest();
    let mut rows = to_rows(&run_ticks(&manifest, &[1000; 6]));
    // +0.020000000 and +0.030000000 are both band C
    rows[1].a_out = Some("+0.030000000".into());
    assert_fails_from(&verify(&rows, &manifest), 2, FailureKind::ChainBroken);
}

#[test]
fn edited_band_is_caught_before_the_chain() {
    let manifest = default_manifest();
    let mut rows = to_rows(&run_ticks(&manifest, &[1000; 4]));
    rows[0].band = Some("B".into());
    assert_fails_from(&verify(&rows, &manifest), 1, FailureKind::BandMismatch);
}

#[test]
fn swapped_rows_break_chain() {
    let (mut rows, manifest) = opaque_rows(6);
    rows.swap(2, 3);
    assert_fails_from(&verify(&rows, &manifest), 3, FailureKind::ChainBroken);
}

#[test]
fn deleted_row_breaks_chain_and_later_rows_stay_locally_linked() {
    let (mut rows, manifest) = opaque_rows(6);
    rows.remove(2);
    let report = verify(&rows, &manifest);
    assert_fails_from(&report, 3, FailureKind::ChainBroken);
    for failure in &report.failures[1..] {
        assert_eq!(failure.locally_linked, Some(true));
    }
}

#[test]
fn truncated_tail_still_verifies_with_an_earlier_head() {
    let (rows, manifest) = opaque_rows(6);
    let full = verify(&rows, &manifest);
    let prefix = verify(&rows[..4], &manifest);
    assert_eq!(prefix.state, VerifyState::Verified);
    assert_ne!(prefix.tail.unwrap().head, full.tail.unwrap().head);
}

#[test]
fn reversed_time_is_reported_even_when_the_stamp_recomputes() {
    let manifest = crc32_manifest();
    let times = [ts(0), ts(5), ts(3), ts(6)];
    let mut chain = StampChain::new(HashKind::Crc32);
    let rows: Vec<RawRecord> = times
        .iter()
        .enumerate()
        .map(|(i, time)| {
            let payload = format!("p{i}");
            let stamp = chain.emit(payload.as_bytes(), &time.canonical());
            RawRecord {
                tick_index: Some((i + 1).to_string()),
                time_utc: Some(time.canonical()),
                dt_ms: Some("1000".into()),
                a_out: Some("+0.020000000".into()),
                band: Some("C".into()),
                stamp: Some(stamp.to_hex()),
                payload: Some(hex_of(&payload)),
            }
        })
        .collect();

    let report = verify(&rows, &manifest);
    assert_eq!(report.failures.len(), 1, "{}", report.render());
    let failure = &report.failures[0];
    assert_eq!((failure.row, failure.kind), (3, FailureKind::TimestampReversal));
    assert_eq!(failure.downstream_of, None);
}

#[test]
fn malformed_row_counts_as_a_break() {
    let (mut rows, manifest) = opaque_rows(5);
    rows[1].stamp = Some("not-hex".into());
    assert_fails_from(&verify(&rows, &manifest), 2, FailureKind::MalformedRow);
}

fn hex_of(text: &str) -> String {
    text.bytes().map(|b| format!("{b:02x}")).collect()
}
