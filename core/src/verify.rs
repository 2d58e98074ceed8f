//! Independent re-derivation of a stored record sequence.
//!
//! Every row is checked in a fixed order and the first failing check is the row's
//! reason: structure, range, band, chain, then time order. Once the chain breaks (or a
//! row cannot be parsed at all), every later row fails as downstream of that row. For
//! those rows `locally_linked` says whether the stored stamp still follows from the
//! stored stamp just before it, which tells a deleted or reordered row apart from an
//! edited one.
//!
//! Verification never repairs or re-stamps anything.

use std::fmt::{self, Write as _};

use clockke_types::{HashKind, Manifest, Payload, RawRecord, Stamp, UtcTimestamp};

use crate::band::classify;
use crate::session::ChainTail;
use crate::stamp::compute_stamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    MalformedRow,
    AlphaViolation,
    BandMismatch,
    ChainBroken,
    TimestampReversal,
}

impl FailureKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MalformedRow => "MalformedRow",
            Self::AlphaViolation => "AlphaViolation",
            Self::BandMismatch => "BandMismatch",
            Self::ChainBroken => "ChainBroken",
            Self::TimestampReversal => "TimestampReversal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyState {
    /// No rows seen.
    Empty,
    /// Rows seen, none failed yet.
    Building,
    Verified,
    Invalid,
}

/// One failing row. Row numbers are 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFailure {
    pub row: usize,
    pub kind: FailureKind,
    pub detail: String,
    /// Row where the chain first broke, for rows after it.
    pub downstream_of: Option<usize>,
    pub locally_linked: Option<bool>,
    pub stored: Option<Stamp>,
    pub expected: Option<Stamp>,
}

impl RowFailure {
    fn new(row: usize, kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            row,
            kind,
            detail: detail.into(),
            downstream_of: None,
            locally_linked: None,
            stored: None,
            expected: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifyReport {
    pub state: VerifyState,
    pub rows: usize,
    pub manifest_id: String,
    pub hash: HashKind,
    /// Last row of a verified chain.
    pub tail: Option<ChainTail>,
    pub failures: Vec<RowFailure>,
}

impl VerifyReport {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self.state, VerifyState::Verified | VerifyState::Empty)
    }

    #[must_use]
    pub fn first_failure(&self) -> Option<&RowFailure> {
        self.failures.first()
    }

    /// Human-readable report, one line per failing row.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        match self.state {
            VerifyState::Empty => out.push_str("VERIFIED rows=0 (empty sequence)"),
            VerifyState::Verified | VerifyState::Building => {
                let head = self
                    .tail
                    .as_ref()
                    .map_or_else(String::new, |tail| tail.head.to_hex());
                let _ = write!(
                    out,
                    "VERIFIED rows={} manifest={} hash={} head={head}",
                    self.rows, self.manifest_id, self.hash
                );
            }
            VerifyState::Invalid => {
                for (idx, failure) in self.failures.iter().enumerate() {
                    if idx > 0 {
                        out.push('\n');
                    }
                    render_failure(&mut out, failure, idx == 0);
                }
            }
        }
        out
    }
}

fn render_failure(out: &mut String, failure: &RowFailure, first: bool) {
    if first {
        let _ = write!(
            out,
            "INVALID row={} reason={}: {}",
            failure.row, failure.kind, failure.detail
        );
    } else if let Some(origin) = failure.downstream_of {
        let _ = write!(
            out,
            "  row={} reason={} downstream_of={origin} locally_linked={}",
            failure.row,
            failure.kind,
            failure.locally_linked.unwrap_or(false)
        );
    } else {
        let _ = write!(
            out,
            "  row={} reason={}: {}",
            failure.row, failure.kind, failure.detail
        );
    }
    if let (Some(stored), Some(expected)) = (&failure.stored, &failure.expected) {
        let _ = write!(out, "\n    stored:   {stored}\n    expected: {expected}");
    }
}

/// A stored row that passed structural checks.
struct ParsedRow<'r> {
    time_text: &'r str,
    time: UtcTimestamp,
    dt_ms: i64,
    a_out: f64,
    band: &'r str,
    stamp: Stamp,
    payload: Vec<u8>,
}

fn required<'r>(raw: &'r RawRecord, column: &str) -> Result<&'r str, String> {
    match raw.field(column) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(format!("missing {column}")),
    }
}

fn parse_row(raw: &RawRecord, kind: HashKind) -> Result<ParsedRow<'_>, String> {
    let time_text = required(raw, "time_utc")?;
    let time = UtcTimestamp::parse_canonical(time_text).map_err(|e| e.to_string())?;

    let dt_text = required(raw, "dt_ms")?;
    let dt_ms = dt_text
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("dt_ms {dt_text:?} is not an integer"))?;

    let a_text = required(raw, "a_out")?;
    let a_out = a_text
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("a_out {a_text:?} is not a number"))?;

    let band = required(raw, "band")?;
    let stamp_text = required(raw, "stamp")?;
    let stamp = Stamp::parse(stamp_text, kind).map_err(|e| e.to_string())?;
    // Stored hex is canonical lowercase; any other spelling is an edit
    if stamp.to_hex() != stamp_text {
        return Err(format!("stamp {stamp_text:?} is not canonical lowercase hex"));
    }

    let payload = match raw.payload.as_deref().filter(|text| !text.trim().is_empty()) {
        None => Payload::derived_bytes(time_text, a_text, band),
        Some(hex_text) => {
            let bytes = hex::decode(hex_text).map_err(|e| format!("payload: {e}"))?;
            if hex::encode(&bytes) != hex_text {
                return Err(format!("payload {hex_text:?} is not canonical lowercase hex"));
            }
            bytes
        }
    };

    Ok(ParsedRow {
        time_text,
        time,
        dt_ms,
        a_out,
        band,
        stamp,
        payload,
    })
}

/// Range and band checks.
fn check_values(row: &ParsedRow<'_>, manifest: &Manifest) -> Option<(FailureKind, String)> {
    if row.dt_ms < 0 {
        return Some((
            FailureKind::AlphaViolation,
            format!("dt_ms {} is negative", row.dt_ms),
        ));
    }
    if !(row.a_out > -1.0 && row.a_out < 1.0) {
        return Some((
            FailureKind::AlphaViolation,
            format!("a_out {} is outside (-1, 1)", row.a_out),
        ));
    }
    let expected = classify(row.a_out, manifest);
    if expected != row.band {
        return Some((
            FailureKind::BandMismatch,
            format!(
                "band {:?} but a_out {} classifies as {expected:?}",
                row.band, row.a_out
            ),
        ));
    }
    None
}

/// Streaming verifier. Feed rows in stored order with [`Verifier::push`].
#[derive(Debug)]
pub struct Verifier<'m> {
    manifest: &'m Manifest,
    kind: HashKind,
    rows: usize,
    /// Recomputed head while the chain is intact.
    running: Stamp,
    /// Stored stamp of the previous row, if it parsed.
    prev_stored: Option<Stamp>,
    last_time: Option<UtcTimestamp>,
    broken_at: Option<usize>,
    tail: Option<ChainTail>,
    failures: Vec<RowFailure>,
}

impl<'m> Verifier<'m> {
    #[must_use]
    pub fn new(manifest: &'m Manifest) -> Self {
        let kind = manifest.stamp_hash();
        Self {
            manifest,
            kind,
            rows: 0,
            running: Stamp::genesis(kind),
            prev_stored: None,
            last_time: None,
            broken_at: None,
            tail: None,
            failures: Vec::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> VerifyState {
        if self.rows == 0 {
            VerifyState::Empty
        } else if self.failures.is_empty() {
            VerifyState::Building
        } else {
            VerifyState::Invalid
        }
    }

    pub fn push(&mut self, raw: &RawRecord) {
        self.rows += 1;
        let row = self.rows;

        let parsed = match parse_row(raw, self.kind) {
            Ok(parsed) => parsed,
            Err(detail) => {
                let mut failure = RowFailure::new(row, FailureKind::MalformedRow, detail);
                if let Some(origin) = self.broken_at {
                    failure.downstream_of = Some(origin);
                    failure.locally_linked = Some(false);
                } else {
                    self.broken_at = Some(row);
                }
                self.failures.push(failure);
                self.prev_stored = raw
                    .stamp
                    .as_deref()
                    .and_then(|text| Stamp::parse(text, self.kind).ok());
                self.tail = None;
                return;
            }
        };

        let predecessor = if row == 1 {
            Some(Stamp::genesis(self.kind))
        } else {
            self.prev_stored.clone()
        };
        let locally_linked = predecessor.is_some_and(|prev| {
            compute_stamp(self.kind, &prev, &parsed.payload, parsed.time_text) == parsed.stamp
        });
        let own = check_values(&parsed, self.manifest);

        if let Some(origin) = self.broken_at {
            let (kind, detail) = own.unwrap_or_else(|| {
                (FailureKind::ChainBroken, format!("downstream of row {origin}"))
            });
            let mut failure = RowFailure::new(row, kind, detail);
            failure.downstream_of = Some(origin);
            failure.locally_linked = Some(locally_linked);
            self.failures.push(failure);
        } else {
            let expected =
                compute_stamp(self.kind, &self.running, &parsed.payload, parsed.time_text);
            let chain_ok = expected == parsed.stamp;

            let failure = match own {
                Some((kind, detail)) => Some(RowFailure::new(row, kind, detail)),
                None if !chain_ok => Some(RowFailure::new(
                    row,
                    FailureKind::ChainBroken,
                    "stored stamp does not match the recomputed stamp",
                )),
                None => self
                    .last_time
                    .filter(|previous| parsed.time < *previous)
                    .map(|previous| {
                        RowFailure::new(
                            row,
                            FailureKind::TimestampReversal,
                            format!("time_utc {} is earlier than {previous}", parsed.time_text),
                        )
                    }),
            };

            if chain_ok {
                self.running = parsed.stamp.clone();
            } else {
                self.broken_at = Some(row);
            }
            if let Some(mut failure) = failure {
                if !chain_ok {
                    failure.stored = Some(parsed.stamp.clone());
                    failure.expected = Some(expected);
                }
                self.failures.push(failure);
            }
        }

        self.last_time = Some(parsed.time);
        self.tail = Some(ChainTail {
            head: parsed.stamp.clone(),
            last_time: parsed.time,
            tick_index: row as u64,
        });
        self.prev_stored = Some(parsed.stamp);
    }

    #[must_use]
    pub fn finish(self) -> VerifyReport {
        let state = match self.state() {
            VerifyState::Building => VerifyState::Verified,
            other => other,
        };
        VerifyReport {
            state,
            rows: self.rows,
            manifest_id: self.manifest.manifest_id().to_string(),
            hash: self.kind,
            tail: if state == VerifyState::Verified {
                self.tail
            } else {
                None
            },
            failures: self.failures,
        }
    }
}

/// Verify a whole stored sequence against `manifest`.
#[must_use]
pub fn verify<'a>(
    records: impl IntoIterator<Item = &'a RawRecord>,
    manifest: &Manifest,
) -> VerifyReport {
    let mut verifier = Verifier::new(manifest);
    for record in records {
        verifier.push(record);
    }
    verifier.finish()
}
