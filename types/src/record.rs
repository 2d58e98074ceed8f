//! Emitted tick records and their stored (unvalidated) form.

use serde::{Deserialize, Serialize};

use crate::stamp::Stamp;
use crate::time::UtcTimestamp;

/// Decimal places kept for a stored score.
pub const SCORE_DECIMALS: usize = 9;

const SCORE_SCALE: f64 = 1e9;

/// Round a score to [`SCORE_DECIMALS`] places.
///
/// The result is the exact `f64` that [`format_score`] followed by `str::parse`
/// yields, so band recomputation from stored text cannot drift.
#[must_use]
pub fn quantize_score(a: f64) -> f64 {
    (a * SCORE_SCALE).round() / SCORE_SCALE
}

/// Stored text form of a score: explicit sign, nine decimals (`+0.020000000`).
#[must_use]
pub fn format_score(a: f64) -> String {
    format!("{a:+.9}")
}

/// The payload committed for a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Derived from the record itself: `"{time_utc}|{a_out}|{band}"`.
    Derived,
    /// Caller-supplied bytes.
    Opaque(Vec<u8>),
}

impl Payload {
    /// Bytes of the derived payload for the given stored texts.
    #[must_use]
    pub fn derived_bytes(time_utc: &str, a_out: &str, band: &str) -> Vec<u8> {
        format!("{time_utc}|{a_out}|{band}").into_bytes()
    }
}

/// One emitted tick. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TickRecord {
    pub tick_index: u64,
    pub time_utc: UtcTimestamp,
    pub dt_ms: u64,
    /// Quantized score, strictly inside (-1, 1).
    pub a_out: f64,
    pub band: String,
    pub payload: Payload,
    pub stamp: Stamp,
}

impl TickRecord {
    #[must_use]
    pub fn a_out_text(&self) -> String {
        format_score(self.a_out)
    }

    /// The exact bytes fed into the stamp chain for this record.
    #[must_use]
    pub fn payload_bytes(&self) -> Vec<u8> {
        match &self.payload {
            Payload::Derived => Payload::derived_bytes(
                &self.time_utc.canonical(),
                &self.a_out_text(),
                &self.band,
            ),
            Payload::Opaque(bytes) => bytes.clone(),
        }
    }

    #[must_use]
    pub fn to_raw(&self) -> RawRecord {
        RawRecord {
            tick_index: Some(self.tick_index.to_string()),
            time_utc: Some(self.time_utc.canonical()),
            dt_ms: Some(self.dt_ms.to_string()),
            a_out: Some(self.a_out_text()),
            band: Some(self.band.clone()),
            stamp: Some(self.stamp.to_hex()),
            payload: match &self.payload {
                Payload::Derived => None,
                Payload::Opaque(bytes) => Some(hex::encode(bytes)),
            },
        }
    }
}

/// A stored row as read back from storage: every field is optional text.
///
/// The verifier owns all interpretation. `payload` absent or empty means the
/// derived payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    pub tick_index: Option<String>,
    pub time_utc: Option<String>,
    pub dt_ms: Option<String>,
    pub a_out: Option<String>,
    pub band: Option<String>,
    pub stamp: Option<String>,
    pub payload: Option<String>,
}

impl RawRecord {
    /// Column order used by tabular storage.
    pub const COLUMNS: [&'static str; 7] = [
        "tick_index",
        "time_utc",
        "dt_ms",
        "a_out",
        "band",
        "stamp",
        "payload",
    ];

    #[must_use]
    pub fn field(&self, column: &str) -> Option<&str> {
        match column {
            "tick_index" => self.tick_index.as_deref(),
            "time_utc" => self.time_utc.as_deref(),
            "dt_ms" => self.dt_ms.as_deref(),
            "a_out" => self.a_out.as_deref(),
            "band" => self.band.as_deref(),
            "stamp" => self.stamp.as_deref(),
            "payload" => self.payload.as_deref(),
            _ => None,
        }
    }

    /// Set a column by name. Unknown columns are ignored.
    pub fn set_field(&mut self, column: &str, value: String) {
        let slot = match column {
            "tick_index" => &mut self.tick_index,
            "time_utc" => &mut self.time_utc,
            "dt_ms" => &mut self.dt_ms,
            "a_out" => &mut self.a_out,
            "band" => &mut self.band,
            "stamp" => &mut self.stamp,
            "payload" => &mut self.payload,
            _ => return,
        };
        *slot = Some(value);
    }
}
