//! Canonical UTC timestamps.
//!
//! A tick's `time_utc` is committed into the stamp chain as text, so the text form must
//! be unique per instant: RFC3339, UTC, `Z` suffix, fractional seconds only when
//! non-zero (3, 6 or 9 digits).

use std::fmt;

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("timestamp {0:?} must end in \"Z\"")]
    NotUtc(String),
    #[error("timestamp {text:?} is not RFC3339: {reason}")]
    Invalid { text: String, reason: String },
    #[error("timestamp {text:?} is not canonical (expected {canonical:?})")]
    NotCanonical { text: String, canonical: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcTimestamp(DateTime<Utc>);

impl UtcTimestamp {
    #[must_use]
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    /// Current wall-clock time truncated to whole milliseconds.
    #[must_use]
    pub fn now() -> Self {
        Self::new(Utc::now()).truncate_millis()
    }

    #[must_use]
    pub fn truncate_millis(self) -> Self {
        let nanos = self.0.nanosecond() - self.0.nanosecond() % 1_000_000;
        Self(self.0.with_nanosecond(nanos).unwrap_or(self.0))
    }

    /// Parse any RFC3339 timestamp with a `Z` suffix.
    pub fn parse(text: &str) -> Result<Self, TimestampError> {
        if !text.ends_with('Z') {
            return Err(TimestampError::NotUtc(text.to_string()));
        }
        DateTime::parse_from_rfc3339(text)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| TimestampError::Invalid {
                text: text.to_string(),
                reason: e.to_string(),
            })
    }

    /// Parse and additionally require the canonical text form.
    pub fn parse_canonical(text: &str) -> Result<Self, TimestampError> {
        let parsed = Self::parse(text)?;
        let canonical = parsed.canonical();
        if canonical != text {
            return Err(TimestampError::NotCanonical {
                text: text.to_string(),
                canonical,
            });
        }
        Ok(parsed)
    }

    /// The committed text form, e.g. `2025-03-01T12:00:00Z` or `2025-03-01T12:00:00.250Z`.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    #[must_use]
    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }

    /// Compact form for file names: `20250301_120000Z`.
    #[must_use]
    pub fn file_suffix(&self) -> String {
        self.0.format("%Y%m%d_%H%M%SZ").to_string()
    }
}

impl fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl From<DateTime<Utc>> for UtcTimestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self::new(value)
    }
}
