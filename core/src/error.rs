//! Tick-side errors.
//!
//! A rejected tick leaves every accumulator and the chain head untouched; the caller
//! decides whether to skip the tick or stop the session.

use thiserror::Error;

use clockke_types::UtcTimestamp;

/// Upper bound on an opaque payload.
pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TickError {
    #[error("dt_ms must be >= 0 (got {0})")]
    NegativeDt(i64),
    #[error("stress must be a finite number (got {0})")]
    NonFiniteStress(f64),
    #[error("dt_ms={dt_ms} with stress={stress} gives an undefined alignment under this manifest")]
    UndefinedAlignment { dt_ms: u64, stress: f64 },
    #[error("opaque payload must not be empty")]
    EmptyPayload,
    #[error("opaque payload is {len} bytes (max {max})", max = MAX_PAYLOAD_BYTES)]
    PayloadTooLarge { len: usize },
    #[error("time_utc {next} is earlier than the previous tick at {previous}")]
    TimeReversed {
        previous: UtcTimestamp,
        next: UtcTimestamp,
    },
}
