//! Core domain types for clockke.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer: the kernel, the loaders, and the CLI.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod manifest;
mod record;
mod stamp;
mod time;

pub use manifest::{BandRule, ConfigError, DEFAULT_MANIFEST_ID, MIN_EPS_A, Manifest, RawManifest};
pub use record::{
    Payload, RawRecord, SCORE_DECIMALS, TickRecord, format_score, quantize_score,
};
pub use stamp::{HashKind, Stamp, StampParseError};
pub use time::{TimestampError, UtcTimestamp};
