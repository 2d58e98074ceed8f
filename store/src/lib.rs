//! Record storage for clockke.
//!
//! Append-only CSV or JSON-lines logs of emitted ticks, a tolerant reader for
//! verification, and atomic whole-file writes for manifests.

mod atomic_write;
mod error;
mod log;
mod read;

pub use atomic_write::atomic_write;
pub use error::StoreError;
pub use log::{RecordFormat, RecordLog};
pub use read::read_records;
