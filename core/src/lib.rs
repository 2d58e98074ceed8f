//! Core logic for clockke.
//!
//! The alignment kernel, band classifier, stamp chain and verifier. Everything here is
//! synchronous and free of IO; the CLI tick loop and the record store are thin adapters
//! around [`Session`] and [`verify`].

mod band;
mod error;
pub mod kernel;
mod session;
pub mod stamp;
mod verify;

pub use band::classify;
pub use error::{MAX_PAYLOAD_BYTES, TickError};
pub use kernel::AlignmentKernel;
pub use session::{ChainTail, Session, TickInput};
pub use stamp::{StampChain, compute_stamp};
pub use verify::{FailureKind, RowFailure, VerifyReport, VerifyState, Verifier, verify};
