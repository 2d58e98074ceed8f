//! Append-only stamp chain.
//!
//! Each stamp commits to the previous stamp, a digest of the tick payload, and the
//! canonical timestamp text:
//!
//! ```text
//! stamp_k = H("clockke:stamp:v1" || stamp_{k-1} || H(payload_k) || u64_be(len(time_k)) || time_k)
//! ```
//!
//! The timestamp is length-prefixed so no two `(payload, time)` pairs share an
//! encoding. Genesis is the all-zero stamp of the hash width.

use sha2::{Digest, Sha256};

use clockke_types::{HashKind, Stamp};

const STAMP_DOMAIN: &[u8] = b"clockke:stamp:v1";

/// Streaming hasher over the configured hash.
enum Hasher {
    Sha256(Sha256),
    Crc32(crc32fast::Hasher),
}

impl Hasher {
    fn new(kind: HashKind) -> Self {
        match kind {
            HashKind::Sha256 => Self::Sha256(Sha256::new()),
            HashKind::Crc32 => Self::Crc32(crc32fast::Hasher::new()),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(bytes),
            Self::Crc32(h) => h.update(bytes),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            Self::Sha256(h) => h.finalize().to_vec(),
            Self::Crc32(h) => h.finalize().to_be_bytes().to_vec(),
        }
    }
}

fn digest(kind: HashKind, bytes: &[u8]) -> Vec<u8> {
    let mut hasher = Hasher::new(kind);
    hasher.update(bytes);
    hasher.finalize()
}

/// Compute one link of the chain without touching any state.
#[must_use]
pub fn compute_stamp(kind: HashKind, prev: &Stamp, payload: &[u8], time_utc: &str) -> Stamp {
    let payload_digest = digest(kind, payload);

    let mut hasher = Hasher::new(kind);
    hasher.update(STAMP_DOMAIN);
    hasher.update(prev.as_bytes());
    hasher.update(&payload_digest);
    hasher.update(&(time_utc.len() as u64).to_be_bytes());
    hasher.update(time_utc.as_bytes());
    Stamp::from_digest(hasher.finalize())
}

/// Owns the chain head. [`StampChain::emit`] is the only way to advance it.
#[derive(Debug, Clone)]
pub struct StampChain {
    kind: HashKind,
    head: Stamp,
}

impl StampChain {
    /// Start a fresh chain at genesis.
    #[must_use]
    pub fn new(kind: HashKind) -> Self {
        Self {
            kind,
            head: Stamp::genesis(kind),
        }
    }

    /// Continue an existing chain from its last stamp.
    ///
    /// `head` must be a stamp of `kind`'s width; a foreign width can never be
    /// produced by [`Stamp::parse`] for the same kind.
    #[must_use]
    pub fn resume(kind: HashKind, head: Stamp) -> Self {
        Self { kind, head }
    }

    #[must_use]
    pub fn kind(&self) -> HashKind {
        self.kind
    }

    #[must_use]
    pub fn head(&self) -> &Stamp {
        &self.head
    }

    /// Compute the next stamp and make it the new head.
    pub fn emit(&mut self, payload: &[u8], time_utc: &str) -> Stamp {
        let stamp = compute_stamp(self.kind, &self.head, payload, time_utc);
        self.head = stamp.clone();
        stamp
    }
}
