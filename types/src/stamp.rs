//! Stamp digests and the hash capability that produces them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hash capability used by a stamp chain.
///
/// `Sha256` is the cryptographic tier. `Crc32` is an integer checksum: it catches
/// accidental corruption but offers no resistance to deliberate forgery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashKind {
    #[default]
    Sha256,
    Crc32,
}

impl HashKind {
    /// Digest width in bytes.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            HashKind::Sha256 => 32,
            HashKind::Crc32 => 4,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            HashKind::Sha256 => "sha256",
            HashKind::Crc32 => "crc32",
        }
    }

    #[must_use]
    pub const fn is_cryptographic(self) -> bool {
        matches!(self, HashKind::Sha256)
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Some(HashKind::Sha256),
            "crc32" | "crc-32" => Some(HashKind::Crc32),
            _ => None,
        }
    }
}

impl fmt::Display for HashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StampParseError {
    #[error("stamp is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("stamp must be {expected} bytes, got {actual}")]
    Width { expected: usize, actual: usize },
}

/// A fixed-width chain digest.
///
/// The width is set by the [`HashKind`] that produced it; [`Stamp::parse`] checks it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Stamp(Vec<u8>);

impl Stamp {
    /// The documented genesis value: an all-zero digest of the hash width.
    #[must_use]
    pub fn genesis(kind: HashKind) -> Self {
        Self(vec![0; kind.width()])
    }

    /// Wrap raw digest bytes. Width is the caller's responsibility.
    #[must_use]
    pub fn from_digest(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Parse a hex stamp and require the width of `kind`.
    pub fn parse(hex_text: &str, kind: HashKind) -> Result<Self, StampParseError> {
        let bytes = hex::decode(hex_text.trim())?;
        if bytes.len() != kind.width() {
            return Err(StampParseError::Width {
                expected: kind.width(),
                actual: bytes.len(),
            });
        }
        Ok(Self(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Compact `first8…last8` form for console output.
    #[must_use]
    pub fn short(&self) -> String {
        let hex = self.to_hex();
        if hex.len() <= 16 {
            return hex;
        }
        format!("{}…{}", &hex[..8], &hex[hex.len() - 8..])
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stamp({})", self.to_hex())
    }
}

impl FromStr for HashKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown stamp hash {s:?} (expected sha256 or crc32)"))
    }
}
