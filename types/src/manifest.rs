//! Kernel manifest: the immutable set of constants and band thresholds.
//!
//! [`RawManifest`] is the deserialization shape (every field optional, defaults to
//! v2.1). [`Manifest`] is the validated form; holding one is the proof that every
//! numeric guard and band rule holds. Re-tuning means building a new `Manifest`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stamp::HashKind;

pub const DEFAULT_MANIFEST_ID: &str = "CLOCKKE.DEFAULT.V2_1";

/// Smallest accepted clamp margin. Scores are stored with 9 decimals, so a smaller
/// margin could round a clamped score onto the +/-1 boundary.
pub const MIN_EPS_A: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("manifest_id must not be empty")]
    EmptyManifestId,
    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },
    #[error("tick_ms must be > 0 (got {0})")]
    NonPositiveTickMs(f64),
    #[error("decay_w must lie strictly inside (0, 1) (got {0})")]
    DecayOutOfRange(f64),
    #[error("eps_a must lie in [1e-9, 1) (got {0})")]
    EpsAOutOfRange(f64),
    #[error("eps_w must be > 0 (got {0})")]
    NonPositiveEpsW(f64),
    #[error("freeze_mult must be > 0 (got {0})")]
    NonPositiveFreezeMult(f64),
    #[error("freeze_penalty must be >= 0 (got {0})")]
    NegativeFreezePenalty(f64),
    #[error("band label must not be empty")]
    EmptyLabel,
    #[error("band label {0:?} contains a reserved character")]
    InvalidLabel(String),
    #[error("band label {0:?} is used more than once")]
    DuplicateLabel(String),
    #[error("band cutoff for {label:?} must be finite")]
    NonFiniteCutoff { label: String },
    #[error("band cutoffs must be strictly descending ({label:?} at {cutoff} follows {previous})")]
    CutoffsNotDescending {
        label: String,
        cutoff: f64,
        previous: f64,
    },
}

/// One threshold row: values `>= cutoff` earn `label`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandRule {
    pub label: String,
    pub cutoff: f64,
}

impl BandRule {
    #[must_use]
    pub fn new(label: impl Into<String>, cutoff: f64) -> Self {
        Self {
            label: label.into(),
            cutoff,
        }
    }
}

/// Unvalidated manifest as it appears in a TOML `[manifest]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawManifest {
    pub manifest_id: String,
    pub tick_ms: f64,
    pub baseline_a: f64,
    pub jitter_gain: f64,
    pub freeze_mult: f64,
    pub freeze_penalty: f64,
    pub eps_a: f64,
    pub eps_w: f64,
    pub decay_w: f64,
    pub fallback_band: String,
    pub stamp_hash: HashKind,
    pub bands: Vec<BandRule>,
}

impl Default for RawManifest {
    fn default() -> Self {
        Self {
            manifest_id: DEFAULT_MANIFEST_ID.to_string(),
            tick_ms: 1000.0,
            baseline_a: 0.02,
            jitter_gain: 0.15,
            freeze_mult: 1.5,
            freeze_penalty: 0.05,
            eps_a: 1e-6,
            eps_w: 1e-9,
            decay_w: 0.995,
            fallback_band: "D".to_string(),
            stamp_hash: HashKind::Sha256,
            bands: vec![
                BandRule::new("A+", 0.80),
                BandRule::new("A", 0.40),
                BandRule::new("B", 0.10),
                BandRule::new("C", -0.10),
            ],
        }
    }
}

/// Validated kernel manifest.
///
/// # Invariants
///
/// - `tick_ms > 0`, `decay_w` in (0, 1), `eps_a` in `[MIN_EPS_A, 1)`, `eps_w > 0`
/// - every numeric field is finite
/// - band cutoffs are strictly descending and every label is unique
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawManifest", into = "RawManifest")]
pub struct Manifest {
    manifest_id: String,
    tick_ms: f64,
    baseline_a: f64,
    jitter_gain: f64,
    freeze_mult: f64,
    freeze_penalty: f64,
    eps_a: f64,
    eps_w: f64,
    decay_w: f64,
    bands: Vec<BandRule>,
    fallback_band: String,
    stamp_hash: HashKind,
}

impl Manifest {
    pub fn new(raw: RawManifest) -> Result<Self, ConfigError> {
        Self::try_from(raw)
    }

    #[must_use]
    pub fn manifest_id(&self) -> &str {
        &self.manifest_id
    }

    #[must_use]
    pub fn tick_ms(&self) -> f64 {
        self.tick_ms
    }

    #[must_use]
    pub fn baseline_a(&self) -> f64 {
        self.baseline_a
    }

    #[must_use]
    pub fn jitter_gain(&self) -> f64 {
        self.jitter_gain
    }

    #[must_use]
    pub fn freeze_mult(&self) -> f64 {
        self.freeze_mult
    }

    #[must_use]
    pub fn freeze_penalty(&self) -> f64 {
        self.freeze_penalty
    }

    #[must_use]
    pub fn eps_a(&self) -> f64 {
        self.eps_a
    }

    #[must_use]
    pub fn eps_w(&self) -> f64 {
        self.eps_w
    }

    #[must_use]
    pub fn decay_w(&self) -> f64 {
        self.decay_w
    }

    /// Band rules, highest cutoff first.
    #[must_use]
    pub fn bands(&self) -> &[BandRule] {
        &self.bands
    }

    #[must_use]
    pub fn fallback_band(&self) -> &str {
        &self.fallback_band
    }

    #[must_use]
    pub fn stamp_hash(&self) -> HashKind {
        self.stamp_hash
    }

    /// True if `label` is one of this manifest's bands (fallback included).
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        label == self.fallback_band || self.bands.iter().any(|rule| rule.label == label)
    }

    /// A copy of this manifest's settings, ready to be tweaked and re-validated.
    #[must_use]
    pub fn to_raw(&self) -> RawManifest {
        RawManifest::from(self.clone())
    }
}

impl Default for Manifest {
    fn default() -> Self {
        let raw = RawManifest::default();
        Self {
            manifest_id: raw.manifest_id,
            tick_ms: raw.tick_ms,
            baseline_a: raw.baseline_a,
            jitter_gain: raw.jitter_gain,
            freeze_mult: raw.freeze_mult,
            freeze_penalty: raw.freeze_penalty,
            eps_a: raw.eps_a,
            eps_w: raw.eps_w,
            decay_w: raw.decay_w,
            bands: raw.bands,
            fallback_band: raw.fallback_band,
            stamp_hash: raw.stamp_hash,
        }
    }
}

fn finite(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigError::NonFinite { field })
    }
}

// Labels land in CSV cells and in the derived `time|a_out|band` payload.
fn validate_label(label: &str) -> Result<(), ConfigError> {
    if label.trim().is_empty() {
        return Err(ConfigError::EmptyLabel);
    }
    if label != label.trim()
        || label
            .chars()
            .any(|c| c.is_control() || c == ',' || c == '|' || c == '"')
    {
        return Err(ConfigError::InvalidLabel(label.to_string()));
    }
    Ok(())
}

fn validate_bands(bands: &[BandRule], fallback: &str) -> Result<(), ConfigError> {
    validate_label(fallback)?;
    let mut previous: Option<f64> = None;
    for (idx, rule) in bands.iter().enumerate() {
        validate_label(&rule.label)?;
        if !rule.cutoff.is_finite() {
            return Err(ConfigError::NonFiniteCutoff {
                label: rule.label.clone(),
            });
        }
        if rule.label == fallback || bands[..idx].iter().any(|r| r.label == rule.label) {
            return Err(ConfigError::DuplicateLabel(rule.label.clone()));
        }
        if let Some(previous) = previous
            && rule.cutoff >= previous
        {
            return Err(ConfigError::CutoffsNotDescending {
                label: rule.label.clone(),
                cutoff: rule.cutoff,
                previous,
            });
        }
        previous = Some(rule.cutoff);
    }
    Ok(())
}

impl TryFrom<RawManifest> for Manifest {
    type Error = ConfigError;

    fn try_from(raw: RawManifest) -> Result<Self, Self::Error> {
        if raw.manifest_id.trim().is_empty() {
            return Err(ConfigError::EmptyManifestId);
        }

        let tick_ms = finite("tick_ms", raw.tick_ms)?;
        if tick_ms <= 0.0 {
            return Err(ConfigError::NonPositiveTickMs(tick_ms));
        }
        let decay_w = finite("decay_w", raw.decay_w)?;
        if decay_w <= 0.0 || decay_w >= 1.0 {
            return Err(ConfigError::DecayOutOfRange(decay_w));
        }
        let eps_a = finite("eps_a", raw.eps_a)?;
        if !(MIN_EPS_A..1.0).contains(&eps_a) {
            return Err(ConfigError::EpsAOutOfRange(eps_a));
        }
        let eps_w = finite("eps_w", raw.eps_w)?;
        if eps_w <= 0.0 {
            return Err(ConfigError::NonPositiveEpsW(eps_w));
        }
        let freeze_mult = finite("freeze_mult", raw.freeze_mult)?;
        if freeze_mult <= 0.0 {
            return Err(ConfigError::NonPositiveFreezeMult(freeze_mult));
        }
        let freeze_penalty = finite("freeze_penalty", raw.freeze_penalty)?;
        if freeze_penalty < 0.0 {
            return Err(ConfigError::NegativeFreezePenalty(freeze_penalty));
        }
        let baseline_a = finite("baseline_a", raw.baseline_a)?;
        let jitter_gain = finite("jitter_gain", raw.jitter_gain)?;

        validate_bands(&raw.bands, &raw.fallback_band)?;

        Ok(Self {
            manifest_id: raw.manifest_id,
            tick_ms,
            baseline_a,
            jitter_gain,
            freeze_mult,
            freeze_penalty,
            eps_a,
            eps_w,
            decay_w,
            bands: raw.bands,
            fallback_band: raw.fallback_band,
            stamp_hash: raw.stamp_hash,
        })
    }
}

impl From<Manifest> for RawManifest {
    fn from(manifest: Manifest) -> Self {
        Self {
            manifest_id: manifest.manifest_id,
            tick_ms: manifest.tick_ms,
            baseline_a: manifest.baseline_a,
            jitter_gain: manifest.jitter_gain,
            freeze_mult: manifest.freeze_mult,
            freeze_penalty: manifest.freeze_penalty,
            eps_a: manifest.eps_a,
            eps_w: manifest.eps_w,
            decay_w: manifest.decay_w,
            fallback_band: manifest.fallback_band,
            stamp_hash: manifest.stamp_hash,
            bands: manifest.bands,
        }
    }
}
