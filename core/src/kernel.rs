//! Alignment kernel: timing deltas in, bounded decay-smoothed score out.
//!
//! Each tick maps its jitter to a raw alignment `a_src`, clamps it inside (-1, 1),
//! moves it into unbounded evidence space with `atanh`, accumulates it with
//! exponential decay, and projects the weighted mean back with `tanh`:
//!
//! ```text
//! a_src = baseline + stress - gain * (dt - tick) / tick   [- penalty if dt > mult * tick]
//! u     = atanh(clamp(a_src, -1 + eps_a, 1 - eps_a))
//! U     = decay * U + u
//! W     = decay * W + 1
//! a_out = tanh(U / max(W, eps_w))
//! ```

use std::sync::Arc;

use clockke_types::Manifest;

use crate::error::TickError;

/// Per-session numeric state. `U` and `W` start at zero and are only ever
/// touched by [`AlignmentKernel::update`].
#[derive(Debug, Clone)]
pub struct AlignmentKernel {
    manifest: Arc<Manifest>,
    u: f64,
    w: f64,
}

impl AlignmentKernel {
    #[must_use]
    pub fn new(manifest: Arc<Manifest>) -> Self {
        Self {
            manifest,
            u: 0.0,
            w: 0.0,
        }
    }

    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Current `(U, W)` accumulators.
    #[must_use]
    pub fn accumulators(&self) -> (f64, f64) {
        (self.u, self.w)
    }

    /// Check tick inputs without touching state. Returns `dt_ms` as unsigned.
    pub fn validate(dt_ms: i64, stress: f64) -> Result<u64, TickError> {
        if !stress.is_finite() {
            return Err(TickError::NonFiniteStress(stress));
        }
        u64::try_from(dt_ms).map_err(|_| TickError::NegativeDt(dt_ms))
    }

    /// True if `dt_ms` exceeds `freeze_mult * tick_ms`.
    #[must_use]
    pub fn is_freeze(&self, dt_ms: u64) -> bool {
        dt_ms as f64 > self.manifest.freeze_mult() * self.manifest.tick_ms()
    }

    /// Raw alignment before clamping.
    ///
    /// `dt_ms == 0` means there is no previous tick to measure against, so the
    /// jitter term is zero.
    #[must_use]
    pub fn source_alignment(&self, dt_ms: u64, stress: f64) -> f64 {
        let m = &*self.manifest;
        let jitter = if dt_ms == 0 {
            0.0
        } else {
            (dt_ms as f64 - m.tick_ms()) / m.tick_ms()
        };

        let mut a_src = m.baseline_a() + stress - m.jitter_gain() * jitter;
        if self.is_freeze(dt_ms) {
            a_src -= m.freeze_penalty();
        }
        a_src
    }

    fn clamp(&self, a: f64) -> f64 {
        let eps = self.manifest.eps_a();
        a.clamp(-1.0 + eps, 1.0 - eps)
    }

    /// Raw alignment for validated inputs, rejected when it is undefined.
    ///
    /// Infinite alignments are clamped later; NaN (opposing infinities from extreme
    /// manifest values) must never reach the accumulators.
    pub fn checked_alignment(&self, dt_ms: u64, stress: f64) -> Result<f64, TickError> {
        let a_src = self.source_alignment(dt_ms, stress);
        if a_src.is_nan() {
            return Err(TickError::UndefinedAlignment { dt_ms, stress });
        }
        Ok(a_src)
    }

    /// Advance the kernel by one tick and return `a_out`.
    ///
    /// Rejected inputs leave `U` and `W` unchanged.
    pub fn update(&mut self, dt_ms: i64, stress: f64) -> Result<f64, TickError> {
        let dt_ms = Self::validate(dt_ms, stress)?;
        let a_src = self.checked_alignment(dt_ms, stress)?;
        Ok(self.advance(a_src))
    }

    /// Advance with a raw alignment returned by [`AlignmentKernel::checked_alignment`].
    pub(crate) fn advance(&mut self, a_src: f64) -> f64 {
        let decay = self.manifest.decay_w();
        let u = self.clamp(a_src).atanh();

        self.u = decay * self.u + u;
        self.w = decay * self.w + 1.0;

        (self.u / self.w.max(self.manifest.eps_w())).tanh()
    }
}
