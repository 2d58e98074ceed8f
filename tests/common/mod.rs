//! Shared test utilities and fixtures

#![allow(dead_code)]

use std::sync::Arc;

use clockke_core::{Session, TickInput};
use clockke_types::{HashKind, Manifest, RawManifest, RawRecord, TickRecord, UtcTimestamp};

/// `2025-03-01T12:00:00Z` plus `secs`.
pub fn ts(secs: u64) -> UtcTimestamp {
    let (h, m, s) = (12 + secs / 3600, (secs / 60) % 60, secs % 60);
    UtcTimestamp::parse(&format!("2025-03-01T{h:02}:{m:02}:{s:02}Z")).unwrap()
}

pub fn default_manifest() -> Arc<Manifest> {
    Arc::new(Manifest::default())
}

pub fn manifest_with(f: impl FnOnce(&mut RawManifest)) -> Arc<Manifest> {
    let mut raw = RawManifest::default();
    f(&mut raw);
    Arc::new(Manifest::new(raw).unwrap())
}

pub fn crc32_manifest() -> Arc<Manifest> {
    manifest_with(|raw| raw.stamp_hash = HashKind::Crc32)
}

/// One tick per `dt_ms`, wall time advancing by whole seconds.
pub fn run_ticks(manifest: &Arc<Manifest>, dts: &[i64]) -> Vec<TickRecord> {
    let mut session = Session::new(Arc::clone(manifest));
    dts.iter()
        .enumerate()
        .map(|(i, &dt)| session.tick(TickInput::derived(dt, ts(i as u64))).unwrap())
        .collect()
}

/// Ticks carrying opaque payloads `tick-0`, `tick-1`, ...
pub fn run_opaque(manifest: &Arc<Manifest>, n: usize) -> Vec<TickRecord> {
    let mut session = Session::new(Arc::clone(manifest));
    (0..n)
        .map(|i| {
            let input =
                TickInput::derived(1000, ts(i as u64)).with_payload(format!("tick-{i}").into_bytes());
            session.tick(input).unwrap()
        })
        .collect()
}

pub fn to_rows(records: &[TickRecord]) -> Vec<RawRecord> {
    records.iter().map(TickRecord::to_raw).collect()
}

/// Deterministic pseudo-random sequence for property-style loops.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 11
    }

    /// Uniform in `[lo, hi)`.
    pub fn range(&mut self, lo: f64, hi: f64) -> f64 {
        let unit = self.next_u64() as f64 / (1u64 << 53) as f64;
        lo + unit * (hi - lo)
    }
}
