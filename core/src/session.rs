//! One running chain: kernel, band classification and stamp chain behind a single
//! `&mut self` entry point.

use std::sync::Arc;

use tracing::{debug, info, warn};

use clockke_types::{
    Manifest, Payload, Stamp, TickRecord, UtcTimestamp, format_score, quantize_score,
};

use crate::band::classify;
use crate::error::{MAX_PAYLOAD_BYTES, TickError};
use crate::kernel::AlignmentKernel;
use crate::stamp::StampChain;

/// Inputs for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickInput {
    /// Milliseconds since the previous tick. `0` means no measurement.
    pub dt_ms: i64,
    pub time_utc: UtcTimestamp,
    pub stress: f64,
    pub payload: Payload,
}

impl TickInput {
    /// A tick with zero stress committing the derived payload.
    #[must_use]
    pub fn derived(dt_ms: i64, time_utc: UtcTimestamp) -> Self {
        Self {
            dt_ms,
            time_utc,
            stress: 0.0,
            payload: Payload::Derived,
        }
    }

    #[must_use]
    pub fn with_stress(mut self, stress: f64) -> Self {
        self.stress = stress;
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Payload::Opaque(payload);
        self
    }
}

/// Last committed position of a verified chain, used to continue it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainTail {
    pub head: Stamp,
    pub last_time: UtcTimestamp,
    pub tick_index: u64,
}

#[derive(Debug)]
pub struct Session {
    manifest: Arc<Manifest>,
    kernel: AlignmentKernel,
    chain: StampChain,
    ticks: u64,
    last_time: Option<UtcTimestamp>,
}

impl Session {
    /// Start a new chain at genesis.
    #[must_use]
    pub fn new(manifest: Arc<Manifest>) -> Self {
        let chain = StampChain::new(manifest.stamp_hash());
        Self::start(manifest, chain, 0, None)
    }

    /// Continue the chain ending at `tail`. Kernel accumulators start fresh.
    #[must_use]
    pub fn resume(manifest: Arc<Manifest>, tail: &ChainTail) -> Self {
        let chain = StampChain::resume(manifest.stamp_hash(), tail.head.clone());
        Self::start(manifest, chain, tail.tick_index, Some(tail.last_time))
    }

    fn start(
        manifest: Arc<Manifest>,
        chain: StampChain,
        ticks: u64,
        last_time: Option<UtcTimestamp>,
    ) -> Self {
        if !manifest.stamp_hash().is_cryptographic() {
            warn!(
                hash = %manifest.stamp_hash(),
                "stamp hash is an integrity checksum only; records are not tamper-evident against deliberate edits"
            );
        }
        info!(
            manifest = manifest.manifest_id(),
            hash = %manifest.stamp_hash(),
            resumed_at = ticks,
            "session started"
        );
        Self {
            kernel: AlignmentKernel::new(Arc::clone(&manifest)),
            manifest,
            chain,
            ticks,
            last_time,
        }
    }

    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    #[must_use]
    pub fn head(&self) -> &Stamp {
        self.chain.head()
    }

    /// Number of ticks committed to this chain, including resumed ones.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Process one tick. On error nothing is mutated.
    pub fn tick(&mut self, input: TickInput) -> Result<TickRecord, TickError> {
        let dt_ms = AlignmentKernel::validate(input.dt_ms, input.stress)?;
        let a_src = self.kernel.checked_alignment(dt_ms, input.stress)?;
        if let Payload::Opaque(bytes) = &input.payload {
            if bytes.is_empty() {
                return Err(TickError::EmptyPayload);
            }
            if bytes.len() > MAX_PAYLOAD_BYTES {
                return Err(TickError::PayloadTooLarge { len: bytes.len() });
            }
        }
        if let Some(previous) = self.last_time
            && input.time_utc < previous
        {
            return Err(TickError::TimeReversed {
                previous,
                next: input.time_utc,
            });
        }

        let a_out = quantize_score(self.kernel.advance(a_src));
        let band = classify(a_out, &self.manifest).to_string();

        let time_text = input.time_utc.canonical();
        let stamp = match &input.payload {
            Payload::Derived => {
                let bytes = Payload::derived_bytes(&time_text, &format_score(a_out), &band);
                self.chain.emit(&bytes, &time_text)
            }
            Payload::Opaque(bytes) => self.chain.emit(bytes, &time_text),
        };

        self.ticks += 1;
        self.last_time = Some(input.time_utc);

        debug!(
            tick = self.ticks,
            dt_ms,
            a_out,
            band = band.as_str(),
            stamp = %stamp.short(),
            "tick"
        );

        Ok(TickRecord {
            tick_index: self.ticks,
            time_utc: input.time_utc,
            dt_ms,
            a_out,
            band,
            payload: input.payload,
            stamp,
        })
    }
}
