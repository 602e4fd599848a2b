//! Acquisition-side Analyzer
//!
//! Ring + transform engine + store publish, run together on the producer
//! side. A block is transformed and published synchronously in the same step
//! it is released, which is what keeps two sample blocks sufficient.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::DspResult;
use crate::fft::TransformEngine;
use crate::ring::{BlockId, SampleRing};
use crate::spectrum::Spectrum;
use crate::store::SpectrumStore;

/// Producer-side half of the spectrum pipeline
#[derive(Debug)]
pub struct Analyzer {
    ring: SampleRing,
    engine: TransformEngine,
    /// Reused output buffer, no per-block allocation
    spectrum: Spectrum,
    store: Arc<SpectrumStore>,
    blocks_analyzed: u64,
    last_transform_time: Duration,
}

impl Analyzer {
    /// Configure ring, engine and store for `block_size`
    pub fn configure(block_size: usize) -> DspResult<Self> {
        let engine = TransformEngine::configure(block_size)?;
        let ring = SampleRing::configure(block_size)?;
        let spectrum_len = engine.spectrum_len();

        Ok(Self {
            ring,
            engine,
            spectrum: Spectrum::zeroed(spectrum_len),
            store: Arc::new(SpectrumStore::new(spectrum_len)),
            blocks_analyzed: 0,
            last_transform_time: Duration::ZERO,
        })
    }

    /// Mailbox the analyzer publishes into; hand this to the consumer
    pub fn store(&self) -> Arc<SpectrumStore> {
        Arc::clone(&self.store)
    }

    pub fn block_size(&self) -> usize {
        self.ring.block_size()
    }

    pub fn spectrum_len(&self) -> usize {
        self.engine.spectrum_len()
    }

    /// The ring, for drivers that fill the active block directly
    pub fn ring_mut(&mut self) -> &mut SampleRing {
        &mut self.ring
    }

    /// Driver callback: `filled` is complete
    ///
    /// Swaps blocks, transforms the released block and publishes the result.
    /// Returns false for a stale release that was ignored.
    pub fn on_block_filled(&mut self, filled: BlockId) -> bool {
        let Some(id) = self.ring.on_block_filled(filled) else {
            return false;
        };

        let started = Instant::now();
        self.engine
            .transform_into(self.ring.block(id), &mut self.spectrum);
        self.store.publish(&self.spectrum);
        self.last_transform_time = started.elapsed();
        self.blocks_analyzed += 1;

        trace!(
            block = ?id,
            elapsed_us = self.last_transform_time.as_micros() as u64,
            "Block analysed"
        );
        true
    }

    /// Stream samples in, analysing every block that fills up
    ///
    /// Returns the number of blocks analysed.
    pub fn push_samples(&mut self, mut samples: &[i16]) -> usize {
        let mut completed = 0;

        while !samples.is_empty() {
            let accepted = self.ring.fill_active(samples);
            samples = &samples[accepted..];

            if self.ring.is_active_full() {
                let active = self.ring.active();
                if self.on_block_filled(active) {
                    completed += 1;
                }
            }
        }

        completed
    }

    /// Wall time of the most recent transform + publish
    pub fn last_transform_time(&self) -> Duration {
        self.last_transform_time
    }

    pub fn blocks_analyzed(&self) -> u64 {
        self.blocks_analyzed
    }

    /// Clear samples, window and any pending spectrum
    pub fn reset(&mut self) {
        self.ring.reset();
        self.engine.reset();
        self.store.clear();
        self.blocks_analyzed = 0;
        self.last_transform_time = Duration::ZERO;
    }
}
