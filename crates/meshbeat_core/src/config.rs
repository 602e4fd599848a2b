//! Pipeline Configuration
//!
//! Supplied programmatically at startup. Serializable so hosts can embed it
//! in their own settings, but nothing here reads or writes files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use meshbeat_dsp::{BandConfig, HysteresisTuning, Preset, Spectrum, MUSIC};

use crate::error::{PipelineError, PipelineResult};

/// Default number of undelivered events the host's queue holds
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 256;

fn default_event_queue_capacity() -> usize {
    DEFAULT_EVENT_QUEUE_CAPACITY
}

/// Complete configuration of one pipeline instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Transform length in samples (power of two)
    pub block_size: usize,

    /// Microphone sample rate in Hz, used for the deadline and bin widths
    pub sample_rate: u32,

    /// Band table, bins index into the `block_size / 2` spectrum
    pub bands: Vec<BandConfig>,

    /// Retrigger threshold and level divisor parameters
    #[serde(default)]
    pub tuning: HysteresisTuning,

    /// Aggregator period in milliseconds, decoupled from the block period
    pub tick_interval_ms: u64,

    /// Report the mean active frequency from this bin upward
    #[serde(default)]
    pub frequency_floor_bin: Option<usize>,

    /// Capacity of the event queue; events beyond it are dropped and counted
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_preset(&MUSIC)
    }
}

impl PipelineConfig {
    /// Build a configuration from a built-in demo preset
    pub fn from_preset(preset: &Preset) -> Self {
        Self {
            block_size: preset.block_size,
            sample_rate: preset.sample_rate,
            bands: preset.bands.to_vec(),
            tuning: HysteresisTuning::default(),
            tick_interval_ms: preset.tick_interval_ms,
            frequency_floor_bin: preset.frequency_floor_bin,
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
        }
    }

    /// Check the parameters owned by the engine itself
    ///
    /// Block size, bands and tuning are validated by the DSP components
    /// when they are configured.
    pub fn validate(&self) -> PipelineResult<()> {
        if !(1000..=192_000).contains(&self.sample_rate) {
            return Err(PipelineError::InvalidSampleRate(self.sample_rate));
        }
        if !(1..=10_000).contains(&self.tick_interval_ms) {
            return Err(PipelineError::InvalidTickInterval(self.tick_interval_ms));
        }
        if self.event_queue_capacity == 0 {
            return Err(PipelineError::InvalidEventQueueCapacity);
        }
        if let Some(bin) = self.frequency_floor_bin {
            if bin >= self.spectrum_len() {
                return Err(PipelineError::InvalidFrequencyFloor {
                    bin,
                    spectrum_len: self.spectrum_len(),
                });
            }
        }
        Ok(())
    }

    /// Number of bins per spectrum
    pub fn spectrum_len(&self) -> usize {
        self.block_size / 2
    }

    /// Time the microphone needs to fill one block
    ///
    /// This is the deadline for transform + publish.
    pub fn block_period(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.block_size as u64 * 1_000_000_000 / self.sample_rate as u64)
    }

    /// Aggregator period
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Bandwidth covered by one bin in Hz
    pub fn bin_width_hz(&self) -> f32 {
        if self.block_size == 0 {
            return 0.0;
        }
        self.sample_rate as f32 / self.block_size as f32
    }

    /// Center frequency of `bin` in whole Hz
    pub fn bin_frequency_hz(&self, bin: usize) -> u32 {
        Spectrum::bin_frequency_hz(bin, self.sample_rate, self.block_size)
    }
}
