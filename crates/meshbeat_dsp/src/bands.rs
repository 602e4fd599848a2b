//! Band Aggregator
//!
//! Partitions a spectrum into contiguous bin ranges, sums the magnitudes that
//! rise above each band's noise floor and turns the sums into 0-255 levels.
//!
//! # Algorithm
//!
//! Per tick:
//! 1. `band_sum[i]` = sum of bins in `start_bin..=end_bin` strictly above the
//!    noise floor (bins at or below it are left out, not clamped)
//! 2. `total = sum(band_sum)`
//! 3. `threshold = total / (threshold_base + total / threshold_knee)` and
//!    `divisor = divisor_base + total / divisor_knee`, recomputed only while
//!    `total > 0`
//! 4. A silent band resets its history. A band whose sum rose by more than
//!    `threshold` since its last emission emits
//!    `min(band_sum / divisor, 255)`. Anything else is hysteresis: no event,
//!    history untouched.
//!
//! The threshold grows sub-linearly with total energy so loud passages do not
//! retrigger on every small fluctuation, and the divisor grows with it to
//! compress the dynamic range.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{DspError, DspResult};
use crate::spectrum::Spectrum;

/// One contiguous range of spectrum bins aggregated into an output channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandConfig {
    /// First bin, inclusive
    pub start_bin: usize,
    /// Last bin, inclusive
    pub end_bin: usize,
    /// Magnitudes at or below this value do not count
    pub noise_floor: u16,
}

impl BandConfig {
    pub const fn new(start_bin: usize, end_bin: usize, noise_floor: u16) -> Self {
        Self {
            start_bin,
            end_bin,
            noise_floor,
        }
    }

    /// Sum of the magnitudes in range that exceed the noise floor
    ///
    /// Bins past the end of `bins` are treated as silent.
    pub fn sum(&self, bins: &[u16]) -> u32 {
        if self.start_bin >= bins.len() {
            return 0;
        }
        let end = self.end_bin.min(bins.len() - 1);

        bins[self.start_bin..=end]
            .iter()
            .filter(|&&magnitude| magnitude > self.noise_floor)
            .map(|&magnitude| magnitude as u32)
            .sum()
    }
}

/// Energy-dependent retrigger threshold and level divisor
///
/// The defaults are the empirically tuned values of the music demo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HysteresisTuning {
    pub threshold_base: u32,
    pub threshold_knee: u32,
    pub divisor_base: u32,
    pub divisor_knee: u32,
}

impl Default for HysteresisTuning {
    fn default() -> Self {
        Self {
            threshold_base: 4,
            threshold_knee: 5000,
            divisor_base: 6,
            divisor_knee: 1000,
        }
    }
}

impl HysteresisTuning {
    /// Reject values that would divide by zero
    pub fn validate(&self) -> DspResult<()> {
        if self.threshold_base == 0 {
            return Err(DspError::InvalidTuning("threshold_base"));
        }
        if self.threshold_knee == 0 {
            return Err(DspError::InvalidTuning("threshold_knee"));
        }
        if self.divisor_base == 0 {
            return Err(DspError::InvalidTuning("divisor_base"));
        }
        if self.divisor_knee == 0 {
            return Err(DspError::InvalidTuning("divisor_knee"));
        }
        Ok(())
    }

    /// Minimum rise that retriggers a band at this total energy
    pub fn threshold(&self, total: u32) -> u32 {
        total / self.threshold_base.saturating_add(total / self.threshold_knee)
    }

    /// Level divisor at this total energy
    pub fn divisor(&self, total: u32) -> u32 {
        self.divisor_base.saturating_add(total / self.divisor_knee)
    }
}

/// Output of one band crossing its retrigger threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandLevelEvent {
    pub band: usize,
    pub level: u8,
}

/// Per-band sums with hysteresis against rapid retriggering
///
/// The only state carried between ticks is the last emitted sum per band.
#[derive(Debug, Clone)]
pub struct BandAggregator {
    bands: Vec<BandConfig>,
    tuning: HysteresisTuning,
    spectrum_len: usize,
    band_sums: Vec<u32>,
    previous: Vec<u32>,
    threshold: u32,
    divisor: u32,
}

impl BandAggregator {
    /// Validate `bands` against a spectrum of `spectrum_len` bins
    pub fn configure(
        bands: &[BandConfig],
        spectrum_len: usize,
        tuning: HysteresisTuning,
    ) -> DspResult<Self> {
        if bands.is_empty() {
            return Err(DspError::NoBands);
        }

        for (band, config) in bands.iter().enumerate() {
            if config.start_bin > config.end_bin {
                return Err(DspError::InvertedBand {
                    band,
                    start_bin: config.start_bin,
                    end_bin: config.end_bin,
                });
            }
            if config.end_bin >= spectrum_len {
                return Err(DspError::BandOutOfRange {
                    band,
                    end_bin: config.end_bin,
                    spectrum_len,
                });
            }
        }

        tuning.validate()?;

        debug!(bands = bands.len(), spectrum_len, "Band aggregator configured");

        Ok(Self {
            bands: bands.to_vec(),
            tuning,
            spectrum_len,
            band_sums: vec![0; bands.len()],
            previous: vec![0; bands.len()],
            threshold: 0,
            divisor: tuning.divisor_base,
        })
    }

    /// Aggregate `spectrum` and return the bands that retriggered
    pub fn tick(&mut self, spectrum: &Spectrum) -> Vec<BandLevelEvent> {
        let mut events = Vec::new();
        self.tick_into(spectrum, &mut events);
        events
    }

    /// Aggregate `spectrum`, appending retriggered bands to `events`
    pub fn tick_into(&mut self, spectrum: &Spectrum, events: &mut Vec<BandLevelEvent>) {
        if spectrum.len() != self.spectrum_len {
            trace!(
                expected = self.spectrum_len,
                got = spectrum.len(),
                "Spectrum length differs from configuration, missing bins count as silent"
            );
        }

        let bins = spectrum.bins();
        for (sum, band) in self.band_sums.iter_mut().zip(&self.bands) {
            *sum = band.sum(bins);
        }

        let total = self
            .band_sums
            .iter()
            .fold(0u32, |acc, &sum| acc.saturating_add(sum));

        if total > 0 {
            self.threshold = self.tuning.threshold(total);
            self.divisor = self.tuning.divisor(total);
        }

        for (band, (&sum, previous)) in self
            .band_sums
            .iter()
            .zip(self.previous.iter_mut())
            .enumerate()
        {
            if sum == 0 {
                *previous = 0;
                continue;
            }

            // Signed: a falling band never retriggers
            let rise = sum as i64 - *previous as i64;
            if rise > self.threshold as i64 {
                let level = (sum / self.divisor).min(u8::MAX as u32) as u8;
                trace!(band, sum, rise, level, "Band retriggered");
                events.push(BandLevelEvent { band, level });
                *previous = sum;
            }
        }
    }

    /// Sums computed by the last tick
    pub fn band_sums(&self) -> &[u32] {
        &self.band_sums
    }

    /// Last emitted sum per band
    pub fn previous(&self) -> &[u32] {
        &self.previous
    }

    /// Threshold in effect after the last non-silent tick
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Divisor in effect after the last non-silent tick
    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    pub fn bands(&self) -> &[BandConfig] {
        &self.bands
    }

    pub fn spectrum_len(&self) -> usize {
        self.spectrum_len
    }

    pub fn tuning(&self) -> HysteresisTuning {
        self.tuning
    }

    /// Swap the hysteresis parameters, keeping band history
    pub fn set_tuning(&mut self, tuning: HysteresisTuning) -> DspResult<()> {
        tuning.validate()?;
        self.tuning = tuning;
        Ok(())
    }

    /// Forget all band history
    pub fn reset(&mut self) {
        self.band_sums.fill(0);
        self.previous.fill(0);
        self.threshold = 0;
        self.divisor = self.tuning.divisor_base;
    }
}
