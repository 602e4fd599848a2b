//! Magnitude Spectrum
//!
//! One non-negative magnitude per positive-frequency bin, in the Q15 output
//! scale `0..=MAGNITUDE_MAX` (see the transform module for the conversion).

/// Largest representable magnitude (Q15 full scale)
pub const MAGNITUDE_MAX: u16 = i16::MAX as u16;

/// Magnitude spectrum of one analysed block
///
/// Length is `block_size / 2`: bin `k` covers `k * sample_rate / block_size` Hz.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Spectrum {
    bins: Vec<u16>,
}

impl Spectrum {
    /// All-zero spectrum of `len` bins
    pub fn zeroed(len: usize) -> Self {
        Self { bins: vec![0; len] }
    }

    /// Wrap existing magnitudes, clamping them to the Q15 range
    pub fn from_bins(mut bins: Vec<u16>) -> Self {
        for bin in &mut bins {
            *bin = (*bin).min(MAGNITUDE_MAX);
        }
        Self { bins }
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn bins(&self) -> &[u16] {
        &self.bins
    }

    pub(crate) fn bins_mut(&mut self) -> &mut [u16] {
        &mut self.bins
    }

    /// Copy `other` into `self`, reusing the allocation when lengths match
    pub fn copy_from(&mut self, other: &Spectrum) {
        if self.bins.len() == other.bins.len() {
            self.bins.copy_from_slice(&other.bins);
        } else {
            self.bins.clone_from(&other.bins);
        }
    }

    /// True when every bin is zero
    pub fn is_silent(&self) -> bool {
        self.bins.iter().all(|&b| b == 0)
    }

    /// Center frequency of `bin` in Hz (integer, truncated)
    pub fn bin_frequency_hz(bin: usize, sample_rate: u32, block_size: usize) -> u32 {
        if block_size == 0 {
            return 0;
        }
        (bin as u64 * sample_rate as u64 / block_size as u64) as u32
    }

    /// Running mean frequency of every non-zero bin from `floor_bin` upward
    ///
    /// Returns `None` when no bin in range carries energy. `block_size` is the
    /// transform length, i.e. twice the spectrum length.
    pub fn mean_active_frequency(&self, sample_rate: u32, floor_bin: usize) -> Option<u32> {
        let block_size = self.bins.len() * 2;
        let mut mean = 0i64;
        let mut count = 0i64;

        for (bin, &magnitude) in self.bins.iter().enumerate().skip(floor_bin) {
            if magnitude == 0 {
                continue;
            }
            let hz = Self::bin_frequency_hz(bin, sample_rate, block_size) as i64;
            // Incremental mean keeps the accumulator bounded
            count += 1;
            mean += (hz - mean) / count;
        }

        (count > 0).then_some(mean as u32)
    }
}

impl AsRef<[u16]> for Spectrum {
    fn as_ref(&self) -> &[u16] {
        &self.bins
    }
}
