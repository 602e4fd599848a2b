//! DSP Error Types
//!
//! Every variant is a configuration error: the processing path itself never
//! fails, it clamps.

use thiserror::Error;

/// Errors that can occur while configuring the spectrum pipeline
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DspError {
    #[error("Invalid block size: {0} (must be a power of two in {min}..={max})", min = crate::MIN_BLOCK_SIZE, max = crate::MAX_BLOCK_SIZE)]
    InvalidBlockSize(usize),

    #[error("At least one band must be configured")]
    NoBands,

    #[error("Band {band} is inverted: start bin {start_bin} > end bin {end_bin}")]
    InvertedBand {
        band: usize,
        start_bin: usize,
        end_bin: usize,
    },

    #[error("Band {band} ends at bin {end_bin}, spectrum only has {spectrum_len} bins")]
    BandOutOfRange {
        band: usize,
        end_bin: usize,
        spectrum_len: usize,
    },

    #[error("Invalid hysteresis tuning: {0} must be non-zero")]
    InvalidTuning(&'static str),

    #[error("Failed to allocate {bytes} bytes for {what}")]
    AllocationFailed { what: &'static str, bytes: usize },
}

/// Result type alias for DSP configuration
pub type DspResult<T> = Result<T, DspError>;

/// Allocate a zeroed buffer without aborting on allocation failure
pub(crate) fn try_zeroed<T: Clone + Default>(len: usize, what: &'static str) -> DspResult<Vec<T>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| DspError::AllocationFailed {
            what,
            bytes: len.saturating_mul(std::mem::size_of::<T>()),
        })?;
    buffer.resize(len, T::default());
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DspError::InvalidBlockSize(300);
        assert!(err.to_string().contains("300"));

        let err = DspError::BandOutOfRange {
            band: 2,
            end_bin: 300,
            spectrum_len: 256,
        };
        let message = err.to_string();
        assert!(message.contains("300"));
        assert!(message.contains("256"));
    }

    #[test]
    fn test_try_zeroed() {
        let buffer: Vec<i16> = try_zeroed(512, "samples").unwrap();
        assert_eq!(buffer.len(), 512);
        assert!(buffer.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_try_zeroed_reports_capacity_overflow() {
        let result: DspResult<Vec<u64>> = try_zeroed(usize::MAX / 4, "huge");
        assert!(matches!(result, Err(DspError::AllocationFailed { what: "huge", .. })));
    }
}
