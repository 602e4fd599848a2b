//! Pipeline Error Types

use thiserror::Error;

/// Errors that can occur in the spectrum pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid sample rate: {0}Hz")]
    InvalidSampleRate(u32),

    #[error("Invalid tick interval: {0}ms")]
    InvalidTickInterval(u64),

    #[error("Frequency floor bin {bin} is outside the {spectrum_len}-bin spectrum")]
    InvalidFrequencyFloor { bin: usize, spectrum_len: usize },

    #[error("Event queue capacity must be at least 1")]
    InvalidEventQueueCapacity,

    #[error("DSP configuration error: {0}")]
    Dsp(#[from] meshbeat_dsp::DspError),

    #[error("Failed to spawn pipeline thread: {0}")]
    ThreadSpawn(String),

    #[error("Pipeline not running")]
    NotRunning,

    #[error("Channel send error - receiver dropped")]
    ChannelSendError,
}

impl PipelineError {
    /// Whether this error comes from an invalid configuration
    ///
    /// Configuration errors abort pipeline startup; they are not retried.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidSampleRate(_)
                | PipelineError::InvalidTickInterval(_)
                | PipelineError::InvalidFrequencyFloor { .. }
                | PipelineError::InvalidEventQueueCapacity
                | PipelineError::Dsp(_)
        )
    }
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
