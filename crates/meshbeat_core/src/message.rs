//! Message Types for Thread Communication
//!
//! Commands flow from the host -> aggregator thread
//! Events flow from both pipeline threads -> host

use crossbeam_channel::{Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::trace;

use meshbeat_dsp::{BandLevelEvent, HysteresisTuning};

use crate::stats::PipelineStats;

/// Commands sent from the host to the running pipeline
#[derive(Debug, Clone)]
pub enum Command {
    /// Replace the hysteresis parameters, keeping band history
    SetTuning(HysteresisTuning),

    /// Forget band history so the next loud tick retriggers every band
    ResetHistory,

    /// Stop both pipeline threads
    Shutdown,
}

/// Events sent from the pipeline to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    /// A band crossed its retrigger threshold
    BandLevel { band: usize, level: u8 },

    /// Mean frequency of the active bins above the configured floor
    MeanFrequency { hz: u32 },

    /// The producer outran the transform thread; the block was dropped
    Overrun { dropped_samples: usize },

    /// Transform + publish took longer than one block period
    DeadlineMissed { elapsed_us: u64, budget_us: u64 },

    /// Error occurred
    Error { message: String },

    /// Pipeline threads exited
    Stopped,
}

impl Event {
    /// Create an error event from any error type
    pub fn error<E: std::fmt::Display>(err: E) -> Self {
        Event::Error {
            message: err.to_string(),
        }
    }
}

impl From<BandLevelEvent> for Event {
    fn from(event: BandLevelEvent) -> Self {
        Event::BandLevel {
            band: event.band,
            level: event.level,
        }
    }
}

/// Post an event without blocking
///
/// The event queue is bounded: a host that only uses a level sink and never
/// polls must not grow it forever. When it is full the event is dropped and
/// counted.
pub(crate) fn post_event(sender: &Sender<Event>, stats: &PipelineStats, event: Event) {
    match sender.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            stats.record_event_dropped();
            trace!(?event, "Event queue full, dropping event");
        }
        // Host gone, nobody to tell
        Err(TrySendError::Disconnected(_)) => {}
    }
}
