//! MeshBeat Core - Spectrum Pipeline Engine
//!
//! This crate runs the MeshBeat DSP components on worker threads:
//! - Non-blocking producer handle for the microphone driver
//! - Transform thread with a per-block deadline check
//! - Aggregator thread on a fixed tick, feeding a level sink
//! - Lock-free counters and an event channel for the host
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Host Thread                          │
//! │   SpectrumPipeline ──commands──▶  ◀──events── (levels, …)   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ crossbeam-channel
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Driver ──rtrb──▶ Transform ──SpectrumStore──▶ Aggregate    │
//! │  callback         (per block)                  (per tick)   │
//! │                                                   │         │
//! │                                                LevelSink    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod engine;
mod error;
mod message;
mod producer;
mod sink;
mod stats;

pub use config::{PipelineConfig, DEFAULT_EVENT_QUEUE_CAPACITY};
pub use engine::SpectrumPipeline;
pub use error::{PipelineError, PipelineResult};
pub use message::{Command, Event};
pub use producer::BlockProducer;
pub use sink::{ColorSink, LevelSink, NullSink};
pub use stats::{PipelineStats, StatsSnapshot};

// Re-export DSP types for convenience
pub use meshbeat_dsp::{
    BandColorMap, BandConfig, BandLevelEvent, HysteresisTuning, Preset, Rgb, MUSIC, WHISTLE,
};
