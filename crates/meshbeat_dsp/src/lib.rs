//! MeshBeat DSP - Spectrum Pipeline Core
//!
//! This crate provides the signal-processing half of MeshBeat:
//! - Double-buffered sample ring fed by a microphone driver
//! - FFT magnitude engine on the CMSIS Q15 output scale
//! - Single-slot "latest wins" spectrum mailbox
//! - Band aggregation with energy-dependent hysteresis into 0-255 levels
//! - Band to RGB channel mapping and the demo presets
//!
//! # Architecture
//!
//! ```text
//!  driver ──samples──▶ SampleRing ──block──▶ TransformEngine ──▶ SpectrumStore
//!                      (Analyzer, producer side)                      │
//!                                                                     ▼
//!                      sink ◀──BandLevelEvent── BandAggregator (periodic tick)
//! ```
//!
//! Nothing here spawns threads or blocks; `meshbeat_core` wires the two
//! halves to worker threads.

mod analyzer;
mod bands;
mod color;
mod error;
mod fft;
mod presets;
mod ring;
mod spectrum;
mod store;

pub use analyzer::Analyzer;
pub use bands::{BandAggregator, BandConfig, BandLevelEvent, HysteresisTuning};
pub use color::{BandColorMap, ColorChannel, Rgb};
pub use error::{DspError, DspResult};
pub use fft::{validate_block_size, TransformEngine, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
pub use presets::{find_preset, Preset, MUSIC, PRESETS, WHISTLE};
pub use ring::{BlockId, SampleRing};
pub use spectrum::{Spectrum, MAGNITUDE_MAX};
pub use store::SpectrumStore;
