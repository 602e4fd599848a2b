//! Built-in Pipeline Presets
//!
//! The demos differ only in these parameters; they all run the same engine.

use crate::bands::BandConfig;

/// Named demo configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub name: &'static str,
    pub block_size: usize,
    pub sample_rate: u32,
    pub bands: &'static [BandConfig],
    pub tick_interval_ms: u64,
    /// First bin considered by the mean frequency tracker, if enabled
    pub frequency_floor_bin: Option<usize>,
}

/// Three-band music visualizer: bass, mids, treble at 31.25 Hz per bin
pub const MUSIC: Preset = Preset {
    name: "Music",
    block_size: 512,
    sample_rate: 16000,
    bands: &[
        BandConfig::new(0, 80, 100),
        BandConfig::new(81, 115, 100),
        BandConfig::new(116, 255, 100),
    ],
    tick_interval_ms: 60,
    frequency_floor_bin: None,
};

/// Whistle tracker: everything from 500 Hz up, mean frequency reported
pub const WHISTLE: Preset = Preset {
    name: "Whistle",
    block_size: 256,
    sample_rate: 16000,
    bands: &[BandConfig::new(8, 127, 0)],
    tick_interval_ms: 200,
    frequency_floor_bin: Some(8),
};

/// List of built-in presets
pub const PRESETS: &[Preset] = &[MUSIC, WHISTLE];

/// Look up a preset by name, ignoring case
pub fn find_preset(name: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}
