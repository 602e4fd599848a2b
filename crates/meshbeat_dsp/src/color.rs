//! Band Level to Color Mapping
//!
//! The music demo drives one RGB node per band: each band lights a single
//! color channel at its level, the other channels off.

use serde::{Deserialize, Serialize};

use crate::bands::BandLevelEvent;

/// 8-bit RGB color as carried by the mesh RGB set message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

/// Color channel driven by a band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorChannel {
    Red,
    Green,
    Blue,
}

impl ColorChannel {
    /// Color with only this channel lit at `level`
    pub fn with_level(self, level: u8) -> Rgb {
        match self {
            ColorChannel::Red => Rgb {
                red: level,
                ..Rgb::default()
            },
            ColorChannel::Green => Rgb {
                green: level,
                ..Rgb::default()
            },
            ColorChannel::Blue => Rgb {
                blue: level,
                ..Rgb::default()
            },
        }
    }
}

/// Band index to color channel table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandColorMap {
    channels: Vec<ColorChannel>,
}

impl Default for BandColorMap {
    /// Bass blue, mids green, treble red
    fn default() -> Self {
        Self::new(vec![ColorChannel::Blue, ColorChannel::Green, ColorChannel::Red])
    }
}

impl BandColorMap {
    pub fn new(channels: Vec<ColorChannel>) -> Self {
        Self { channels }
    }

    pub fn channel(&self, band: usize) -> Option<ColorChannel> {
        self.channels.get(band).copied()
    }

    /// Color for an event, `None` for a band without a channel
    pub fn color_for(&self, event: &BandLevelEvent) -> Option<Rgb> {
        self.channel(event.band)
            .map(|channel| channel.with_level(event.level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping() {
        let map = BandColorMap::default();

        let bass = map.color_for(&BandLevelEvent { band: 0, level: 200 });
        assert_eq!(bass, Some(Rgb { red: 0, green: 0, blue: 200 }));

        let treble = map.color_for(&BandLevelEvent { band: 2, level: 17 });
        assert_eq!(treble, Some(Rgb { red: 17, green: 0, blue: 0 }));
    }

    #[test]
    fn test_unknown_band() {
        let map = BandColorMap::default();
        assert_eq!(map.color_for(&BandLevelEvent { band: 3, level: 1 }), None);
    }

    #[test]
    fn test_custom_mapping() {
        let map = BandColorMap::new(vec![ColorChannel::Green]);
        assert_eq!(map.channel(0), Some(ColorChannel::Green));
        assert_eq!(
            map.color_for(&BandLevelEvent { band: 0, level: 9 }),
            Some(Rgb { red: 0, green: 9, blue: 0 })
        );
    }
}
