//! Band Level Sinks
//!
//! Where band level events go at the end of each tick: a mesh RGB client, an
//! LED driver, a test recorder. Encoding for the transport is the sink's job.

use meshbeat_dsp::{BandColorMap, BandLevelEvent, Rgb};

/// Receiver of band level events
///
/// Called synchronously on the aggregator thread, once per event, in band
/// order. Implementations should return quickly; a slow sink delays the
/// next tick but never the transform thread.
pub trait LevelSink: Send {
    fn on_band_level(&mut self, event: BandLevelEvent);
}

impl<F> LevelSink for F
where
    F: FnMut(BandLevelEvent) + Send,
{
    fn on_band_level(&mut self, event: BandLevelEvent) {
        self(event)
    }
}

/// Discards every event; hosts that only poll `Event`s use this
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LevelSink for NullSink {
    fn on_band_level(&mut self, _event: BandLevelEvent) {}
}

/// Maps each event to a color and forwards it
///
/// Events for bands without a color channel are dropped.
pub struct ColorSink<F> {
    map: BandColorMap,
    forward: F,
}

impl<F> ColorSink<F>
where
    F: FnMut(usize, Rgb) + Send,
{
    pub fn new(map: BandColorMap, forward: F) -> Self {
        Self { map, forward }
    }
}

impl<F> LevelSink for ColorSink<F>
where
    F: FnMut(usize, Rgb) + Send,
{
    fn on_band_level(&mut self, event: BandLevelEvent) {
        if let Some(color) = self.map.color_for(&event) {
            (self.forward)(event.band, color);
        }
    }
}
