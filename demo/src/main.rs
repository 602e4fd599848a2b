//! MeshBeat demo host
//!
//! Stands in for the microphone driver and the mesh RGB client: a synthetic
//! signal is delivered block by block at the real sample rate, and every
//! band level that gets through the hysteresis is logged as a color.
//!
//! Usage: `meshbeat_demo --preset whistle --seconds 10`

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use meshbeat_core::{BandColorMap, ColorSink, Event, PipelineConfig, Rgb, SpectrumPipeline};
use meshbeat_dsp::find_preset;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "meshbeat_demo")]
#[command(about = "Drive the MeshBeat spectrum pipeline with a synthetic signal", long_about = None)]
struct Args {
    /// Built-in preset: music or whistle
    #[arg(long, value_name = "NAME", default_value = "music")]
    preset: String,

    /// How long to run
    #[arg(long, value_name = "SECONDS", default_value_t = 5)]
    seconds: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("meshbeat=debug")),
        )
        .init();

    let preset =
        find_preset(&args.preset).ok_or_else(|| anyhow!("unknown preset '{}'", args.preset))?;
    let config = PipelineConfig::from_preset(preset);

    info!("Starting MeshBeat demo with preset '{}'", preset.name);

    let sink = ColorSink::new(BandColorMap::default(), |band: usize, rgb: Rgb| {
        info!(band, red = rgb.red, green = rgb.green, blue = rgb.blue, "Band color");
    });

    let (pipeline, mut producer) = match SpectrumPipeline::start(config.clone(), sink) {
        Ok(parts) => parts,
        Err(e) if e.is_config_error() => {
            // The host keeps running without the visualizer
            error!("Spectrum visualizer disabled: {}", e);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let mut signal = SweepSignal::new(&config);
    let mut block = vec![0i16; config.block_size];
    let period = config.block_period();
    let end = Instant::now() + Duration::from_secs(args.seconds);
    let mut next_block = Instant::now();

    while Instant::now() < end {
        signal.fill(&mut block);
        if !producer.deliver(&block) {
            warn!("Block dropped");
        }

        while let Some(event) = pipeline.poll_event() {
            match event {
                Event::MeanFrequency { hz } => info!(hz, "Mean frequency"),
                Event::DeadlineMissed { elapsed_us, budget_us } => {
                    warn!(elapsed_us, budget_us, "Deadline missed")
                }
                Event::Error { message } => error!("Pipeline error: {}", message),
                _ => {}
            }
        }

        next_block += period;
        if let Some(wait) = next_block.checked_duration_since(Instant::now()) {
            thread::sleep(wait);
        }
    }

    let stats = pipeline.shutdown();
    info!(
        delivered = stats.blocks_delivered,
        analyzed = stats.blocks_analyzed,
        overruns = stats.overruns,
        deadline_misses = stats.deadline_misses,
        events = stats.events_emitted,
        "Demo finished"
    );

    Ok(())
}

/// Tone that walks across the bins of every configured band, with a beat
struct SweepSignal {
    sample_rate: f32,
    frequencies: Vec<f32>,
    phase: f32,
    position: u64,
}

impl SweepSignal {
    fn new(config: &PipelineConfig) -> Self {
        let frequencies = config
            .bands
            .iter()
            .map(|band| config.bin_frequency_hz((band.start_bin + band.end_bin) / 2) as f32)
            .collect();
        Self {
            sample_rate: config.sample_rate as f32,
            frequencies,
            phase: 0.0,
            position: 0,
        }
    }

    fn fill(&mut self, block: &mut [i16]) {
        let rate = self.sample_rate as u64;
        for sample in block.iter_mut() {
            // One band per half second, loud for the first 100 ms of each quarter
            let step = (self.position * 2 / rate.max(1)) as usize;
            let frequency = self.frequencies[step % self.frequencies.len().max(1)];
            let beat = (self.position % (rate / 4).max(1)) < rate / 10;
            let amplitude = if beat { 12000.0 } else { 800.0 };

            self.phase += std::f32::consts::TAU * frequency / self.sample_rate;
            if self.phase > std::f32::consts::TAU {
                self.phase -= std::f32::consts::TAU;
            }
            *sample = (amplitude * self.phase.sin()) as i16;
            self.position += 1;
        }
    }
}
