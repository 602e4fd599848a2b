//! Spectrum Pipeline Engine
//!
//! Owns the two pipeline threads and the channels between them and the host.
//!
//! ```text
//!  driver ── BlockProducer ──rtrb──▶ meshbeat-transform ──▶ SpectrumStore
//!                │ (samples + lengths,  (Analyzer, deadline check)    │
//!                │  wake, bounded 1)                                  │
//!                │                                               try_consume
//!                ▼                                                    ▼
//!             Event ◀──────────────────────────────────── meshbeat-aggregate
//!                                                         (BandAggregator, sink,
//!                                                          fixed tick schedule)
//! ```
//!
//! Every delivery is one block: the transform thread releases it to the
//! ring whatever its length and analyses it completely before it pulls the
//! next one, so the ring's two blocks plus two blocks of queue slack are all
//! the buffering there is. Transform + publish must finish within one block
//! period; misses are counted and reported, never fatal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use rtrb::{Consumer, RingBuffer};
use tracing::{debug, error, info, trace, warn};

use meshbeat_dsp::{
    Analyzer, BandAggregator, BandLevelEvent, HysteresisTuning, Spectrum, SpectrumStore,
};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::message::{post_event, Command, Event};
use crate::producer::BlockProducer;
use crate::sink::LevelSink;
use crate::stats::{PipelineStats, StatsSnapshot};

/// How long the transform thread sleeps between shutdown checks when idle
const TRANSFORM_IDLE_POLL: Duration = Duration::from_millis(50);

/// Running spectrum pipeline
///
/// This struct lives on the host thread and talks to the pipeline threads
/// through channels. Dropping it shuts the pipeline down.
pub struct SpectrumPipeline {
    command_sender: Sender<Command>,
    event_receiver: Receiver<Event>,
    transform_thread: Option<JoinHandle<()>>,
    aggregate_thread: Option<JoinHandle<()>>,
    shutdown_flag: Arc<AtomicBool>,
    stats: Arc<PipelineStats>,
    config: PipelineConfig,
}

impl SpectrumPipeline {
    /// Validate `config`, then spawn the pipeline threads
    ///
    /// Returns the pipeline and the producer handle for the driver. On a
    /// configuration error nothing is spawned and the caller should leave
    /// the dependent feature disabled.
    pub fn start<S>(config: PipelineConfig, sink: S) -> PipelineResult<(Self, BlockProducer)>
    where
        S: LevelSink + 'static,
    {
        let (analyzer, aggregator) = match Self::configure(&config) {
            Ok(parts) => parts,
            Err(e) => {
                error!("Spectrum pipeline configuration rejected: {}", e);
                return Err(e);
            }
        };

        let (command_sender, command_receiver) = bounded::<Command>(32);
        let (event_sender, event_receiver) = bounded::<Event>(config.event_queue_capacity);
        // Two blocks of slack: one being copied out, one arriving
        let (sample_producer, sample_consumer) = RingBuffer::<i16>::new(config.block_size * 2);
        // Never the limiting queue, even for one-sample blocks
        let (length_producer, length_consumer) = RingBuffer::<usize>::new(config.block_size * 2);
        let (wake_sender, wake_receiver) = bounded::<()>(1);

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(PipelineStats::new());
        let store = analyzer.store();

        let transform = TransformWorker {
            analyzer,
            samples: sample_consumer,
            lengths: length_consumer,
            wake: wake_receiver,
            events: event_sender.clone(),
            stats: Arc::clone(&stats),
            shutdown: Arc::clone(&shutdown_flag),
            budget: config.block_period(),
        };

        let transform_thread = thread::Builder::new()
            .name("meshbeat-transform".into())
            .spawn(move || transform.run())
            .map_err(|e| PipelineError::ThreadSpawn(e.to_string()))?;

        let aggregate = AggregateWorker {
            aggregator,
            spectrum: Spectrum::zeroed(config.spectrum_len()),
            store,
            sink: Box::new(sink),
            commands: command_receiver,
            events: event_sender.clone(),
            stats: Arc::clone(&stats),
            shutdown: Arc::clone(&shutdown_flag),
            interval: config.tick_interval(),
            sample_rate: config.sample_rate,
            frequency_floor_bin: config.frequency_floor_bin,
        };

        let aggregate_thread = match thread::Builder::new()
            .name("meshbeat-aggregate".into())
            .spawn(move || aggregate.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                shutdown_flag.store(true, Ordering::SeqCst);
                let _ = transform_thread.join();
                return Err(PipelineError::ThreadSpawn(e.to_string()));
            }
        };

        let producer = BlockProducer::new(
            sample_producer,
            length_producer,
            wake_sender,
            event_sender,
            Arc::clone(&stats),
            config.block_size,
        );

        info!(
            block_size = config.block_size,
            sample_rate = config.sample_rate,
            bands = config.bands.len(),
            tick_ms = config.tick_interval_ms,
            "Spectrum pipeline started"
        );

        Ok((
            Self {
                command_sender,
                event_receiver,
                transform_thread: Some(transform_thread),
                aggregate_thread: Some(aggregate_thread),
                shutdown_flag,
                stats,
                config,
            },
            producer,
        ))
    }

    /// Build both halves of the pipeline without starting anything
    fn configure(config: &PipelineConfig) -> PipelineResult<(Analyzer, BandAggregator)> {
        config.validate()?;
        let analyzer = Analyzer::configure(config.block_size)?;
        let aggregator =
            BandAggregator::configure(&config.bands, analyzer.spectrum_len(), config.tuning)?;
        Ok((analyzer, aggregator))
    }

    /// Replace the hysteresis parameters of the running aggregator
    pub fn set_tuning(&self, tuning: HysteresisTuning) -> PipelineResult<()> {
        tuning.validate()?;
        self.send_command(Command::SetTuning(tuning))
    }

    /// Forget all band history
    pub fn reset_history(&self) -> PipelineResult<()> {
        self.send_command(Command::ResetHistory)
    }

    /// Non-blocking poll for the next event
    pub fn poll_event(&self) -> Option<Event> {
        self.event_receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event
    pub fn wait_event(&self, timeout: Duration) -> Option<Event> {
        self.event_receiver.recv_timeout(timeout).ok()
    }

    /// Event receiver, for hosts that select over several channels
    pub fn events(&self) -> &Receiver<Event> {
        &self.event_receiver
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown_flag.load(Ordering::SeqCst)
    }

    /// Stop both threads and wait for them to exit
    pub fn shutdown(mut self) -> StatsSnapshot {
        self.stop();
        self.stats.snapshot()
    }

    fn stop(&mut self) {
        if self.transform_thread.is_none() && self.aggregate_thread.is_none() {
            return;
        }

        let _ = self.command_sender.try_send(Command::Shutdown);
        self.shutdown_flag.store(true, Ordering::SeqCst);

        for handle in [self.transform_thread.take(), self.aggregate_thread.take()]
            .into_iter()
            .flatten()
        {
            if handle.join().is_err() {
                error!("Pipeline thread panicked");
            }
        }

        info!("Spectrum pipeline stopped");
    }

    fn send_command(&self, command: Command) -> PipelineResult<()> {
        if !self.is_running() {
            return Err(PipelineError::NotRunning);
        }
        self.command_sender
            .send(command)
            .map_err(|_| PipelineError::ChannelSendError)
    }
}

impl Drop for SpectrumPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Producer-side thread: samples in, spectra published
struct TransformWorker {
    analyzer: Analyzer,
    samples: Consumer<i16>,
    lengths: Consumer<usize>,
    wake: Receiver<()>,
    events: Sender<Event>,
    stats: Arc<PipelineStats>,
    shutdown: Arc<AtomicBool>,
    budget: Duration,
}

impl TransformWorker {
    fn run(mut self) {
        debug!("Transform thread started");

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.wake.recv_timeout(TRANSFORM_IDLE_POLL) {
                Ok(()) => self.drain(),
                Err(RecvTimeoutError::Timeout) => {
                    // Catch samples whose wake-up coalesced with an earlier one
                    self.drain();
                }
                Err(RecvTimeoutError::Disconnected) => {
                    // Producer dropped: analyse what is left and stop
                    self.drain();
                    break;
                }
            }
        }

        debug!(
            blocks = self.analyzer.blocks_analyzed(),
            "Transform thread exiting"
        );
    }

    /// Analyse every queued block, one ring release per delivery
    fn drain(&mut self) {
        while let Ok(&len) = self.lengths.peek() {
            let chunk = match self.samples.read_chunk(len) {
                Ok(chunk) => chunk,
                Err(_) => return,
            };

            let ring = self.analyzer.ring_mut();
            let filled = ring.active();
            let (first, second) = chunk.as_slices();
            ring.fill_active(first);
            ring.fill_active(second);
            chunk.commit_all();
            let _ = self.lengths.pop();

            if self.analyzer.on_block_filled(filled) {
                self.stats.record_analyzed(1);
                self.check_deadline();
            }
        }
    }

    fn check_deadline(&self) {
        let elapsed = self.analyzer.last_transform_time();
        if elapsed <= self.budget {
            return;
        }

        self.stats.record_deadline_miss();
        let elapsed_us = elapsed.as_micros() as u64;
        let budget_us = self.budget.as_micros() as u64;
        warn!(elapsed_us, budget_us, "Transform missed its block deadline");
        post_event(
            &self.events,
            &self.stats,
            Event::DeadlineMissed {
                elapsed_us,
                budget_us,
            },
        );
    }
}

/// Consumer-side thread: periodic tick over the latest spectrum
struct AggregateWorker {
    aggregator: BandAggregator,
    spectrum: Spectrum,
    store: Arc<SpectrumStore>,
    sink: Box<dyn LevelSink>,
    commands: Receiver<Command>,
    events: Sender<Event>,
    stats: Arc<PipelineStats>,
    shutdown: Arc<AtomicBool>,
    interval: Duration,
    sample_rate: u32,
    frequency_floor_bin: Option<usize>,
}

impl AggregateWorker {
    fn run(mut self) {
        debug!("Aggregate thread started");

        let mut level_events = Vec::with_capacity(self.aggregator.bands().len());
        let mut next_tick = Instant::now() + self.interval;

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.commands.recv_deadline(next_tick) {
                Ok(Command::SetTuning(tuning)) => match self.aggregator.set_tuning(tuning) {
                    Ok(()) => debug!(?tuning, "Hysteresis tuning updated"),
                    Err(e) => {
                        warn!("Rejected tuning update: {}", e);
                        post_event(&self.events, &self.stats, Event::error(e));
                    }
                },
                Ok(Command::ResetHistory) => {
                    debug!("Band history reset");
                    self.aggregator.reset();
                }
                Ok(Command::Shutdown) => {
                    info!("Shutdown command received");
                    self.shutdown.store(true, Ordering::SeqCst);
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.tick(&mut level_events);
                    next_tick += self.interval;

                    // Fell behind (slow sink): skip missed ticks, don't burst
                    let now = Instant::now();
                    if next_tick < now {
                        next_tick = now + self.interval;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.shutdown.store(true, Ordering::SeqCst);
                }
            }
        }

        post_event(&self.events, &self.stats, Event::Stopped);
        debug!("Aggregate thread exiting");
    }

    fn tick(&mut self, level_events: &mut Vec<BandLevelEvent>) {
        if !self.store.try_consume_into(&mut self.spectrum) {
            trace!("No new spectrum this tick");
            return;
        }
        self.stats.record_consumed();

        level_events.clear();
        self.aggregator.tick_into(&self.spectrum, level_events);

        for event in level_events.iter() {
            self.sink.on_band_level(*event);
            post_event(&self.events, &self.stats, Event::from(*event));
        }
        if !level_events.is_empty() {
            self.stats.record_events(level_events.len() as u64);
        }

        if let Some(floor_bin) = self.frequency_floor_bin {
            if let Some(hz) = self.spectrum.mean_active_frequency(self.sample_rate, floor_bin) {
                post_event(&self.events, &self.stats, Event::MeanFrequency { hz });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_EVENT_QUEUE_CAPACITY;
    use meshbeat_dsp::{BandConfig, DspError, WHISTLE};
    use std::sync::Mutex;

    fn cosine_block(block_size: usize, bin: usize, amplitude: f32) -> Vec<i16> {
        (0..block_size)
            .map(|n| {
                let phase = 2.0 * std::f32::consts::PI * (bin * n) as f32 / block_size as f32;
                (amplitude * phase.cos()).round() as i16
            })
            .collect()
    }

    fn single_band_config() -> PipelineConfig {
        PipelineConfig {
            block_size: 256,
            sample_rate: 16000,
            bands: vec![BandConfig::new(0, 80, 100)],
            tuning: HysteresisTuning::default(),
            tick_interval_ms: 10,
            frequency_floor_bin: None,
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
        }
    }

    /// Poll until `predicate` holds or two seconds pass
    fn wait_for(mut predicate: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if predicate() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_invalid_config_spawns_nothing() {
        let config = PipelineConfig {
            block_size: 300,
            ..single_band_config()
        };
        let err = SpectrumPipeline::start(config, crate::sink::NullSink)
            .err()
            .unwrap();

        assert!(err.is_config_error());
        assert!(matches!(err, PipelineError::Dsp(DspError::InvalidBlockSize(300))));
    }

    #[test]
    fn test_band_out_of_range_rejected() {
        let config = PipelineConfig {
            bands: vec![BandConfig::new(0, 128, 0)],
            ..single_band_config()
        };
        let err = SpectrumPipeline::start(config, crate::sink::NullSink)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            PipelineError::Dsp(DspError::BandOutOfRange { .. })
        ));
    }

    #[test]
    fn test_tone_reaches_sink() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink_log = Arc::clone(&received);
        let sink = move |event: BandLevelEvent| sink_log.lock().unwrap().push(event);

        let (pipeline, mut producer) =
            SpectrumPipeline::start(single_band_config(), sink).unwrap();

        assert!(producer.deliver(&cosine_block(256, 40, 10000.0)));
        assert!(wait_for(|| !received.lock().unwrap().is_empty()));

        assert_eq!(
            received.lock().unwrap().as_slice(),
            &[BandLevelEvent { band: 0, level: 255 }]
        );

        let mut saw_event = false;
        while let Some(event) = pipeline.wait_event(Duration::from_millis(100)) {
            if event == (Event::BandLevel { band: 0, level: 255 }) {
                saw_event = true;
                break;
            }
        }
        assert!(saw_event);

        let stats = pipeline.shutdown();
        assert_eq!(stats.blocks_delivered, 1);
        assert_eq!(stats.blocks_analyzed, 1);
        assert_eq!(stats.events_emitted, 1);
    }

    #[test]
    fn test_repeated_tone_emits_once() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink_log = Arc::clone(&received);
        let sink = move |event: BandLevelEvent| sink_log.lock().unwrap().push(event);

        let (pipeline, mut producer) =
            SpectrumPipeline::start(single_band_config(), sink).unwrap();
        let block = cosine_block(256, 40, 10000.0);

        for round in 1..=3 {
            assert!(producer.deliver(&block));
            assert!(wait_for(|| pipeline.stats().spectra_consumed == round));
        }

        pipeline.shutdown();
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_silence_emits_nothing() {
        let (pipeline, mut producer) =
            SpectrumPipeline::start(single_band_config(), crate::sink::NullSink).unwrap();

        assert!(producer.deliver(&[0; 256]));
        assert!(wait_for(|| pipeline.stats().spectra_consumed == 1));

        let stats = pipeline.shutdown();
        assert_eq!(stats.events_emitted, 0);
    }

    #[test]
    fn test_mean_frequency_event() {
        let mut config = PipelineConfig::from_preset(&WHISTLE);
        config.tick_interval_ms = 10;

        let (pipeline, mut producer) =
            SpectrumPipeline::start(config, crate::sink::NullSink).unwrap();

        // Bin 32 at 16 kHz / 256 = 2000 Hz
        assert!(producer.deliver(&cosine_block(256, 32, 8000.0)));

        let mut mean = None;
        let found = wait_for(|| {
            while let Some(event) = pipeline.poll_event() {
                if let Event::MeanFrequency { hz } = event {
                    mean = Some(hz);
                }
            }
            mean.is_some()
        });

        assert!(found);
        assert_eq!(mean, Some(2000));
    }

    #[test]
    fn test_set_tuning_validates() {
        let (pipeline, _producer) =
            SpectrumPipeline::start(single_band_config(), crate::sink::NullSink).unwrap();

        let bad = HysteresisTuning {
            divisor_base: 0,
            ..Default::default()
        };
        assert!(pipeline.set_tuning(bad).is_err());
        assert!(pipeline.set_tuning(HysteresisTuning::default()).is_ok());
        assert!(pipeline.reset_history().is_ok());
    }

    #[test]
    fn test_shutdown_stops_threads() {
        let (pipeline, producer) =
            SpectrumPipeline::start(single_band_config(), crate::sink::NullSink).unwrap();
        assert!(pipeline.is_running());

        pipeline.shutdown();
        assert!(wait_for(|| !producer.is_connected()));
    }

    #[test]
    fn test_dropping_producer_keeps_pipeline_alive() {
        let (pipeline, mut producer) =
            SpectrumPipeline::start(single_band_config(), crate::sink::NullSink).unwrap();

        assert!(producer.deliver(&[500; 256]));
        drop(producer);

        // The last block is still analysed and aggregated
        assert!(wait_for(|| pipeline.stats().spectra_consumed == 1));
        assert!(pipeline.is_running());
    }

    #[test]
    fn test_independent_pipelines() {
        let (first, mut first_producer) =
            SpectrumPipeline::start(single_band_config(), crate::sink::NullSink).unwrap();
        let (second, _second_producer) =
            SpectrumPipeline::start(single_band_config(), crate::sink::NullSink).unwrap();

        assert!(first_producer.deliver(&[100; 256]));
        assert!(wait_for(|| first.stats().blocks_analyzed == 1));
        assert_eq!(second.stats().blocks_analyzed, 0);
    }

    #[test]
    fn test_short_delivery_is_its_own_block() {
        let (pipeline, mut producer) =
            SpectrumPipeline::start(single_band_config(), crate::sink::NullSink).unwrap();

        // Half a block is analysed immediately, sliding the window
        assert!(producer.deliver(&[1000; 128]));
        assert!(wait_for(|| pipeline.stats().spectra_consumed == 1));
        assert_eq!(pipeline.stats().blocks_analyzed, 1);

        // Two more halves are two more spectra, not one merged block
        assert!(producer.deliver(&[1000; 128]));
        assert!(producer.deliver(&[1000; 128]));
        assert!(wait_for(|| pipeline.stats().blocks_analyzed == 3));
    }

    #[test]
    fn test_unpolled_event_queue_stays_bounded() {
        let emitted = Arc::new(Mutex::new(0usize));
        let sink_count = Arc::clone(&emitted);
        let sink = move |_event: BandLevelEvent| *sink_count.lock().unwrap() += 1;

        let config = PipelineConfig {
            event_queue_capacity: 4,
            ..single_band_config()
        };
        let (pipeline, mut producer) = SpectrumPipeline::start(config, sink).unwrap();
        let loud = cosine_block(256, 40, 10000.0);
        let silent = vec![0i16; 256];

        // Loud after silent retriggers every time; the host never polls
        for round in 1..=12u64 {
            let block = if round % 2 == 1 { &loud } else { &silent };
            assert!(producer.deliver(block));
            assert!(wait_for(|| pipeline.stats().spectra_consumed == round));
        }

        assert_eq!(*emitted.lock().unwrap(), 6);
        assert_eq!(pipeline.events().len(), 4);
        assert!(pipeline.stats().events_dropped >= 2);
    }

    #[test]
    fn test_every_late_block_is_counted() {
        let (sample_sender, samples) = RingBuffer::new(256);
        let (length_sender, lengths) = RingBuffer::new(256);
        let (wake_sender, wake) = bounded(1);
        let (event_sender, events) = bounded(16);
        let stats = Arc::new(PipelineStats::new());

        let mut producer = BlockProducer::new(
            sample_sender,
            length_sender,
            wake_sender,
            event_sender.clone(),
            Arc::clone(&stats),
            64,
        );
        let mut worker = TransformWorker {
            analyzer: Analyzer::configure(64).unwrap(),
            samples,
            lengths,
            wake,
            events: event_sender,
            stats: Arc::clone(&stats),
            shutdown: Arc::new(AtomicBool::new(false)),
            budget: Duration::ZERO,
        };

        // Three blocks queued before the worker wakes, all drained in one pass
        for _ in 0..3 {
            assert!(producer.deliver(&[700; 64]));
        }
        worker.drain();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.blocks_analyzed, 3);
        assert_eq!(snapshot.deadline_misses, 3);
        assert_eq!(events.len(), 3);
    }
}
