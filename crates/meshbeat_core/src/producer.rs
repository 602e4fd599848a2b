//! Sample Producer Handle
//!
//! The driver-facing end of the pipeline. A microphone driver calls
//! [`BlockProducer::deliver`] from its "buffer filled" callback; the samples
//! travel to the transform thread over a lock-free SPSC ring buffer, the
//! block length follows on a second one, and a wake-up is posted. Each
//! delivery is analysed as one block, however long it is.
//!
//! # Real-time Safety
//!
//! `deliver` never blocks and never allocates. When the transform thread has
//! fallen behind there is no room in the queue: the whole block is dropped
//! and counted as an overrun. The consumer is never overwritten while it
//! reads.

use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};
use rtrb::Producer;
use tracing::warn;

use crate::message::{post_event, Event};
use crate::stats::PipelineStats;

/// Handle through which the microphone driver feeds the pipeline
pub struct BlockProducer {
    samples: Producer<i16>,
    /// Length of every queued block, in delivery order
    lengths: Producer<usize>,
    wake: Sender<()>,
    event_sender: Sender<Event>,
    stats: Arc<PipelineStats>,
    block_size: usize,
}

impl BlockProducer {
    pub(crate) fn new(
        samples: Producer<i16>,
        lengths: Producer<usize>,
        wake: Sender<()>,
        event_sender: Sender<Event>,
        stats: Arc<PipelineStats>,
        block_size: usize,
    ) -> Self {
        Self {
            samples,
            lengths,
            wake,
            event_sender,
            stats,
            block_size,
        }
    }

    /// Configured block size in samples
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Hand a filled block to the pipeline
    ///
    /// A block longer than the configured size is truncated to its first
    /// `block_size` samples. A shorter one is analysed on its own, sliding
    /// the analysis window. Returns false if the block was dropped because
    /// the transform thread is behind.
    pub fn deliver(&mut self, block: &[i16]) -> bool {
        let block = &block[..block.len().min(self.block_size)];
        self.push(block.len(), block.iter().copied())
    }

    /// Hand a filled block of little-endian PCM bytes to the pipeline
    ///
    /// `bytes.len()` is the byte length reported by the driver; a trailing
    /// odd byte is ignored.
    pub fn deliver_bytes(&mut self, bytes: &[u8]) -> bool {
        let count = (bytes.len() / 2).min(self.block_size);
        let samples = bytes
            .chunks_exact(2)
            .take(count)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]));
        self.push(count, samples)
    }

    /// Whether the transform thread is still attached
    pub fn is_connected(&self) -> bool {
        !self.samples.is_abandoned()
    }

    fn push<I>(&mut self, count: usize, samples: I) -> bool
    where
        I: Iterator<Item = i16>,
    {
        if count == 0 {
            return true;
        }

        // All or nothing: a partially queued block would desynchronise blocks
        if self.lengths.is_full() {
            return self.overrun(count);
        }
        let chunk = match self.samples.write_chunk_uninit(count) {
            Ok(chunk) => chunk,
            Err(_) => return self.overrun(count),
        };

        chunk.fill_from_iter(samples);
        // Only this side fills the length queue, so the room checked above is still there
        let _ = self.lengths.push(count);
        self.stats.record_delivery();

        // A pending wake-up already covers this block
        match self.wake.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                warn!("Transform thread gone, block will not be analysed");
            }
        }
        true
    }

    fn overrun(&self, count: usize) -> bool {
        self.stats.record_overrun();
        warn!(dropped = count, "Transform thread behind, dropping block");
        post_event(
            &self.event_sender,
            &self.stats,
            Event::Overrun {
                dropped_samples: count,
            },
        );
        false
    }
}
