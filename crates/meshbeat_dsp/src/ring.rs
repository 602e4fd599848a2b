//! Double-Buffered Sample Ring
//!
//! Two fixed-size PCM blocks. The producer (microphone driver) fills the
//! *active* block while the transform engine reads the other one.
//!
//! # Double-buffering discipline
//!
//! Two blocks are enough only because the consumer analyses a block completely
//! within the same scheduling step it is handed, before the producer can
//! finish the next one. If the consumer could fall more than one full block
//! behind, a third block or an explicit lock would be required.

use tracing::trace;

use crate::error::{try_zeroed, DspError, DspResult};

/// Identifies one of the two blocks of a [`SampleRing`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockId {
    A,
    B,
}

impl BlockId {
    /// The opposite block
    #[inline]
    pub fn other(self) -> Self {
        match self {
            BlockId::A => BlockId::B,
            BlockId::B => BlockId::A,
        }
    }

    #[inline]
    fn index(self) -> usize {
        match self {
            BlockId::A => 0,
            BlockId::B => 1,
        }
    }
}

/// Two sample blocks plus the active-block index
///
/// Allocated once by [`SampleRing::configure`] and reused for the lifetime
/// of the pipeline; no allocation happens per cycle.
#[derive(Debug)]
pub struct SampleRing {
    blocks: [Vec<i16>; 2],
    /// Samples written into each block during its last fill
    filled: [usize; 2],
    active: BlockId,
    block_size: usize,
}

impl SampleRing {
    /// Allocate both blocks of `block_size` samples
    pub fn configure(block_size: usize) -> DspResult<Self> {
        if block_size == 0 {
            return Err(DspError::InvalidBlockSize(block_size));
        }

        let blocks = [
            try_zeroed(block_size, "sample block A")?,
            try_zeroed(block_size, "sample block B")?,
        ];

        Ok(Self {
            blocks,
            filled: [0; 2],
            active: BlockId::A,
            block_size,
        })
    }

    /// Capacity of each block in samples
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Block currently owned by the producer
    pub fn active(&self) -> BlockId {
        self.active
    }

    /// Number of samples written into the active block so far
    pub fn active_fill(&self) -> usize {
        self.filled[self.active.index()]
    }

    /// Whether the active block has no room left
    pub fn is_active_full(&self) -> bool {
        self.active_fill() >= self.block_size
    }

    /// Direct access to the active block, for drivers that write in place
    ///
    /// Marks the whole block as filled: a driver handed the raw buffer is
    /// expected to write all of it before reporting it.
    pub fn active_block_mut(&mut self) -> &mut [i16] {
        let index = self.active.index();
        self.filled[index] = self.block_size;
        &mut self.blocks[index]
    }

    /// Append samples to the active block
    ///
    /// Input beyond the remaining capacity is truncated. Returns the number of
    /// samples accepted.
    pub fn fill_active(&mut self, samples: &[i16]) -> usize {
        let index = self.active.index();
        let start = self.filled[index];
        let accepted = samples.len().min(self.block_size - start);

        self.blocks[index][start..start + accepted].copy_from_slice(&samples[..accepted]);
        self.filled[index] = start + accepted;
        accepted
    }

    /// Append little-endian PCM bytes to the active block
    ///
    /// A trailing odd byte is ignored. Returns the number of samples accepted.
    pub fn fill_active_bytes(&mut self, bytes: &[u8]) -> usize {
        let index = self.active.index();
        let start = self.filled[index];
        let room = self.block_size - start;

        let mut accepted = 0;
        for (slot, pair) in self.blocks[index][start..]
            .iter_mut()
            .zip(bytes.chunks_exact(2))
            .take(room)
        {
            *slot = i16::from_le_bytes([pair[0], pair[1]]);
            accepted += 1;
        }

        self.filled[index] = start + accepted;
        accepted
    }

    /// Producer callback: `filled` has finished filling
    ///
    /// Flips the active block and returns the block to analyse, which is
    /// never the newly active one. A report for a block that is not the
    /// active one (a stale or repeated release) is ignored and returns `None`,
    /// so no block is ever analysed twice.
    ///
    /// O(1), never blocks.
    pub fn on_block_filled(&mut self, filled: BlockId) -> Option<BlockId> {
        if filled != self.active {
            trace!(?filled, active = ?self.active, "Ignoring release of inactive block");
            return None;
        }

        self.active = filled.other();
        self.filled[self.active.index()] = 0;
        Some(filled)
    }

    /// Read a block handed out by [`SampleRing::on_block_filled`]
    ///
    /// Only the samples written during its last fill are returned.
    pub fn block(&self, id: BlockId) -> &[i16] {
        debug_assert_ne!(id, self.active, "the active block belongs to the producer");
        let index = id.index();
        &self.blocks[index][..self.filled[index]]
    }

    /// Zero both blocks and make A active again
    pub fn reset(&mut self) {
        for block in &mut self.blocks {
            block.fill(0);
        }
        self.filled = [0; 2];
        self.active = BlockId::A;
    }
}
