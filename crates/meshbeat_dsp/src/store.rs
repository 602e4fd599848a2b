//! Spectrum Store
//!
//! Single-slot "latest value wins" mailbox between the transform engine and
//! the band aggregator. Publishing overwrites any unconsumed spectrum; there
//! is no queue and no backpressure.
//!
//! # Thread Safety
//!
//! The ready flag and the spectrum slot are guarded by one lock so that a
//! publish can never interleave with a consume on a multi-core host. The
//! lock is held only for a copy of `block_size / 2` values. An atomic mirror
//! of the flag lets pollers check readiness without touching the lock.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::spectrum::Spectrum;

struct Slot {
    spectrum: Spectrum,
    ready: bool,
}

/// Single-slot spectrum mailbox
pub struct SpectrumStore {
    slot: Mutex<Slot>,
    ready_hint: AtomicBool,
}

impl SpectrumStore {
    /// Create an empty store sized for `spectrum_len` bins
    pub fn new(spectrum_len: usize) -> Self {
        Self {
            slot: Mutex::new(Slot {
                spectrum: Spectrum::zeroed(spectrum_len),
                ready: false,
            }),
            ready_hint: AtomicBool::new(false),
        }
    }

    /// Overwrite the stored spectrum and mark it ready
    ///
    /// Always succeeds. An unconsumed previous spectrum is silently dropped.
    pub fn publish(&self, spectrum: &Spectrum) {
        let mut slot = self.slot.lock();
        slot.spectrum.copy_from(spectrum);
        slot.ready = true;
        self.ready_hint.store(true, Ordering::Release);
    }

    /// Claim the stored spectrum if one is ready
    ///
    /// Returns `None` when nothing new was published since the last
    /// successful consume. That is the normal, frequent outcome.
    pub fn try_consume(&self) -> Option<Spectrum> {
        let mut slot = self.slot.lock();
        if !slot.ready {
            return None;
        }
        slot.ready = false;
        self.ready_hint.store(false, Ordering::Release);
        Some(slot.spectrum.clone())
    }

    /// Allocation-free variant of [`SpectrumStore::try_consume`]
    ///
    /// Copies into `target` and returns true when a spectrum was claimed.
    pub fn try_consume_into(&self, target: &mut Spectrum) -> bool {
        if !self.is_ready() {
            return false;
        }

        let mut slot = self.slot.lock();
        if !slot.ready {
            return false;
        }
        slot.ready = false;
        self.ready_hint.store(false, Ordering::Release);
        target.copy_from(&slot.spectrum);
        true
    }

    /// Whether an unconsumed spectrum is waiting
    pub fn is_ready(&self) -> bool {
        self.ready_hint.load(Ordering::Acquire)
    }

    /// Drop any pending spectrum
    pub fn clear(&self) {
        let mut slot = self.slot.lock();
        slot.ready = false;
        slot.spectrum.bins_mut().fill(0);
        self.ready_hint.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for SpectrumStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumStore")
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}
