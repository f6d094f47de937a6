//! Pool of pre-generated random buffers.
//!
//! The writer pulls buffers through [`DataProvider`] without paying for a
//! random generator on every write. Each buffer carries a usage counter; once a
//! buffer has been served more often than the shared [`RefillThreshold`], its
//! index is queued for the background [`RefillController`], which regenerates
//! the contents and adapts the threshold to how far behind it is.

use parking_lot::{RwLock, RwLockReadGuard};
use rand::{RngCore, SeedableRng, rngs::StdRng};
use rayon::prelude::*;
use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};
use tracing::debug;

use crate::error::{FillError, Result};
use crate::seed::SeedSource;

mod provider;
mod refill;

pub use provider::DataProvider;
pub use refill::RefillController;

/// Read view of one buffer, valid until the next `acquire()`.
pub type PooledBuffer<'a> = RwLockReadGuard<'a, Vec<u8>>;

pub struct BufferTable {
    slots: Box<[RwLock<Vec<u8>>]>,
    usage: Box<[AtomicU32]>,
    buffer_len: usize,
    seeds: Arc<dyn SeedSource>,
}

impl BufferTable {
    /// Allocates `table_size` buffers of `buffer_len` bytes and fills every one
    /// of them before returning.
    pub fn new(table_size: usize, buffer_len: usize, seeds: Arc<dyn SeedSource>) -> Result<Self> {
        if table_size == 0 {
            return Err(FillError::InvalidConfig("pool.table_size must be > 0"));
        }
        if buffer_len == 0 {
            return Err(FillError::InvalidConfig("pool.buffer_len must be > 0"));
        }

        let table = BufferTable {
            slots: (0..table_size)
                .map(|_| RwLock::new(vec![0u8; buffer_len]))
                .collect(),
            usage: (0..table_size).map(|_| AtomicU32::new(0)).collect(),
            buffer_len,
            seeds,
        };
        (0..table_size).into_par_iter().for_each(|i| table.fill(i));
        debug!(
            "buffer table ready: {} buffers of {} bytes",
            table_size, buffer_len
        );
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    /// Regenerates buffer `index` from a fresh seed and resets its usage counter.
    pub fn fill(&self, index: usize) {
        let mut rng = StdRng::seed_from_u64(self.seeds.next_seed());
        let mut slot = self.slots[index].write();
        rng.fill_bytes(slot.as_mut_slice());
        self.usage[index].store(0, Ordering::Relaxed);
    }

    pub fn usage(&self, index: usize) -> u32 {
        self.usage[index].load(Ordering::Relaxed)
    }

    /// Counts one more use of buffer `index`, returning the new count.
    ///
    /// The count sticks at `u32::MAX`.
    pub fn bump_usage(&self, index: usize) -> u32 {
        let previous = self.usage[index]
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_add(1)))
            .unwrap_or_else(|n| n);
        previous.saturating_add(1)
    }

    pub fn read(&self, index: usize) -> PooledBuffer<'_> {
        self.slots[index].read()
    }
}

/// Usage count a buffer may reach before it is queued for regeneration.
///
/// Only the refill controller moves it, one step at a time, and it never
/// drops below zero.
#[derive(Debug, Default)]
pub struct RefillThreshold(AtomicU32);

impl RefillThreshold {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn exceeded_by(&self, usage: u32) -> bool {
        usage > self.get()
    }

    pub(crate) fn raise(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |t| t.checked_add(1));
    }

    pub(crate) fn lower(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |t| t.checked_sub(1));
    }
}
