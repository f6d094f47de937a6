use crossbeam_channel::{Sender, TrySendError};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::{sync::Arc, thread::JoinHandle};
use tracing::{debug, error, trace};

use super::{BufferTable, PooledBuffer, RefillController, RefillThreshold};
use crate::config::PoolConfig;
use crate::error::Result;
use crate::seed::SeedSource;

/// Hands out random buffers to the writer and reports their usage to the
/// refill controller.
pub struct DataProvider {
    table: Arc<BufferTable>,
    threshold: Arc<RefillThreshold>,
    index_rng: StdRng,
    requests: Option<Sender<usize>>,
    worker: Option<JoinHandle<()>>,
    acquired: u64,
}

impl DataProvider {
    /// Builds the table, starts the refill worker and wires both to a new
    /// provider.
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use diskfill::config::PoolConfig;
    /// # use diskfill::pool::DataProvider;
    /// # use diskfill::seed::OsSeedSource;
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = PoolConfig { table_size: 16, buffer_len: 64 };
    /// let mut provider = DataProvider::spawn(&config, Arc::new(OsSeedSource))?;
    /// assert_eq!(provider.acquire().len(), 64);
    /// provider.close();
    /// # Ok(())
    /// # }
    /// ```
    pub fn spawn(config: &PoolConfig, seeds: Arc<dyn SeedSource>) -> Result<Self> {
        let index_seed = seeds.next_seed();
        let table = Arc::new(BufferTable::new(
            config.table_size,
            config.buffer_len,
            seeds,
        )?);
        let threshold = Arc::new(RefillThreshold::new());
        let (tx, rx) = crossbeam_channel::bounded(table.len());

        let worker =
            RefillController::new(Arc::clone(&table), Arc::clone(&threshold), rx).spawn()?;

        let mut provider = DataProvider::new(table, threshold, tx, index_seed);
        provider.worker = Some(worker);
        Ok(provider)
    }

    /// A provider over an existing table and request queue, without a worker.
    pub fn new(
        table: Arc<BufferTable>,
        threshold: Arc<RefillThreshold>,
        requests: Sender<usize>,
        index_seed: u64,
    ) -> Self {
        DataProvider {
            table,
            threshold,
            index_rng: StdRng::seed_from_u64(index_seed),
            requests: Some(requests),
            worker: None,
            acquired: 0,
        }
    }

    /// Picks a buffer uniformly at random and returns a read view of it.
    ///
    /// The bytes may be regenerated once the view is released, so they must be
    /// consumed before the next call.
    pub fn acquire(&mut self) -> PooledBuffer<'_> {
        let index = self.index_rng.random_range(0..self.table.len());
        let count = self.table.bump_usage(index);
        self.acquired += 1;

        if self.threshold.exceeded_by(count) {
            if let Some(tx) = &self.requests {
                match tx.try_send(index) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        trace!(index, "refill queue full, request dropped")
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        error!(index, "refill queue disconnected")
                    }
                }
            }
        }
        self.table.read(index)
    }

    /// Number of `acquire()` calls served so far.
    pub fn acquired(&self) -> u64 {
        self.acquired
    }

    pub fn buffer_len(&self) -> usize {
        self.table.buffer_len()
    }

    /// Closes the refill queue and waits for the worker to drain it.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("refill worker panicked");
            } else {
                debug!("refill worker stopped after {} acquires", self.acquired);
            }
        }
    }
}

impl Drop for DataProvider {
    fn drop(&mut self) {
        self.shutdown();
    }
}
