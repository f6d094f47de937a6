use crossbeam_channel::Receiver;
use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};
use tracing::{debug, trace};

use super::{BufferTable, RefillThreshold};
use crate::error::{FillError, Result};

/// Direction the threshold moved on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Raised,
    Lowered,
    Unchanged,
}

/// Background consumer of refill requests.
///
/// Every dequeued request is one tick. The controller counts ticks and, once
/// more than `table.len()` of them have passed, nudges the threshold by one:
/// up when the backlog is above half the queue capacity (fewer requests get
/// generated, so it can catch up), down otherwise (buffers are refreshed more
/// often again).
pub struct RefillController {
    table: Arc<BufferTable>,
    threshold: Arc<RefillThreshold>,
    requests: Receiver<usize>,
    state_count: usize,
}

impl RefillController {
    pub fn new(
        table: Arc<BufferTable>,
        threshold: Arc<RefillThreshold>,
        requests: Receiver<usize>,
    ) -> Self {
        RefillController {
            table,
            threshold,
            requests,
            state_count: 0,
        }
    }

    pub fn spawn(self) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("refill".to_string())
            .spawn(move || self.run())
            .map_err(FillError::Spawn)
    }

    /// Services requests until every sender is gone and the queue is drained.
    pub fn run(mut self) {
        let mut refilled = 0u64;
        while let Ok(index) = self.requests.recv() {
            if self.service(index) {
                refilled += 1;
            }
        }
        debug!(
            "refill queue closed after {} refills, threshold={}",
            refilled,
            self.threshold.get()
        );
    }

    /// Handles one request, returning whether the buffer was regenerated.
    pub(crate) fn service(&mut self, index: usize) -> bool {
        let backlog = self.requests.len();
        self.tick(backlog);
        if self.threshold.exceeded_by(self.table.usage(index)) {
            self.table.fill(index);
            true
        } else {
            false
        }
    }

    pub(crate) fn tick(&mut self, backlog: usize) -> Adjustment {
        let capacity = self.table.len();
        self.state_count += 1;
        if self.state_count <= capacity {
            return Adjustment::Unchanged;
        }
        self.state_count = 0;

        if backlog > capacity / 2 {
            self.threshold.raise();
            trace!(backlog, threshold = self.threshold.get(), "refill threshold raised");
            Adjustment::Raised
        } else if self.threshold.get() > 0 {
            self.threshold.lower();
            trace!(backlog, threshold = self.threshold.get(), "refill threshold lowered");
            Adjustment::Lowered
        } else {
            Adjustment::Unchanged
        }
    }
}
