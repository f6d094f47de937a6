use std::collections::VecDeque;
use std::time::Instant;

/// One throughput sample: when it was taken and how much had been written.
#[derive(Debug, Clone, Copy)]
pub struct StatRecord {
    pub at: Instant,
    pub written: u64,
}

/// The most recent throughput samples of a fill step.
#[derive(Debug)]
pub struct ThroughputWindow {
    records: VecDeque<StatRecord>,
    capacity: usize,
}

impl ThroughputWindow {
    /// Starts a window with the sample taken when the step began.
    pub fn new(capacity: usize, start: StatRecord) -> Self {
        let mut records = VecDeque::with_capacity(capacity + 1);
        records.push_back(start);
        ThroughputWindow { records, capacity }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub fn last(&self) -> Option<&StatRecord> {
        self.records.back()
    }

    /// Appends `record` and returns the speed (bytes/s) since the previous sample.
    pub fn push(&mut self, record: StatRecord) -> f64 {
        let speed = self
            .last()
            .map(|prev| speed_between(prev, &record))
            .unwrap_or(0.0);
        self.records.push_back(record);
        speed
    }

    /// Speed over the whole window, from its oldest to its newest sample.
    pub fn average_speed(&self) -> f64 {
        match (self.records.front(), self.records.back()) {
            (Some(first), Some(last)) => speed_between(first, last),
            _ => 0.0,
        }
    }

    pub fn evict_oldest(&mut self) -> Option<StatRecord> {
        self.records.pop_front()
    }
}

fn speed_between(from: &StatRecord, to: &StatRecord) -> f64 {
    let elapsed = to.at.saturating_duration_since(from.at).as_secs_f64();
    if elapsed <= 0.0 {
        return 0.0;
    }
    to.written.saturating_sub(from.written) as f64 / elapsed
}
