use crate::domain::ports::{FAILURE_COUNTER, MetricsSink, SUCCESS_COUNTER};
use dashmap::DashMap;
use std::sync::Arc;

/// Monotonic named counters, safe for concurrent increment.
#[derive(Debug, Default, Clone)]
pub struct CounterMetrics {
    counters: Arc<DashMap<&'static str, u64>>,
}

impl CounterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, counter: &str) -> u64 {
        self.counters.get(counter).map(|v| *v).unwrap_or(0)
    }

    pub fn successes(&self) -> u64 {
        self.get(SUCCESS_COUNTER)
    }

    pub fn failures(&self) -> u64 {
        self.get(FAILURE_COUNTER)
    }
}

impl MetricsSink for CounterMetrics {
    fn increment(&self, counter: &'static str) {
        *self.counters.entry(counter).or_insert(0) += 1;
    }
}
