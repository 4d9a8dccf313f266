#![allow(dead_code)]

use bulkpay::application::dispatcher::{BatchDispatcher, DispatcherConfig};
use bulkpay::application::forwarder::Forwarder;
use bulkpay::application::retry::RetryPolicy;
use bulkpay::domain::instruction::{Amount, Batch, Instruction};
use bulkpay::infrastructure::in_memory::InMemoryBatchStore;
use bulkpay::infrastructure::metrics::CounterMetrics;
use bulkpay::infrastructure::scripted_channel::ScriptedChannel;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        backoff_factor: 2,
        max_backoff: Duration::from_millis(5),
        attempt_timeout: Duration::from_secs(1),
    }
}

pub fn instruction(id: &str, amount: Decimal) -> Instruction {
    Instruction::new(id, "123456", "654321", Amount::new(amount).unwrap())
}

/// The two-instruction batch used throughout the scenarios.
pub fn batch001() -> Batch {
    Batch::new(
        "BATCH001",
        vec![instruction("TX001", dec!(100.50)), instruction("TX002", dec!(200.00))],
    )
    .unwrap()
}

pub struct Harness {
    pub dispatcher: Arc<BatchDispatcher>,
    pub channel: Arc<ScriptedChannel>,
    pub metrics: CounterMetrics,
}

pub fn harness(channel: ScriptedChannel, max_attempts: u32) -> Harness {
    harness_with(channel, max_attempts, DispatcherConfig::default())
}

pub fn harness_with(
    channel: ScriptedChannel,
    max_attempts: u32,
    config: DispatcherConfig,
) -> Harness {
    let channel = Arc::new(channel);
    let metrics = CounterMetrics::new();
    let dispatcher = BatchDispatcher::new(
        Arc::new(InMemoryBatchStore::new()),
        Arc::new(Forwarder::new(channel.clone(), fast_policy(max_attempts))),
        Arc::new(metrics.clone()),
        config,
    );
    Harness {
        dispatcher: Arc::new(dispatcher),
        channel,
        metrics,
    }
}
