use super::instruction::{Amount, Instruction};
use super::outcome::{BatchResult, BatchState, Outcome};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const SUCCESS_COUNTER: &str = "transactions.success";
pub const FAILURE_COUNTER: &str = "transactions.failure";

/// Request sent to the downstream transaction processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownstreamRequest {
    pub transaction_id: String,
    pub from_account: String,
    pub to_account: String,
    pub amount: Amount,
}

impl From<&Instruction> for DownstreamRequest {
    fn from(instruction: &Instruction) -> Self {
        Self {
            transaction_id: instruction.id.clone(),
            from_account: instruction.source_account.clone(),
            to_account: instruction.destination_account.clone(),
            amount: instruction.amount,
        }
    }
}

/// A successful downstream reply. Its fields are informational only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DownstreamReply {
    pub transaction_id: Option<String>,
    pub status: Option<String>,
    pub message: Option<String>,
}

/// Request/response channel to the downstream transaction processor.
///
/// An `Err` covers both transport failures and declared error responses.
#[async_trait]
pub trait TransactionChannel: Send + Sync {
    async fn execute(&self, request: &DownstreamRequest) -> Result<DownstreamReply>;
}

/// Turns one instruction into an outcome.
///
/// An `Err` here is a defect in the call path, not a downstream failure.
#[async_trait]
pub trait InstructionProcessor: Send + Sync {
    async fn process(&self, instruction: &Instruction) -> Result<Outcome>;
}

/// Claim registry plus result store, keyed by batch id.
#[async_trait]
pub trait BatchStore: Send + Sync {
    /// Atomically marks `batch_id` as claimed. Returns `true` only for the
    /// call that performed the insertion.
    async fn claim(&self, batch_id: &str) -> Result<bool>;
    async fn get(&self, batch_id: &str) -> Result<Option<BatchResult>>;
    /// Stores the final result. Fails if the id was never claimed or
    /// already has a result.
    async fn save(&self, batch_id: &str, result: BatchResult) -> Result<()>;
    async fn state(&self, batch_id: &str) -> Result<BatchState>;
    /// Waits up to `timeout` for a claimed batch to be saved. Returns `None`
    /// if it is still in flight when the timeout elapses.
    async fn wait_for(&self, batch_id: &str, timeout: Duration) -> Result<Option<BatchResult>>;
}

/// Fire-and-forget counter sink. Must never block or fail.
pub trait MetricsSink: Send + Sync {
    fn increment(&self, counter: &'static str);
}

pub type BatchStoreRef = Arc<dyn BatchStore>;
pub type ChannelRef = Arc<dyn TransactionChannel>;
pub type ProcessorRef = Arc<dyn InstructionProcessor>;
pub type MetricsRef = Arc<dyn MetricsSink>;
