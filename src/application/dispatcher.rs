use super::retry::millis;
use crate::domain::instruction::{Batch, Instruction};
use crate::domain::outcome::{BatchResult, BatchState, Outcome};
use crate::domain::ports::{
    BatchStoreRef, FAILURE_COUNTER, InstructionProcessor, MetricsRef, ProcessorRef,
    SUCCESS_COUNTER,
};
use crate::error::{DispatchError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::Instrument;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// How long a duplicate submission waits for the original to finish
    /// before failing with `BatchInFlight`.
    #[serde(with = "millis")]
    pub duplicate_wait: Duration,
    /// Instructions forwarded at the same time within one batch. `1` keeps
    /// forwarding strictly sequential.
    pub instruction_concurrency: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            duplicate_wait: Duration::from_secs(30),
            instruction_concurrency: 1,
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.instruction_concurrency == 0 {
            return Err(DispatchError::ConfigError(
                "instruction_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Orchestrates batches: idempotent admission, per-instruction forwarding
/// with failure isolation, and storage of the final result.
pub struct BatchDispatcher {
    store: BatchStoreRef,
    processor: ProcessorRef,
    metrics: MetricsRef,
    config: DispatcherConfig,
}

impl BatchDispatcher {
    pub fn new(
        store: BatchStoreRef,
        processor: ProcessorRef,
        metrics: MetricsRef,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            store,
            processor,
            metrics,
            config,
        }
    }

    /// Submits a batch.
    ///
    /// The first submission of a batch id forwards every instruction and
    /// returns one outcome per instruction in submission order. Later
    /// submissions of the same id never reach the processor: they return the
    /// stored result, waiting up to `duplicate_wait` if the first submission
    /// is still running.
    ///
    /// Once claimed, a batch runs to completion on its own task even if the
    /// caller stops waiting.
    #[tracing::instrument(skip(self, batch), fields(batch_id = %batch.batch_id(), instructions = batch.len()))]
    pub async fn submit(&self, batch: Batch) -> Result<BatchResult> {
        let batch_id = batch.batch_id().to_string();

        if !self.store.claim(&batch_id).await? {
            tracing::warn!("Batch already submitted, returning previous results");
            return self.stored_result(&batch_id).await;
        }

        tracing::info!("Starting batch processing");
        let run = BatchRun {
            store: self.store.clone(),
            processor: self.processor.clone(),
            metrics: self.metrics.clone(),
            concurrency: self.config.instruction_concurrency.max(1),
        };
        let handle = tokio::spawn(run.supervise(batch).in_current_span());

        match handle.await {
            Ok(result) => result,
            Err(e) => Err(DispatchError::BatchAborted(batch_id, describe_join_error(e))),
        }
    }

    /// Returns the stored result for a completed batch.
    ///
    /// Never blocks: ids that were never submitted or are still in flight
    /// are reported as `BatchNotFound`.
    pub async fn get_batch_results(&self, batch_id: &str) -> Result<BatchResult> {
        tracing::info!(batch_id, "Retrieving batch results");
        self.store
            .get(batch_id)
            .await?
            .ok_or_else(|| DispatchError::BatchNotFound(batch_id.to_string()))
    }

    pub async fn batch_state(&self, batch_id: &str) -> Result<BatchState> {
        self.store.state(batch_id).await
    }

    async fn stored_result(&self, batch_id: &str) -> Result<BatchResult> {
        match self
            .store
            .wait_for(batch_id, self.config.duplicate_wait)
            .await?
        {
            Some(result) => Ok(result),
            None => {
                tracing::warn!(
                    wait_ms = self.config.duplicate_wait.as_millis() as u64,
                    "Original submission still in flight"
                );
                Err(DispatchError::BatchInFlight(batch_id.to_string()))
            }
        }
    }
}

/// Everything a claimed batch needs to run detached from its caller.
struct BatchRun {
    store: BatchStoreRef,
    processor: ProcessorRef,
    metrics: MetricsRef,
    concurrency: usize,
}

impl BatchRun {
    /// Runs the batch on its own task. If that task dies before saving, every
    /// instruction is stored as an unexpected failure so the claim still
    /// reaches `Complete`.
    async fn supervise(self, batch: Batch) -> Result<BatchResult> {
        let batch_id = batch.batch_id().to_string();
        let instruction_ids: Vec<String> =
            batch.instructions().iter().map(|i| i.id.clone()).collect();
        let store = self.store.clone();

        let description = match tokio::spawn(self.execute(batch).in_current_span()).await {
            Ok(result) => return result,
            Err(e) => describe_join_error(e),
        };
        tracing::error!(error = %description, "Batch run aborted, storing failed outcomes");

        let outcomes = instruction_ids
            .iter()
            .map(|id| Outcome::failed(id, format!("Unexpected error: {description}")))
            .collect();
        let result = BatchResult::new(&batch_id, outcomes);
        match store.save(&batch_id, result.clone()).await {
            Ok(()) => Ok(result),
            Err(DispatchError::AlreadySaved(_)) => store
                .get(&batch_id)
                .await?
                .ok_or(DispatchError::BatchAborted(batch_id, description)),
            Err(e) => Err(e),
        }
    }

    async fn execute(self, batch: Batch) -> Result<BatchResult> {
        let outcomes = self.forward_all(&batch).await;
        let result = BatchResult::new(batch.batch_id(), outcomes);

        self.store.save(batch.batch_id(), result.clone()).await?;
        tracing::info!(
            successes = result.success_count(),
            failures = result.failure_count(),
            "Completed batch processing"
        );
        Ok(result)
    }

    /// Forwards every instruction, at most `concurrency` at a time, and
    /// collects outcomes in submission order regardless of completion order.
    async fn forward_all(&self, batch: &Batch) -> Vec<Outcome> {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut pending = Vec::with_capacity(batch.len());

        for instruction in batch.instructions() {
            // Acquired before spawning so that tasks start in submission order.
            let permit = permits.clone().acquire_owned().await.ok();
            let processor = self.processor.clone();
            let task_instruction = instruction.clone();
            let handle = tokio::spawn(
                async move {
                    let _permit = permit;
                    tracing::info!("Processing transaction");
                    processor.process(&task_instruction).await
                }
                .instrument(tracing::info_span!("instruction", instruction_id = %instruction.id)),
            );
            pending.push((instruction, handle));
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        for (instruction, handle) in pending {
            let outcome = match handle.await {
                Ok(Ok(outcome)) if outcome.instruction_id() == instruction.id => outcome,
                Ok(Ok(outcome)) => unexpected(
                    instruction,
                    format!(
                        "processor returned an outcome for {}",
                        outcome.instruction_id()
                    ),
                ),
                Ok(Err(e)) => unexpected(instruction, e.to_string()),
                Err(e) => unexpected(instruction, describe_join_error(e)),
            };
            self.record(&outcome);
            outcomes.push(outcome);
        }
        outcomes
    }

    fn record(&self, outcome: &Outcome) {
        if outcome.is_success() {
            self.metrics.increment(SUCCESS_COUNTER);
            tracing::info!(instruction_id = outcome.instruction_id(), "Transaction succeeded");
        } else {
            self.metrics.increment(FAILURE_COUNTER);
            tracing::info!(
                instruction_id = outcome.instruction_id(),
                reason = outcome.reason().unwrap_or_default(),
                "Transaction failed"
            );
        }
    }
}

fn unexpected(instruction: &Instruction, description: String) -> Outcome {
    tracing::error!(
        instruction_id = %instruction.id,
        error = %description,
        "Unexpected error processing transaction"
    );
    Outcome::failed(&instruction.id, format!("Unexpected error: {description}"))
}

fn describe_join_error(error: JoinError) -> String {
    if error.is_cancelled() {
        return "task was cancelled".to_string();
    }
    let payload = error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}
