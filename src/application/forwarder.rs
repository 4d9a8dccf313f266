use super::retry::RetryPolicy;
use crate::domain::instruction::Instruction;
use crate::domain::outcome::Outcome;
use crate::domain::ports::{ChannelRef, DownstreamRequest, InstructionProcessor};
use crate::error::Result;
use async_trait::async_trait;

/// Forwards one instruction to the downstream channel under a retry policy.
///
/// `process` is total: downstream failures come back as a `Failed` outcome
/// once the policy is exhausted, never as an error.
#[derive(Clone)]
pub struct Forwarder {
    channel: ChannelRef,
    policy: RetryPolicy,
}

impl Forwarder {
    pub fn new(channel: ChannelRef, policy: RetryPolicy) -> Self {
        Self { channel, policy }
    }

    #[tracing::instrument(skip(self, instruction), fields(instruction_id = %instruction.id))]
    pub async fn process(&self, instruction: &Instruction) -> Outcome {
        let request = DownstreamRequest::from(instruction);

        let attempt = self
            .policy
            .run(|attempt| {
                let request = &request;
                async move {
                    tracing::info!(attempt, "Forwarding transaction downstream");
                    self.channel.execute(request).await.inspect_err(|e| {
                        tracing::info!(attempt, error = %e, "Downstream attempt failed");
                    })
                }
            })
            .await;

        match attempt {
            Ok(_) => {
                tracing::info!("Downstream accepted transaction");
                Outcome::success(&instruction.id)
            }
            Err(exhausted) => {
                tracing::warn!(
                    attempts = exhausted.attempts,
                    error = %exhausted.last_error,
                    "All retry attempts failed, falling back"
                );
                Outcome::failed(
                    &instruction.id,
                    format!("All retry attempts failed: {}", exhausted.last_error),
                )
            }
        }
    }
}

#[async_trait]
impl InstructionProcessor for Forwarder {
    async fn process(&self, instruction: &Instruction) -> Result<Outcome> {
        Ok(Forwarder::process(self, instruction).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instruction::Amount;
    use crate::domain::outcome::OutcomeStatus;
    use crate::domain::ports::DownstreamReply;
    use crate::error::DispatchError;
    use crate::infrastructure::scripted_channel::ScriptedChannel;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::time::Duration;

    fn instruction() -> Instruction {
        Instruction::new("TXN-001", "123456", "654321", Amount::new(dec!(1000.00)).unwrap())
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            backoff_factor: 1,
            max_backoff: Duration::from_millis(1),
            attempt_timeout: Duration::from_millis(500),
        }
    }

    #[tokio::test]
    async fn test_successful_call_returns_success() {
        let channel = Arc::new(ScriptedChannel::new());
        channel.push_reply(Ok(DownstreamReply {
            transaction_id: Some("TXN-001".to_string()),
            status: Some("SUCCESS".to_string()),
            message: Some("Processed successfully".to_string()),
        }));
        let forwarder = Forwarder::new(channel.clone(), policy(3));

        let outcome = forwarder.process(&instruction()).await;

        assert_eq!(outcome.instruction_id(), "TXN-001");
        assert_eq!(outcome.status(), OutcomeStatus::Success);
        assert!(outcome.reason().is_none());
        assert_eq!(channel.call_count(), 1);
        assert_eq!(channel.calls()[0].from_account, "123456");
        assert_eq!(channel.calls()[0].amount.value(), dec!(1000.00));
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let channel = Arc::new(ScriptedChannel::new());
        channel.push_reply(Err(DispatchError::ChannelError("Connection refused".into())));
        channel.push_reply(Err(DispatchError::ChannelError("Connection refused".into())));
        channel.push_reply(Ok(DownstreamReply::default()));
        let forwarder = Forwarder::new(channel.clone(), policy(3));

        let outcome = forwarder.process(&instruction()).await;

        assert!(outcome.is_success());
        assert_eq!(channel.call_count(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_yields_fallback_outcome() {
        let channel = Arc::new(ScriptedChannel::failing("Connection refused"));
        let forwarder = Forwarder::new(channel.clone(), policy(3));

        let outcome = forwarder.process(&instruction()).await;

        assert_eq!(outcome.status(), OutcomeStatus::Failed);
        assert_eq!(
            outcome.reason(),
            Some("All retry attempts failed: Channel error: Connection refused")
        );
        assert_eq!(channel.call_count(), 3);
    }

    #[tokio::test]
    async fn test_success_ignores_reply_content() {
        let channel = Arc::new(ScriptedChannel::new());
        channel.push_reply(Ok(DownstreamReply {
            status: Some("WHATEVER".to_string()),
            ..Default::default()
        }));
        let forwarder = Forwarder::new(channel, policy(1));

        assert!(forwarder.process(&instruction()).await.is_success());
    }

    #[tokio::test]
    async fn test_slow_downstream_counts_as_failed_attempt() {
        let channel = Arc::new(ScriptedChannel::new().with_latency(Duration::from_millis(200)));
        let forwarder = Forwarder::new(
            channel.clone(),
            RetryPolicy {
                attempt_timeout: Duration::from_millis(10),
                ..policy(2)
            },
        );

        let outcome = forwarder.process(&instruction()).await;

        assert_eq!(outcome.status(), OutcomeStatus::Failed);
        assert!(outcome.reason().unwrap().contains("timed out"));
        assert_eq!(channel.call_count(), 2);
    }
}
