use crate::domain::ports::{DownstreamReply, DownstreamRequest, TransactionChannel};
use crate::error::{DispatchError, Result};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

/// What the channel answers once its reply queue is empty.
#[derive(Debug, Clone)]
enum Fallback {
    Succeed,
    Fail(String),
}

/// An in-process `TransactionChannel` with programmable replies.
///
/// Queued replies are returned in FIFO order; after that every call gets the
/// fallback answer. Transaction ids registered with `reject_transaction`
/// always fail. All calls are recorded. A gated channel holds every call
/// until `open_gate` is called.
pub struct ScriptedChannel {
    replies: Mutex<VecDeque<Result<DownstreamReply>>>,
    rejected: Mutex<HashSet<String>>,
    calls: Mutex<Vec<DownstreamRequest>>,
    fallback: Fallback,
    latency: Option<Duration>,
    gate: watch::Sender<bool>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedChannel {
    /// A channel that accepts every transaction.
    pub fn new() -> Self {
        Self::with_fallback(Fallback::Succeed)
    }

    /// A channel that rejects every transaction with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_fallback(Fallback::Fail(message.into()))
    }

    fn with_fallback(fallback: Fallback) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            replies: Mutex::new(VecDeque::new()),
            rejected: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            fallback,
            latency: None,
            gate,
        }
    }

    /// Delays every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Holds every call until `open_gate` is called.
    pub fn gated(self) -> Self {
        self.gate.send_replace(false);
        self
    }

    pub fn open_gate(&self) {
        self.gate.send_replace(true);
    }

    pub fn push_reply(&self, reply: Result<DownstreamReply>) {
        locked(&self.replies).push_back(reply);
    }

    pub fn reject_transaction(&self, transaction_id: impl Into<String>) {
        locked(&self.rejected).insert(transaction_id.into());
    }

    pub fn calls(&self) -> Vec<DownstreamRequest> {
        locked(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        locked(&self.calls).len()
    }

    pub fn calls_for(&self, transaction_id: &str) -> usize {
        locked(&self.calls)
            .iter()
            .filter(|c| c.transaction_id == transaction_id)
            .count()
    }
}

impl Default for ScriptedChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionChannel for ScriptedChannel {
    async fn execute(&self, request: &DownstreamRequest) -> Result<DownstreamReply> {
        locked(&self.calls).push(request.clone());

        let mut gate = self.gate.subscribe();
        let opened = gate.wait_for(|open| *open).await.is_ok();
        if !opened {
            return Err(DispatchError::ChannelError("channel closed".to_string()));
        }

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if locked(&self.rejected).contains(&request.transaction_id) {
            return Err(DispatchError::DownstreamRejected {
                status: 422,
                body: format!("transaction {} rejected", request.transaction_id),
            });
        }

        let queued = locked(&self.replies).pop_front();
        match queued {
            Some(reply) => reply,
            None => match &self.fallback {
                Fallback::Succeed => Ok(DownstreamReply {
                    transaction_id: Some(request.transaction_id.clone()),
                    status: Some("SUCCESS".to_string()),
                    message: None,
                }),
                Fallback::Fail(message) => Err(DispatchError::ChannelError(message.clone())),
            },
        }
    }
}
