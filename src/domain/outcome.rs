use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Success => f.write_str("SUCCESS"),
            OutcomeStatus::Failed => f.write_str("FAILED"),
        }
    }
}

/// The result of forwarding one instruction.
///
/// `reason` is present if and only if the status is `Failed`; the
/// constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    instruction_id: String,
    status: OutcomeStatus,
    reason: Option<String>,
}

impl Outcome {
    pub fn success(instruction_id: impl Into<String>) -> Self {
        Self {
            instruction_id: instruction_id.into(),
            status: OutcomeStatus::Success,
            reason: None,
        }
    }

    pub fn failed(instruction_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            instruction_id: instruction_id.into(),
            status: OutcomeStatus::Failed,
            reason: Some(reason.into()),
        }
    }

    pub fn instruction_id(&self) -> &str {
        &self.instruction_id
    }

    pub fn status(&self) -> OutcomeStatus {
        self.status
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// The finalized response for a batch: one outcome per instruction, in
/// submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_id: String,
    pub outcomes: Vec<Outcome>,
}

impl BatchResult {
    pub fn new(batch_id: impl Into<String>, outcomes: Vec<Outcome>) -> Self {
        Self {
            batch_id: batch_id.into(),
            outcomes,
        }
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }
}

/// Lifecycle of a batch id inside the store. No transition leaves `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Unclaimed,
    InFlight,
    Complete,
}
