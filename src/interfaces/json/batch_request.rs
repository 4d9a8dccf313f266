use crate::domain::instruction::{Amount, Batch, Instruction};
use crate::domain::outcome::{BatchResult, OutcomeStatus};
use crate::error::{DispatchError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Wire form of a batch submission.
///
/// Fields are optional on the wire so that missing values surface as
/// validation errors naming the field rather than as parse failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub batch_id: Option<String>,
    pub transactions: Option<Vec<TransactionRequest>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub transaction_id: Option<String>,
    pub from_account: Option<String>,
    pub to_account: Option<String>,
    #[serde(
        default,
        with = "rust_decimal::serde::arbitrary_precision_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<Decimal>,
}

impl BatchRequest {
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        Ok(serde_json::from_reader(source)?)
    }

    /// Validates the request and converts it into a domain `Batch`.
    pub fn into_batch(self) -> Result<Batch> {
        let batch_id = required(self.batch_id, "batchId")?;
        let transactions = self.transactions.ok_or_else(|| {
            DispatchError::ValidationError("transactions: Transactions list cannot be null".into())
        })?;

        let instructions = transactions
            .into_iter()
            .enumerate()
            .map(|(index, tx)| tx.into_instruction(index))
            .collect::<Result<Vec<_>>>()?;

        Batch::new(batch_id, instructions)
    }
}

impl TransactionRequest {
    fn into_instruction(self, index: usize) -> Result<Instruction> {
        let field = |name: &str| format!("transactions[{index}].{name}");
        let id = required(self.transaction_id, &field("transactionId"))?;
        let from = required(self.from_account, &field("fromAccount"))?;
        let to = required(self.to_account, &field("toAccount"))?;
        let amount = self.amount.ok_or_else(|| {
            DispatchError::ValidationError(format!("{}: Amount is required", field("amount")))
        })?;
        let amount = Amount::new(amount).map_err(|_| {
            DispatchError::ValidationError(format!(
                "{}: Amount must be greater than 0",
                field("amount")
            ))
        })?;
        Ok(Instruction::new(id, from, to, amount))
    }
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(DispatchError::ValidationError(format!(
            "{field}: value is required"
        ))),
    }
}

/// Wire form of a batch result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub batch_id: String,
    pub results: Vec<TransactionResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    pub transaction_id: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&BatchResult> for BatchResponse {
    fn from(result: &BatchResult) -> Self {
        Self {
            batch_id: result.batch_id.clone(),
            results: result
                .outcomes
                .iter()
                .map(|o| TransactionResult {
                    transaction_id: o.instruction_id().to_string(),
                    status: o.status(),
                    reason: o.reason().map(str::to_string),
                })
                .collect(),
        }
    }
}
