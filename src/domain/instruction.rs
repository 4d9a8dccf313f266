use crate::error::DispatchError;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A strictly positive monetary amount.
///
/// Wraps `rust_decimal::Decimal` so that a non-positive amount can never reach
/// the dispatch core. On the wire it is an exact JSON number: digits and
/// scale pass through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, DispatchError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(DispatchError::ValidationError(
                "Amount must be greater than 0".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::arbitrary_precision::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = rust_decimal::serde::arbitrary_precision::deserialize(deserializer)?;
        Amount::new(value).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A single money-movement instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub id: String,
    pub source_account: String,
    pub destination_account: String,
    pub amount: Amount,
}

impl Instruction {
    pub fn new(
        id: impl Into<String>,
        source_account: impl Into<String>,
        destination_account: impl Into<String>,
        amount: Amount,
    ) -> Self {
        Self {
            id: id.into(),
            source_account: source_account.into(),
            destination_account: destination_account.into(),
            amount,
        }
    }
}

/// A named, ordered group of instructions.
///
/// `batch_id` is the idempotency key: submitting the same id twice never
/// re-executes the instructions.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    batch_id: String,
    instructions: Vec<Instruction>,
}

impl Batch {
    pub fn new(
        batch_id: impl Into<String>,
        instructions: Vec<Instruction>,
    ) -> Result<Self, DispatchError> {
        let batch_id = batch_id.into();
        if batch_id.trim().is_empty() {
            return Err(DispatchError::ValidationError(
                "Batch ID is required".to_string(),
            ));
        }
        if instructions.is_empty() {
            return Err(DispatchError::ValidationError(
                "At least one transaction is required".to_string(),
            ));
        }
        if let Some(position) = instructions.iter().position(|i| i.id.trim().is_empty()) {
            return Err(DispatchError::ValidationError(format!(
                "Transaction ID is required (entry {})",
                position + 1
            )));
        }
        Ok(Self {
            batch_id,
            instructions,
        })
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
