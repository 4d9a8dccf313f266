use crate::domain::instruction::{Amount, Batch, Instruction};
use crate::error::{DispatchError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct InstructionRecord {
    id: String,
    source_account: String,
    destination_account: String,
    #[serde(with = "rust_decimal::serde::str")]
    amount: Decimal,
}

/// Reads instructions from a CSV source with the header
/// `id,source_account,destination_account,amount`.
///
/// Whitespace around fields is trimmed.
pub struct InstructionReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> InstructionReader<R> {
    /// Creates a new `InstructionReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and validates instructions.
    pub fn instructions(self) -> impl Iterator<Item = Result<Instruction>> {
        self.reader
            .into_deserialize::<InstructionRecord>()
            .enumerate()
            .map(|(index, record)| {
                let record = record?;
                let amount = Amount::new(record.amount).map_err(|_| {
                    DispatchError::ValidationError(format!(
                        "row {}: Amount must be greater than 0",
                        index + 1
                    ))
                })?;
                Ok(Instruction::new(
                    record.id,
                    record.source_account,
                    record.destination_account,
                    amount,
                ))
            })
    }

    /// Reads every row into a batch. The first invalid row rejects the whole
    /// batch.
    pub fn read_batch(self, batch_id: impl Into<String>) -> Result<Batch> {
        let instructions = self.instructions().collect::<Result<Vec<_>>>()?;
        Batch::new(batch_id, instructions)
    }
}
