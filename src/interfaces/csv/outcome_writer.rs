use crate::domain::outcome::BatchResult;
use crate::error::Result;
use std::io::Write;

/// Writes batch outcomes as CSV with the header
/// `batch_id,instruction_id,status,reason`.
pub struct OutcomeWriter<W: Write> {
    writer: csv::Writer<W>,
    header_written: bool,
}

impl<W: Write> OutcomeWriter<W> {
    pub fn new(destination: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(destination),
            header_written: false,
        }
    }

    pub fn write_result(&mut self, result: &BatchResult) -> Result<()> {
        if !self.header_written {
            self.writer
                .write_record(["batch_id", "instruction_id", "status", "reason"])?;
            self.header_written = true;
        }
        for outcome in &result.outcomes {
            self.writer.write_record([
                result.batch_id.as_str(),
                outcome.instruction_id(),
                &outcome.status().to_string(),
                outcome.reason().unwrap_or_default(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
