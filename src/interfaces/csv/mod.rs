pub mod instruction_reader;
pub mod outcome_writer;
