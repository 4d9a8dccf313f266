//! Application layer containing the batch dispatch orchestration.
//!
//! `BatchDispatcher` is the entry point: it claims a batch id, hands each
//! instruction to a `Forwarder` (which applies the `RetryPolicy` against the
//! downstream channel), and stores the assembled result so that repeated
//! submissions of the same batch are answered without re-execution.

pub mod dispatcher;
pub mod forwarder;
pub mod retry;
