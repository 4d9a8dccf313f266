//! Adapters for the domain ports.

pub mod http_channel;
pub mod in_memory;
pub mod metrics;
pub mod scripted_channel;
