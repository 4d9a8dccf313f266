//! Domain types and the ports the dispatch core talks through.

pub mod instruction;
pub mod outcome;
pub mod ports;
