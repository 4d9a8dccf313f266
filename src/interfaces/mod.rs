//! Boundary adapters: request validation and result rendering.

pub mod csv;
pub mod json;
