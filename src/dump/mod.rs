//! Per-run dump handling: text parsing and covered / not-covered classification.

pub mod classifier;
pub mod parser;
