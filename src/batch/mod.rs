//! Batch driver: find run archives, stage their dumps, and run the analysis.

pub mod discovery;
pub mod extract;
pub mod pipeline;
