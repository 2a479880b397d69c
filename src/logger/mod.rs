//! Append-only JSONL activity logging for batch runs.

pub mod jsonl;
