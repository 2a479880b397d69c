//! Suite-wide coverage: the aggregation fold and the text reports built from it.

pub mod aggregator;
pub mod report;

#[cfg(test)]
mod test_properties;
