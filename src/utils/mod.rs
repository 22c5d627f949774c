//! Utility functions and helpers

pub mod stats;

pub use stats::{EpochStatistics, statistics_scalar};
