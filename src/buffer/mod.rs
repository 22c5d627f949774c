//! Experience buffers
//!
//! On-policy trajectory storage with per-path GAE-λ advantage estimation.

pub mod trajectory;

pub use trajectory::{BufferError, TensorBatch, TrajectoryBatch, TrajectoryBuffer, discount_cumsum};
