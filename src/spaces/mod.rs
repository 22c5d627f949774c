//! Observation and action spaces
//!
//! A space describes the shape (and optionally the bounds) of the values an
//! environment produces or accepts. Spaces own a seedable random generator so
//! that `sample()` is reproducible across restarts.

use thiserror::Error;

pub mod box_space;
pub mod discrete;

pub use box_space::{Bound, BoundKind, BoxSpace};
pub use discrete::Discrete;

/// Core trait for spaces
pub trait Space {
    /// Type of the values living in this space
    type Value;

    /// Shape of a single value
    fn shape(&self) -> &[usize];

    /// Draw a random value from the space
    fn sample(&mut self) -> Self::Value;

    /// Whether `value` belongs to the space
    fn contains(&self, value: &Self::Value) -> bool;

    /// Reseed the space's generator
    fn seed(&mut self, seed: u64);

    /// Shape and kind, used to size models
    fn descriptor(&self) -> SpaceInfo;
}

/// Space information for observations and actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceInfo {
    /// Shape of the space
    pub shape: Vec<usize>,

    /// Kind of values
    pub kind: SpaceKind,
}

impl SpaceInfo {
    /// Number of scalar elements in one value
    pub fn numel(&self) -> usize {
        numel(&self.shape)
    }

    /// Width of the flat action/observation vector the models exchange
    ///
    /// Discrete values travel as a single index.
    pub fn flat_dim(&self) -> usize {
        match self.kind {
            SpaceKind::Discrete(_) => 1,
            SpaceKind::Continuous => self.numel(),
        }
    }
}

/// Space value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceKind {
    /// Discrete space with n options
    Discrete(usize),

    /// Continuous space (Box)
    Continuous,
}

/// Errors raised while building a space
#[derive(Debug, Error, PartialEq)]
pub enum SpaceError {
    /// A per-element bound does not have the declared shape
    #[error("{which} bound has {got} elements but shape {shape:?} needs {expected}")]
    BoundShapeMismatch {
        /// "low" or "high"
        which: &'static str,
        /// Declared shape
        shape: Vec<usize>,
        /// Elements required by the shape
        expected: usize,
        /// Elements provided
        got: usize,
    },

    /// `low[i] > high[i]`
    #[error("low bound {low} exceeds high bound {high} at element {index}")]
    InvertedBounds {
        /// Flat element index
        index: usize,
        /// Lower bound
        low: f32,
        /// Upper bound
        high: f32,
    },

    /// A discrete space needs at least one option
    #[error("discrete space needs at least one option")]
    EmptyDiscrete,
}

/// Product of the dimensions; `1` for a scalar shape
pub fn numel(shape: &[usize]) -> usize {
    shape.iter().product()
}
