//! Environment traits and implementations
//!
//! This module defines the core environment interface used by the trainer
//! and provides the built-in position game.

use anyhow::{Result, bail};

use crate::spaces::Space;

pub mod position_game;

pub use position_game::{PositionGame, PositionGameConfig};

/// Core trait for RL environments
///
/// Observations are flat row-major vectors whose length equals the element
/// count of [`Environment::observation_space`].
pub trait Environment {
    /// Space the observations live in
    type ObservationSpace: Space<Value = Vec<f32>>;

    /// Space the actions live in
    type ActionSpace: Space<Value = Self::Action>;

    /// Action type
    type Action: EnvAction;

    /// Reset the environment and return initial observation
    fn reset(&mut self) -> Result<Vec<f32>>;

    /// Step the environment with an action
    fn step(&mut self, action: Self::Action) -> Result<StepResult>;

    /// Observation space
    fn observation_space(&self) -> &Self::ObservationSpace;

    /// Action space
    fn action_space(&self) -> &Self::ActionSpace;

    /// Render the current state
    ///
    /// Environments only support the modes they implement; everything else
    /// is an error.
    fn render(&self, mode: RenderMode) -> Result<String> {
        bail!("render mode {mode:?} is not supported by this environment")
    }

    /// Reseed the environment and its spaces
    fn seed(&mut self, _seed: u64) {}
}

/// Result of an environment step
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Next observation
    pub observation: Vec<f32>,

    /// Reward received
    pub reward: f32,

    /// Whether the episode ended
    pub done: bool,
}

/// Rendering modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Human-readable text
    Text,

    /// RGB pixel array
    RgbArray,
}

/// Conversion from the flat action values a model emits
pub trait EnvAction: Sized {
    /// Build an action from a flat `f32` row
    fn from_values(values: &[f32]) -> Result<Self>;
}

impl EnvAction for i64 {
    fn from_values(values: &[f32]) -> Result<Self> {
        match values {
            [value] if value.is_finite() => Ok(value.round() as i64),
            [value] => bail!("discrete action is not finite: {value}"),
            _ => bail!("discrete action needs exactly one value, got {}", values.len()),
        }
    }
}

impl EnvAction for Vec<f32> {
    fn from_values(values: &[f32]) -> Result<Self> {
        Ok(values.to_vec())
    }
}
