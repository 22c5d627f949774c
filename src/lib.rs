//! # drive-rl
//!
//! On-policy reinforcement learning (PPO) in Rust, over tch.
//!
//! The crate provides observation/action spaces, an environment contract, an
//! MLP actor-critic, a GAE-λ trajectory buffer and a PPO trainer that can be
//! stopped cooperatively from another thread.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use drive_rl::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let env = PositionGame::with_seed(0)?;
//! let mut trainer = PPOTrainer::with_model(env, |env| {
//!     MlpActorCritic::new(
//!         &env.observation_space().descriptor(),
//!         &env.action_space().descriptor(),
//!         MlpConfig::default(),
//!     )
//! })?;
//!
//! let config = TrainConfig::new().epochs(10).steps_per_epoch(500.0);
//! trainer.train(&config, Callbacks::default())?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Observation and action spaces
pub mod spaces;

/// Environment traits and implementations
pub mod env;

/// Actor-critic models
pub mod policy;

/// Experience buffers
pub mod buffer;

/// Training algorithms (PPO)
pub mod train;

/// Utility functions and helpers
pub mod utils;

/// Prelude module for convenient imports
///
/// This module re-exports commonly used types and traits for convenience.
pub mod prelude {
    pub use crate::{
        buffer::TrajectoryBuffer,
        env::{EnvAction, Environment, PositionGame, PositionGameConfig, RenderMode, StepResult},
        policy::{ActorCritic, MlpActorCritic, MlpConfig},
        spaces::{BoxSpace, Discrete, Space, SpaceInfo, SpaceKind},
        train::{
            Callbacks, EpochEvent, PPOTrainer, RunState, StepEvent, TrainConfig, TrainOutcome,
            TrainOverrides, TrainingHandle,
        },
        utils::{EpochStatistics, statistics_scalar},
    };
}

/// Current version of drive-rl
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.1.0");
    }
}
