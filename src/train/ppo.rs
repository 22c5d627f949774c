//! Proximal Policy Optimization (PPO) algorithm
//!
//! This module implements the PPO algorithm for training RL agents.
//! PPO is a policy gradient method that uses a clipped surrogate objective
//! to ensure stable, reliable policy updates.
//!
//! # Algorithm Overview
//!
//! ```text
//! For each epoch:
//!   1. Collect steps_per_epoch transitions with the current policy
//!   2. Close every path with a bootstrap value (GAE-λ advantages)
//!   3. Up to train_pi_iters policy steps, stopping early on KL
//!   4. train_v_iters value function steps
//! ```
//!
//! A run can be stopped from another thread through a
//! [`TrainingHandle`]; the loop notices at the next step boundary.
//!
//! # References
//!
//! - [Proximal Policy Optimization Algorithms](https://arxiv.org/abs/1707.06347)
//! - [OpenAI Spinning Up: PPO](https://spinningup.openai.com/en/latest/algorithms/ppo.html)

use thiserror::Error;

pub mod callbacks;
pub mod config;
pub mod control;
pub mod loss;
pub mod stats;
pub mod trainer;

pub use callbacks::{Callbacks, EpochEvent, StepEvent};
pub use config::{MAX_STEPS_PER_EPOCH, TrainConfig, TrainOverrides};
pub use control::{RunState, STOP_GRACE_PERIOD, TrainingHandle};
pub use loss::{PiInfo, UpdateOutcome, UpdateParams, compute_loss_pi, compute_loss_v, update};
pub use stats::UpdateMetrics;
pub use trainer::{PPOTrainer, TrainOutcome};

/// Errors that keep a training run from starting
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrainError {
    /// `train` called while another run is in progress
    #[error("a training run is already in progress")]
    AlreadyRunning,

    /// Rejected configuration
    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),
}
