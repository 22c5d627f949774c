//! Training algorithms
//!
//! This module implements RL training algorithms like PPO.

pub mod ppo;

pub use ppo::{
    Callbacks, EpochEvent, PPOTrainer, RunState, StepEvent, TrainConfig, TrainError,
    TrainOutcome, TrainOverrides, TrainingHandle, UpdateMetrics,
};
