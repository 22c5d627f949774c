//! PPO configuration and hyperparameters
//!
//! This module defines the configuration parameters for PPO training,
//! validation, builder pattern methods and partial overrides loaded from
//! JSON.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::TrainError;

/// Largest accepted `steps_per_epoch`; the buffer is allocated up front
pub const MAX_STEPS_PER_EPOCH: f64 = (1u64 << 24) as f64;

/// PPO configuration parameters
///
/// Immutable for the duration of a `train` call. Defaults follow the common
/// single-environment settings (Spinning Up).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrainConfig {
    /// Prefix for log lines
    pub name: String,

    /// Log filter used by binaries that install a subscriber
    pub verbosity: String,

    /// Number of epochs
    pub epochs: usize,

    /// Environment steps per epoch; rounded up when not integral
    pub steps_per_epoch: f64,

    /// Episode length after which a path is cut and bootstrapped
    pub max_ep_len: usize,

    /// Discount factor (gamma)
    pub gamma: f64,

    /// GAE lambda parameter
    pub lam: f64,

    /// PPO clipping parameter (epsilon)
    pub clip_ratio: f64,

    /// Policy learning rate
    pub pi_lr: f64,

    /// Value function learning rate
    pub vf_lr: f64,

    /// Maximum policy gradient steps per epoch
    pub train_pi_iters: usize,

    /// Value function gradient steps per epoch
    pub train_v_iters: usize,

    /// Target KL divergence; policy updates stop past 1.5x this value
    pub target_kl: f64,

    /// Seed for the model and the environment
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            name: "PPO_Train".to_string(),
            verbosity: "info".to_string(),
            epochs: 50,
            steps_per_epoch: 10_000.0,
            max_ep_len: 1000,
            gamma: 0.99,
            lam: 0.97,
            clip_ratio: 0.2,
            pi_lr: 3e-4,
            vf_lr: 1e-3,
            train_pi_iters: 1,
            train_v_iters: 80,
            target_kl: 0.01,
            seed: 0,
        }
    }
}

impl TrainConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), TrainError> {
        let invalid = |msg: &str| Err(TrainError::InvalidConfig(msg.to_string()));

        if self.epochs == 0 {
            return invalid("epochs must be positive");
        }
        self.local_steps_per_epoch()?;
        if self.max_ep_len == 0 {
            return invalid("max_ep_len must be positive");
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return invalid("gamma must be in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.lam) {
            return invalid("lam must be in [0, 1]");
        }
        if !(self.clip_ratio > 0.0 && self.clip_ratio < 1.0) {
            return invalid("clip_ratio must be in (0, 1)");
        }
        if !(self.pi_lr > 0.0 && self.pi_lr.is_finite()) {
            return invalid("pi_lr must be positive");
        }
        if !(self.vf_lr > 0.0 && self.vf_lr.is_finite()) {
            return invalid("vf_lr must be positive");
        }
        if self.target_kl.is_nan() || self.target_kl <= 0.0 {
            return invalid("target_kl must be positive");
        }
        Ok(())
    }

    /// Steps collected per epoch by this (single) worker
    ///
    /// Returns the step count and whether it had to be rounded up.
    pub fn local_steps_per_epoch(&self) -> Result<(usize, bool), TrainError> {
        let requested = self.steps_per_epoch;
        if !requested.is_finite() || requested < 1.0 {
            return Err(TrainError::InvalidConfig(format!(
                "steps_per_epoch must be a finite number >= 1, got {requested}"
            )));
        }
        if requested > MAX_STEPS_PER_EPOCH {
            return Err(TrainError::InvalidConfig(format!(
                "steps_per_epoch must be at most {MAX_STEPS_PER_EPOCH}, got {requested}"
            )));
        }
        let steps = requested.ceil();
        Ok((steps as usize, steps != requested))
    }

    /// Apply overrides on top of this configuration
    pub fn merge(&self, overrides: &TrainOverrides) -> Self {
        let mut merged = self.clone();
        macro_rules! apply {
            ($($field:ident),*) => {
                $(if let Some(value) = &overrides.$field {
                    merged.$field = value.clone();
                })*
            };
        }
        apply!(
            name,
            verbosity,
            epochs,
            steps_per_epoch,
            max_ep_len,
            gamma,
            lam,
            clip_ratio,
            pi_lr,
            vf_lr,
            train_pi_iters,
            train_v_iters,
            target_kl,
            seed
        );
        merged
    }

    /// Set number of epochs
    pub fn epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Set steps per epoch
    pub fn steps_per_epoch(mut self, steps: f64) -> Self {
        self.steps_per_epoch = steps;
        self
    }

    /// Set maximum episode length
    pub fn max_ep_len(mut self, len: usize) -> Self {
        self.max_ep_len = len;
        self
    }

    /// Set discount factor
    pub fn gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set GAE lambda
    pub fn lam(mut self, lam: f64) -> Self {
        self.lam = lam;
        self
    }

    /// Set PPO clipping parameter
    pub fn clip_ratio(mut self, clip: f64) -> Self {
        self.clip_ratio = clip;
        self
    }

    /// Set policy learning rate
    pub fn pi_lr(mut self, lr: f64) -> Self {
        self.pi_lr = lr;
        self
    }

    /// Set value function learning rate
    pub fn vf_lr(mut self, lr: f64) -> Self {
        self.vf_lr = lr;
        self
    }

    /// Set maximum policy iterations
    pub fn train_pi_iters(mut self, iters: usize) -> Self {
        self.train_pi_iters = iters;
        self
    }

    /// Set value function iterations
    pub fn train_v_iters(mut self, iters: usize) -> Self {
        self.train_v_iters = iters;
        self
    }

    /// Set target KL divergence
    pub fn target_kl(mut self, kl: f64) -> Self {
        self.target_kl = kl;
        self
    }

    /// Set seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set log prefix
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set log filter
    pub fn verbosity(mut self, verbosity: impl Into<String>) -> Self {
        self.verbosity = verbosity.into();
        self
    }
}

/// Partial configuration; every present field replaces the default
///
/// Field meanings match [`TrainConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
#[allow(missing_docs)]
pub struct TrainOverrides {
    pub name: Option<String>,
    pub verbosity: Option<String>,
    pub epochs: Option<usize>,
    pub steps_per_epoch: Option<f64>,
    pub max_ep_len: Option<usize>,
    pub gamma: Option<f64>,
    pub lam: Option<f64>,
    pub clip_ratio: Option<f64>,
    pub pi_lr: Option<f64>,
    pub vf_lr: Option<f64>,
    pub train_pi_iters: Option<usize>,
    pub train_v_iters: Option<usize>,
    pub target_kl: Option<f64>,
    pub seed: Option<u64>,
}

impl TrainOverrides {
    /// Parse overrides from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid training overrides")
    }

    /// Load overrides from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json_str(&json)
    }
}
