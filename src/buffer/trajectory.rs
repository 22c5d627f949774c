//! Trajectory buffer for on-policy training
//!
//! Stores one epoch of transitions from a single environment. Episodes (or
//! pieces of episodes) are closed with [`TrajectoryBuffer::finish_path`],
//! which fills in advantages and rewards-to-go for the path. Once the buffer
//! is full, [`TrajectoryBuffer::get`] hands out the whole epoch with
//! normalized advantages and starts over.
//!
//! # Buffer Layout
//!
//! All fields are flat, pre-allocated vectors indexed by step:
//! observations are `[capacity * obs_dim]`, actions `[capacity * act_dim]`
//! and the per-step scalars `[capacity]`.

use tch::{Device, Tensor};
use thiserror::Error;

use crate::spaces::numel;

mod gae;

pub use gae::discount_cumsum;

/// Advantages with a smaller standard deviation are only centred
const MIN_ADV_STD: f32 = 1e-8;

/// Errors raised by the trajectory buffer
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    /// `store` past capacity
    #[error("trajectory buffer is full ({capacity} transitions)")]
    Full {
        /// Buffer capacity
        capacity: usize,
    },

    /// `get` before the buffer was filled
    #[error("trajectory buffer holds {len} of {capacity} transitions")]
    NotFull {
        /// Stored transitions
        len: usize,
        /// Buffer capacity
        capacity: usize,
    },

    /// Observation or action row of the wrong width
    #[error("{field} has {got} elements, expected {expected}")]
    DimensionMismatch {
        /// "observation" or "action"
        field: &'static str,
        /// Width the buffer was built with
        expected: usize,
        /// Width provided
        got: usize,
    },
}

/// Fixed-capacity on-policy trajectory store
#[derive(Debug, Clone)]
pub struct TrajectoryBuffer {
    obs_shape: Vec<usize>,
    obs_dim: usize,
    act_dim: usize,
    capacity: usize,
    gamma: f32,
    lam: f32,

    observations: Vec<f32>,
    actions: Vec<f32>,
    rewards: Vec<f32>,
    values: Vec<f32>,
    log_probs: Vec<f32>,
    advantages: Vec<f32>,
    returns: Vec<f32>,

    /// Write cursor
    ptr: usize,

    /// First step of the open path
    path_start: usize,
}

impl TrajectoryBuffer {
    /// Create a new trajectory buffer
    ///
    /// # Arguments
    ///
    /// * `obs_shape` - Shape of one observation
    /// * `act_dim` - Width of one flat action row
    /// * `capacity` - Transitions per epoch
    /// * `gamma` - Discount factor
    /// * `lam` - GAE lambda
    pub fn new(obs_shape: &[usize], act_dim: usize, capacity: usize, gamma: f32, lam: f32) -> Self {
        let obs_dim = numel(obs_shape);
        Self {
            obs_shape: obs_shape.to_vec(),
            obs_dim,
            act_dim,
            capacity,
            gamma,
            lam,
            observations: vec![0.0; capacity * obs_dim],
            actions: vec![0.0; capacity * act_dim],
            rewards: vec![0.0; capacity],
            values: vec![0.0; capacity],
            log_probs: vec![0.0; capacity],
            advantages: vec![0.0; capacity],
            returns: vec![0.0; capacity],
            ptr: 0,
            path_start: 0,
        }
    }

    /// Append one transition
    ///
    /// `obs` is the observation the action was taken in.
    ///
    /// # Errors
    ///
    /// [`BufferError::Full`] past capacity, [`BufferError::DimensionMismatch`]
    /// for rows of the wrong width. Nothing is written on error.
    pub fn store(
        &mut self,
        obs: &[f32],
        act: &[f32],
        reward: f32,
        value: f32,
        log_prob: f32,
    ) -> Result<(), BufferError> {
        if self.ptr >= self.capacity {
            return Err(BufferError::Full { capacity: self.capacity });
        }
        if obs.len() != self.obs_dim {
            return Err(BufferError::DimensionMismatch {
                field: "observation",
                expected: self.obs_dim,
                got: obs.len(),
            });
        }
        if act.len() != self.act_dim {
            return Err(BufferError::DimensionMismatch {
                field: "action",
                expected: self.act_dim,
                got: act.len(),
            });
        }

        let t = self.ptr;
        self.observations[t * self.obs_dim..(t + 1) * self.obs_dim].copy_from_slice(obs);
        self.actions[t * self.act_dim..(t + 1) * self.act_dim].copy_from_slice(act);
        self.rewards[t] = reward;
        self.values[t] = value;
        self.log_probs[t] = log_prob;
        self.ptr += 1;
        Ok(())
    }

    /// Close the open path
    ///
    /// `bootstrap` is 0 for a terminated episode and the value estimate of
    /// the next observation for a path that was cut off. An empty path is a
    /// no-op.
    pub fn finish_path(&mut self, bootstrap: f32) {
        let path = self.path_start..self.ptr;
        if path.is_empty() {
            return;
        }
        tracing::debug!(
            "Finishing path [{}, {}) with bootstrap {:.4}",
            path.start,
            path.end,
            bootstrap
        );

        gae::compute_path(
            &self.rewards[path.clone()],
            &self.values[path.clone()],
            bootstrap,
            self.gamma,
            self.lam,
            &mut self.advantages[path.clone()],
            &mut self.returns[path],
        );
        self.path_start = self.ptr;
    }

    /// Take the full epoch
    ///
    /// Advantages are shifted to mean 0 and scaled to (population) std 1;
    /// when the std is below `1e-8` they are only centred. The buffer is
    /// empty afterwards.
    ///
    /// # Errors
    ///
    /// [`BufferError::NotFull`] unless exactly `capacity` transitions were
    /// stored since the last `get`.
    pub fn get(&mut self) -> Result<TrajectoryBatch, BufferError> {
        if self.ptr != self.capacity {
            return Err(BufferError::NotFull { len: self.ptr, capacity: self.capacity });
        }
        if self.path_start != self.ptr {
            tracing::warn!(
                "Trajectory buffer read with an unfinished path of {} steps",
                self.ptr - self.path_start
            );
        }

        let advantages = normalize(&self.advantages);
        self.ptr = 0;
        self.path_start = 0;

        Ok(TrajectoryBatch {
            observations: self.observations.clone(),
            obs_shape: self.obs_shape.clone(),
            actions: self.actions.clone(),
            act_dim: self.act_dim,
            advantages,
            returns: self.returns.clone(),
            log_probs: self.log_probs.clone(),
        })
    }

    /// Transitions stored since the last `get`
    pub fn len(&self) -> usize {
        self.ptr
    }

    /// Whether no transition is stored
    pub fn is_empty(&self) -> bool {
        self.ptr == 0
    }

    /// Whether the next `store` would fail
    pub fn is_full(&self) -> bool {
        self.ptr == self.capacity
    }

    /// Transitions per epoch
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// First step of the open path
    pub fn path_start(&self) -> usize {
        self.path_start
    }

    /// Observation shape
    pub fn obs_shape(&self) -> &[usize] {
        &self.obs_shape
    }

    /// Action row width
    pub fn act_dim(&self) -> usize {
        self.act_dim
    }
}

fn normalize(values: &[f32]) -> Vec<f32> {
    let n = values.len().max(1) as f32;
    let mean = values.iter().sum::<f32>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    let std = var.sqrt();

    if std < MIN_ADV_STD {
        values.iter().map(|v| v - mean).collect()
    } else {
        values.iter().map(|v| (v - mean) / std).collect()
    }
}

/// One epoch of experience, ready for the update
#[derive(Debug, Clone)]
pub struct TrajectoryBatch {
    /// Observations: \[len * obs_dim\]
    pub observations: Vec<f32>,

    /// Shape of one observation
    pub obs_shape: Vec<usize>,

    /// Actions: \[len * act_dim\]
    pub actions: Vec<f32>,

    /// Width of one action row
    pub act_dim: usize,

    /// Normalized advantages: \[len\]
    pub advantages: Vec<f32>,

    /// Rewards-to-go: \[len\]
    pub returns: Vec<f32>,

    /// Log-probabilities at collection time: \[len\]
    pub log_probs: Vec<f32>,
}

impl TrajectoryBatch {
    /// Number of transitions
    pub fn len(&self) -> usize {
        self.returns.len()
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    /// Convert to tensors on `device`
    pub fn to_tensors(&self, device: Device) -> TensorBatch {
        let n = self.len() as i64;
        let obs_dim = numel(&self.obs_shape) as i64;
        TensorBatch {
            obs: Tensor::from_slice(&self.observations).view([n, obs_dim]).to_device(device),
            act: Tensor::from_slice(&self.actions)
                .view([n, self.act_dim as i64])
                .to_device(device),
            adv: Tensor::from_slice(&self.advantages).to_device(device),
            ret: Tensor::from_slice(&self.returns).to_device(device),
            logp: Tensor::from_slice(&self.log_probs).to_device(device),
        }
    }
}

/// Tensor form of a [`TrajectoryBatch`]
#[derive(Debug)]
pub struct TensorBatch {
    /// \[len, obs_dim\]
    pub obs: Tensor,
    /// \[len, act_dim\]
    pub act: Tensor,
    /// \[len\]
    pub adv: Tensor,
    /// \[len\]
    pub ret: Tensor,
    /// \[len\]
    pub logp: Tensor,
}
