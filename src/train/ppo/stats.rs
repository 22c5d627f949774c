//! Training statistics for PPO
//!
//! Diagnostics produced by one epoch's update.

use serde::{Deserialize, Serialize};

/// Diagnostics of one update
///
/// Loss deltas are (loss after the update) - (loss before the update), both
/// measured on the epoch's batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateMetrics {
    /// Policy loss before the update
    pub loss_pi: f64,

    /// Value loss before the update
    pub loss_v: f64,

    /// Approximate KL of the last evaluated policy iteration
    pub kl: f64,

    /// Mean policy entropy of the last evaluated policy iteration
    pub entropy: f64,

    /// Fraction of clipped ratios of the last evaluated policy iteration
    pub clip_frac: f64,

    /// Change of the policy loss
    pub delta_pi_loss: f64,

    /// Change of the value loss
    pub delta_vf_loss: f64,

    /// Policy gradient steps actually applied
    pub trained_pi_iters: usize,
}

impl UpdateMetrics {
    /// Whether the policy loop stopped on the KL limit
    pub fn stopped_early(&self, train_pi_iters: usize) -> bool {
        self.trained_pi_iters < train_pi_iters
    }
}
