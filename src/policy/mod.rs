//! Actor-critic models
//!
//! The trainer talks to models through [`ActorCritic`]. The policy and the
//! value function keep their parameters in separate variable stores so that
//! each can be driven by its own optimizer.

use tch::{Device, Tensor, nn};

pub mod mlp;

pub use mlp::{Activation, MlpActorCritic, MlpConfig};

/// Actor-critic interface used by the PPO trainer
///
/// Observation tensors are `[batch, obs_dim]` floats. Action tensors are
/// `[batch, act_dim]` floats; a discrete action travels as its index in a
/// single column.
pub trait ActorCritic {
    /// Sample actions without tracking gradients
    fn step(&self, obs: &Tensor) -> PolicyStep;

    /// Differentiable log-probabilities and entropies of `act` under the policy
    fn evaluate(&self, obs: &Tensor, act: &Tensor) -> PolicyEvaluation;

    /// Differentiable value estimates, shape `[batch]`
    fn value(&self, obs: &Tensor) -> Tensor;

    /// Deterministic evaluation action (mode of the distribution)
    fn act(&self, obs: &Tensor) -> Tensor;

    /// Policy parameters
    fn pi_var_store(&self) -> &nn::VarStore;

    /// Value function parameters
    fn v_var_store(&self) -> &nn::VarStore;

    /// Device the parameters live on
    fn device(&self) -> Device;
}

/// Output of [`ActorCritic::step`]
#[derive(Debug)]
pub struct PolicyStep {
    /// Sampled actions, `[batch, act_dim]`
    pub action: Tensor,

    /// Value estimates, `[batch]`
    pub value: Tensor,

    /// Log-probabilities of the sampled actions, `[batch]`
    pub log_prob: Tensor,
}

/// Output of [`ActorCritic::evaluate`]
#[derive(Debug)]
pub struct PolicyEvaluation {
    /// Log-probabilities, `[batch]`
    pub log_prob: Tensor,

    /// Entropies, `[batch]`
    pub entropy: Tensor,
}
