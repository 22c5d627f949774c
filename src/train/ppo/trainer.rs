//! PPO Trainer implementation
//!
//! This module contains the main PPOTrainer struct and its training loop.

use std::sync::Arc;

use anyhow::Result;
use tch::{
    Device, Tensor,
    nn::{self, OptimizerConfig},
};

use super::{
    callbacks::{Callbacks, EpochEvent, StepEvent},
    config::TrainConfig,
    control::{TrainingHandle, TrainingState},
    loss::{UpdateOutcome, UpdateParams, update},
};
use crate::{
    buffer::TrajectoryBuffer,
    env::{EnvAction, Environment, StepResult},
    policy::{ActorCritic, PolicyStep},
    spaces::Space,
    utils::stats::statistics_scalar,
};

/// How a training run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainOutcome {
    /// All epochs ran
    Completed,

    /// Stopped through a [`TrainingHandle`]
    Stopped,
}

/// PPO Trainer for policy optimization
///
/// Owns the environment and the actor-critic. Each call to
/// [`PPOTrainer::train`] builds a fresh buffer and fresh optimizers.
pub struct PPOTrainer<E, A> {
    env: E,
    ac: A,
    state: Arc<TrainingState>,
}

impl<E, A> PPOTrainer<E, A>
where
    E: Environment,
    A: ActorCritic,
{
    /// Create a new PPO trainer
    ///
    /// # Arguments
    ///
    /// * `env` - Environment to collect experience from
    /// * `ac` - Actor-critic sized for the environment's spaces
    pub fn new(env: E, ac: A) -> Self {
        Self { env, ac, state: Arc::new(TrainingState::default()) }
    }

    /// Build the actor-critic from the environment's spaces
    pub fn with_model<F>(env: E, build: F) -> Result<Self>
    where
        F: FnOnce(&E) -> Result<A>,
    {
        let ac = build(&env)?;
        Ok(Self::new(env, ac))
    }

    /// Control surface for stopping and waiting from other threads
    pub fn handle(&self) -> TrainingHandle {
        TrainingHandle::new(Arc::clone(&self.state))
    }

    /// Get reference to the environment
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Replace the environment, returning the previous one
    pub fn set_env(&mut self, env: E) -> E {
        std::mem::replace(&mut self.env, env)
    }

    /// Get reference to the actor-critic
    pub fn actor_critic(&self) -> &A {
        &self.ac
    }

    /// Split into environment and actor-critic
    pub fn into_parts(self) -> (E, A) {
        (self.env, self.ac)
    }

    /// Evaluation-only action for one observation
    pub fn act(&self, observation: &[f32]) -> Result<E::Action> {
        let obs = self.observation_tensor(observation);
        let action = self.ac.act(&obs);
        let values = Vec::<f32>::try_from(action.to_device(Device::Cpu).view([-1]))?;
        E::Action::from_values(&values)
    }

    /// Run PPO for `config.epochs` epochs
    ///
    /// Returns [`TrainOutcome::Stopped`] when a stop was requested through a
    /// [`TrainingHandle`] or a callback.
    ///
    /// # Errors
    ///
    /// Invalid configuration, a run already in progress, and any failure of
    /// the environment or the buffer.
    pub fn train(
        &mut self,
        config: &TrainConfig,
        mut callbacks: Callbacks<'_>,
    ) -> Result<TrainOutcome> {
        config.validate()?;
        let run = self.state.begin_run()?;
        let name = config.name.as_str();

        let (steps_per_epoch, adjusted) = config.local_steps_per_epoch()?;
        if adjusted {
            tracing::warn!(
                "{}: steps_per_epoch {} is not a whole number, using {}",
                name,
                config.steps_per_epoch,
                steps_per_epoch
            );
        }

        tch::manual_seed(config.seed as i64);
        self.env.seed(config.seed);

        let obs_info = self.env.observation_space().descriptor();
        let act_info = self.env.action_space().descriptor();
        let mut buffer = TrajectoryBuffer::new(
            &obs_info.shape,
            act_info.flat_dim(),
            steps_per_epoch,
            config.gamma as f32,
            config.lam as f32,
        );

        let mut pi_optimizer = nn::Adam::default().build(self.ac.pi_var_store(), config.pi_lr)?;
        let mut vf_optimizer = nn::Adam::default().build(self.ac.v_var_store(), config.vf_lr)?;
        let params = UpdateParams {
            clip_ratio: config.clip_ratio,
            target_kl: config.target_kl,
            train_pi_iters: config.train_pi_iters,
            train_v_iters: config.train_v_iters,
        };

        tracing::info!(
            "{}: training for {} epochs of {} steps (seed {})",
            name,
            config.epochs,
            steps_per_epoch,
            config.seed
        );

        let mut obs = self.env.reset()?;
        let mut ep_ret = 0.0f32;
        let mut ep_len = 0usize;
        let mut episode_returns = Vec::new();
        let mut total_steps = 0usize;

        for epoch in 0..config.epochs {
            for t in 0..steps_per_epoch {
                if self.state.stop_requested() {
                    tracing::info!("{}: stopped at epoch {} step {}", name, epoch, t);
                    run.stopped();
                    return Ok(TrainOutcome::Stopped);
                }

                let PolicyStep { action, value, log_prob } =
                    self.ac.step(&self.observation_tensor(&obs));
                let action = Vec::<f32>::try_from(action.to_device(Device::Cpu).view([-1]))?;
                let value = value.double_value(&[0]) as f32;
                let log_prob = log_prob.double_value(&[0]) as f32;

                let StepResult { observation: next_obs, reward, done } =
                    self.env.step(E::Action::from_values(&action)?)?;
                total_steps += 1;
                callbacks.step(StepEvent {
                    observation: &next_obs,
                    reward,
                    step: t,
                    total_steps,
                });

                buffer.store(&obs, &action, reward, value, log_prob)?;
                ep_ret += reward;
                ep_len += 1;
                obs = next_obs;

                let timeout = ep_len == config.max_ep_len;
                let terminal = done || timeout;
                let epoch_ended = t == steps_per_epoch - 1;

                if terminal || epoch_ended {
                    if epoch_ended && !terminal {
                        tracing::warn!(
                            "{}: trajectory cut off by epoch at {} steps",
                            name,
                            ep_len
                        );
                    }
                    let bootstrap = if timeout || epoch_ended { self.value_of(&obs) } else { 0.0 };
                    buffer.finish_path(bootstrap);

                    if terminal {
                        tracing::debug!(
                            "{}: episode finished, return {:.2}, length {}",
                            name,
                            ep_ret,
                            ep_len
                        );
                        episode_returns.push(ep_ret);
                    }
                    obs = self.env.reset()?;
                    ep_ret = 0.0;
                    ep_len = 0;
                }
            }

            let batch = buffer.get()?.to_tensors(self.ac.device());
            let state = &self.state;
            let outcome = update(
                &self.ac,
                &mut pi_optimizer,
                &mut vf_optimizer,
                &batch,
                &params,
                || state.stop_requested(),
            );
            let metrics = match outcome {
                UpdateOutcome::Completed(metrics) => metrics,
                UpdateOutcome::Stopped => {
                    tracing::info!("{}: stopped during the update of epoch {}", name, epoch);
                    run.stopped();
                    return Ok(TrainOutcome::Stopped);
                }
            };

            let statistics = statistics_scalar(&episode_returns);
            match &statistics {
                Some(stats) => tracing::info!(
                    "{}: epoch {}/{} | episodes {} | return {:.2} (min {:.2}, max {:.2}, std {:.2}) | kl {:.4} | entropy {:.3} | pi iters {}",
                    name,
                    epoch + 1,
                    config.epochs,
                    stats.count,
                    stats.mean,
                    stats.min,
                    stats.max,
                    stats.std,
                    metrics.kl,
                    metrics.entropy,
                    metrics.trained_pi_iters
                ),
                None => tracing::info!(
                    "{}: epoch {}/{} | no finished episode | kl {:.4} | entropy {:.3} | pi iters {}",
                    name,
                    epoch + 1,
                    config.epochs,
                    metrics.kl,
                    metrics.entropy,
                    metrics.trained_pi_iters
                ),
            }

            callbacks.epoch(&EpochEvent {
                epoch,
                statistics,
                metrics,
                buffer_len: buffer.len(),
                total_steps,
            });
            episode_returns.clear();
        }

        tracing::info!("{}: finished {} epochs, {} steps", name, config.epochs, total_steps);
        run.completed();
        Ok(TrainOutcome::Completed)
    }

    fn observation_tensor(&self, observation: &[f32]) -> Tensor {
        Tensor::from_slice(observation).view([1, -1]).to_device(self.ac.device())
    }

    fn value_of(&self, observation: &[f32]) -> f32 {
        let value = tch::no_grad(|| self.ac.value(&self.observation_tensor(observation)));
        value.double_value(&[0]) as f32
    }
}

impl<E, A> std::fmt::Debug for PPOTrainer<E, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PPOTrainer").field("state", &self.state).finish_non_exhaustive()
    }
}
