//! Training callbacks
//!
//! Both slots default to no-ops. Callbacks run on the training thread.

use serde::Serialize;

use super::stats::UpdateMetrics;
use crate::utils::stats::EpochStatistics;

/// One environment step
#[derive(Debug, Clone, Copy)]
pub struct StepEvent<'o> {
    /// Observation returned by the environment
    pub observation: &'o [f32],

    /// Reward of the step
    pub reward: f32,

    /// Step index within the current epoch (0-based)
    pub step: usize,

    /// Steps taken since the start of the run, this one included
    pub total_steps: usize,
}

/// End of an epoch, after the update
#[derive(Debug, Clone, Serialize)]
pub struct EpochEvent {
    /// Epoch index (0-based)
    pub epoch: usize,

    /// Returns of the episodes that finished this epoch; `None` if none did
    pub statistics: Option<EpochStatistics>,

    /// Update diagnostics
    pub metrics: UpdateMetrics,

    /// Transitions left in the buffer (0 after a successful update)
    pub buffer_len: usize,

    /// Steps taken since the start of the run
    pub total_steps: usize,
}

type StepFn<'a> = Box<dyn FnMut(StepEvent<'_>) + 'a>;
type EpochFn<'a> = Box<dyn FnMut(&EpochEvent) + 'a>;

/// Step and epoch hooks for [`PPOTrainer::train`](super::PPOTrainer::train)
pub struct Callbacks<'a> {
    step: StepFn<'a>,
    epoch: EpochFn<'a>,
}

impl Default for Callbacks<'_> {
    fn default() -> Self {
        Self { step: Box::new(|_| {}), epoch: Box::new(|_| {}) }
    }
}

impl<'a> Callbacks<'a> {
    /// No-op callbacks
    pub fn new() -> Self {
        Self::default()
    }

    /// Called after every environment step
    pub fn on_step(mut self, f: impl FnMut(StepEvent<'_>) + 'a) -> Self {
        self.step = Box::new(f);
        self
    }

    /// Called after every epoch's update
    pub fn on_epoch(mut self, f: impl FnMut(&EpochEvent) + 'a) -> Self {
        self.epoch = Box::new(f);
        self
    }

    pub(crate) fn step(&mut self, event: StepEvent<'_>) {
        (self.step)(event);
    }

    pub(crate) fn epoch(&mut self, event: &EpochEvent) {
        (self.epoch)(event);
    }
}

impl std::fmt::Debug for Callbacks<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callbacks_forward_events() {
        let mut rewards = Vec::new();
        let mut epochs = Vec::new();
        {
            let mut callbacks = Callbacks::new()
                .on_step(|event| rewards.push((event.step, event.reward)))
                .on_epoch(|event| epochs.push(event.epoch));

            callbacks.step(StepEvent {
                observation: &[0.5, 0.8],
                reward: -1.0,
                step: 0,
                total_steps: 1,
            });
            callbacks.step(StepEvent {
                observation: &[0.6, 0.8],
                reward: 20.0,
                step: 1,
                total_steps: 2,
            });
            callbacks.epoch(&EpochEvent {
                epoch: 0,
                statistics: None,
                metrics: UpdateMetrics::default(),
                buffer_len: 0,
                total_steps: 2,
            });
        }
        assert_eq!(rewards, vec![(0, -1.0), (1, 20.0)]);
        assert_eq!(epochs, vec![0]);
    }

    #[test]
    fn test_default_callbacks_are_noops() {
        let mut callbacks = Callbacks::default();
        callbacks.step(StepEvent { observation: &[], reward: 0.0, step: 0, total_steps: 1 });
    }
}
