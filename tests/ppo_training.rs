//! End-to-end PPO runs on the position game

use anyhow::{Result, bail};
use drive_rl::prelude::*;
use tch::Device;

/// Match a target with a continuous action; episodes last five steps
struct Tracking {
    target: f32,
    steps: usize,
    observation_space: BoxSpace,
    action_space: BoxSpace,
}

impl Tracking {
    fn new() -> Self {
        Self {
            target: 0.0,
            steps: 0,
            observation_space: BoxSpace::new(-1.0f32, 1.0f32, &[1]).unwrap(),
            action_space: BoxSpace::unbounded(&[1]),
        }
    }
}

impl Environment for Tracking {
    type ObservationSpace = BoxSpace;
    type ActionSpace = BoxSpace;
    type Action = Vec<f32>;

    fn reset(&mut self) -> Result<Vec<f32>> {
        self.steps = 0;
        self.target = 0.5;
        Ok(vec![self.target])
    }

    fn step(&mut self, action: Vec<f32>) -> Result<StepResult> {
        if !self.action_space.contains(&action) {
            bail!("invalid action {action:?}");
        }
        self.steps += 1;
        let reward = -(action[0] - self.target).powi(2);
        self.target = -self.target;
        Ok(StepResult { observation: vec![self.target], reward, done: self.steps == 5 })
    }

    fn observation_space(&self) -> &BoxSpace {
        &self.observation_space
    }

    fn action_space(&self) -> &BoxSpace {
        &self.action_space
    }
}

fn trainer(seed: u64) -> PPOTrainer<PositionGame, MlpActorCritic> {
    PPOTrainer::with_model(PositionGame::with_seed(seed).unwrap(), |env| {
        MlpActorCritic::new(
            &env.observation_space().descriptor(),
            &env.action_space().descriptor(),
            MlpConfig { device: Device::Cpu, ..Default::default() },
        )
    })
    .unwrap()
}

#[test]
fn test_two_epochs_fire_epoch_callback_twice() {
    let mut trainer = trainer(0);
    let handle = trainer.handle();
    let config = TrainConfig::new().epochs(2).steps_per_epoch(50.0).seed(0);

    let mut epochs = Vec::new();
    let mut steps = Vec::new();
    let callbacks = Callbacks::new()
        .on_step(|event| {
            assert_eq!(event.observation.len(), 2);
            steps.push((event.step, event.total_steps));
        })
        .on_epoch(|event| epochs.push(event.clone()));

    let outcome = trainer.train(&config, callbacks).unwrap();

    assert_eq!(outcome, TrainOutcome::Completed);
    // Step indices restart every epoch, the run-wide count does not
    let expected: Vec<_> = (0..100).map(|i| (i % 50, i + 1)).collect();
    assert_eq!(steps, expected);
    assert_eq!(epochs.len(), 2);
    for (i, event) in epochs.iter().enumerate() {
        assert_eq!(event.epoch, i);
        assert_eq!(event.buffer_len, 0);
        assert_eq!(event.total_steps, 50 * (i + 1));
        assert!(event.metrics.trained_pi_iters <= config.train_pi_iters);
        assert!(event.metrics.kl.is_finite());
        if let Some(stats) = &event.statistics {
            assert!(stats.count >= 1);
            assert!(stats.min <= stats.mean && stats.mean <= stats.max);
        }
    }
    assert_eq!(handle.state(), RunState::Completed);
    assert!(handle.is_stop());
}

#[test]
fn test_episode_returns_follow_game_rewards() {
    let mut trainer = trainer(2);
    let config = TrainConfig::new().epochs(1).steps_per_epoch(200.0).train_v_iters(5);

    let mut statistics = None;
    let callbacks = Callbacks::new().on_epoch(|event| statistics = event.statistics);
    trainer.train(&config, callbacks).unwrap();

    // 200 steps with episodes capped at 50 steps always finish one
    let stats = statistics.unwrap();
    // Shortest episodes pay -1 per step and 20 at the end; the longest lose 49 + 10
    assert!(stats.max <= 19.0, "max return {}", stats.max);
    assert!(stats.min >= -59.0, "min return {}", stats.min);
}

#[test]
fn test_trainer_can_run_again_after_completion() {
    let mut trainer = trainer(3);
    let config = TrainConfig::new().epochs(1).steps_per_epoch(30.0).train_v_iters(2);

    assert_eq!(trainer.train(&config, Callbacks::default()).unwrap(), TrainOutcome::Completed);
    assert_eq!(trainer.train(&config, Callbacks::default()).unwrap(), TrainOutcome::Completed);
}

#[test]
fn test_overrides_drive_a_run() {
    let overrides =
        TrainOverrides::from_json_str(r#"{ "epochs": 1, "stepsPerEpoch": 25, "trainVIters": 3 }"#)
            .unwrap();
    let config = TrainConfig::default().merge(&overrides);

    let mut trainer = trainer(4);
    let mut total = 0;
    let callbacks = Callbacks::new().on_epoch(|event| total = event.total_steps);
    trainer.train(&config, callbacks).unwrap();
    assert_eq!(total, 25);
}

#[test]
fn test_continuous_actions_drive_a_run() {
    let mut trainer = PPOTrainer::with_model(Tracking::new(), |env| {
        MlpActorCritic::new(
            &env.observation_space().descriptor(),
            &env.action_space().descriptor(),
            MlpConfig { device: Device::Cpu, ..Default::default() },
        )
    })
    .unwrap();
    assert_eq!(trainer.actor_critic().obs_dim(), 1);
    assert_eq!(trainer.actor_critic().act_dim(), 1);

    let config = TrainConfig::new().epochs(2).steps_per_epoch(20.0).train_v_iters(5);
    let mut statistics = Vec::new();
    let callbacks = Callbacks::new().on_epoch(|event| statistics.push(event.statistics));

    assert_eq!(trainer.train(&config, callbacks).unwrap(), TrainOutcome::Completed);
    for stats in statistics {
        let stats = stats.unwrap();
        assert_eq!(stats.count, 4);
        assert!(stats.max <= 0.0);
    }

    let action = trainer.act(&[0.5]).unwrap();
    assert_eq!(action.len(), 1);
    assert!(action[0].is_finite());
}
