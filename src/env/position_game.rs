//! Position Game
//!
//! A one-dimensional toy task for checking the training loop end to end:
//! - State: `[position, target]`, both in `[0, 1]`
//! - Actions: 0 moves left by 0.1, 1 moves right by 0.1
//! - Start: position 0.5, target drawn from {0.1, ..., 0.9} (never 0.4-0.6)
//! - Episode ends at a wall (0.0 or 1.0), on the target, or after
//!   `max_steps` steps
//! - Reward: `step_reward` every step; the final step instead pays
//!   `reached_first_try` when the target was reached in the minimal number of
//!   moves, `reached_target` when reached otherwise, `target_not_reached` when
//!   the episode ended elsewhere
//!
//! Positions are tracked in tenths so that comparisons are exact.
//!
//! Weight index `i` maps to target `(i + 1) / 10`, which keeps the targets
//! off the walls and mirrors the weights around the start. Indexing the
//! targets from 0.0 instead would put the heaviest target on the left wall.

use std::fmt::Write as _;

use anyhow::{Context, Result, bail};
use rand::{SeedableRng, distributions::WeightedIndex, prelude::Distribution, rngs::StdRng};
use serde::{Deserialize, Serialize};

use super::{Environment, RenderMode, StepResult};
use crate::spaces::{BoxSpace, Discrete, Space};

/// Sampling weights of the targets 0.1 ..= 0.9
const TARGET_WEIGHTS: [f32; 9] = [0.2, 0.15, 0.15, 0.0, 0.0, 0.0, 0.15, 0.15, 0.2];

const START: i32 = 5;
const WALL_HIGH: i32 = 10;

/// Rewards and episode limit of the position game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PositionGameConfig {
    /// Reward of every non-final step
    pub step_reward: f32,

    /// Final reward when the target was reached in the minimal number of moves
    pub reached_first_try: f32,

    /// Final reward when the target was reached with detours
    pub reached_target: f32,

    /// Final reward when the episode ended away from the target
    pub target_not_reached: f32,

    /// Steps before the episode is cut
    pub max_steps: usize,
}

impl Default for PositionGameConfig {
    fn default() -> Self {
        Self {
            step_reward: -1.0,
            reached_first_try: 20.0,
            reached_target: 10.0,
            target_not_reached: -10.0,
            max_steps: 50,
        }
    }
}

/// Move-to-the-target game on a line of eleven cells
#[derive(Debug, Clone)]
pub struct PositionGame {
    config: PositionGameConfig,
    position: i32,
    target: i32,
    steps: usize,
    steps_necessary: usize,
    targets: WeightedIndex<f32>,
    rng: StdRng,
    observation_space: BoxSpace,
    action_space: Discrete,
}

impl PositionGame {
    /// Create a new position game
    pub fn new(config: PositionGameConfig) -> Result<Self> {
        if config.max_steps == 0 {
            bail!("max_steps must be at least 1");
        }
        let targets = WeightedIndex::new(TARGET_WEIGHTS).context("invalid target weights")?;

        let mut game = Self {
            config,
            position: START,
            target: START,
            steps: 0,
            steps_necessary: 0,
            targets,
            rng: StdRng::from_entropy(),
            observation_space: BoxSpace::new(0.0f32, 1.0f32, &[2])?,
            action_space: Discrete::new(2)?,
        };
        game.draw_target();
        Ok(game)
    }

    /// Create a seeded game with the default rewards
    pub fn with_seed(seed: u64) -> Result<Self> {
        let mut game = Self::new(PositionGameConfig::default())?;
        game.seed(seed);
        game.draw_target();
        Ok(game)
    }

    /// Current position
    pub fn position(&self) -> f32 {
        self.position as f32 / 10.0
    }

    /// Current target
    pub fn target(&self) -> f32 {
        self.target as f32 / 10.0
    }

    /// Steps taken in the current episode
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Reward and limit settings
    pub fn config(&self) -> &PositionGameConfig {
        &self.config
    }

    fn draw_target(&mut self) {
        self.target = self.targets.sample(&mut self.rng) as i32 + 1;
        self.steps_necessary = (self.position - self.target).unsigned_abs() as usize;
    }

    fn observation(&self) -> Vec<f32> {
        vec![self.position(), self.target()]
    }
}

impl Environment for PositionGame {
    type ObservationSpace = BoxSpace;
    type ActionSpace = Discrete;
    type Action = i64;

    fn reset(&mut self) -> Result<Vec<f32>> {
        self.position = START;
        self.steps = 0;
        self.draw_target();
        Ok(self.observation())
    }

    fn step(&mut self, action: i64) -> Result<StepResult> {
        if !self.action_space.contains(&action) {
            bail!("action {action} is outside Discrete({})", self.action_space.n());
        }

        self.steps += 1;
        self.position += if action == 0 { -1 } else { 1 };

        let reached = self.position == self.target;
        let at_wall = self.position <= 0 || self.position >= WALL_HIGH;
        let done = reached || at_wall || self.steps >= self.config.max_steps;

        let reward = match (done, reached) {
            (false, _) => self.config.step_reward,
            (true, true) if self.steps == self.steps_necessary => self.config.reached_first_try,
            (true, true) => self.config.reached_target,
            (true, false) => self.config.target_not_reached,
        };

        Ok(StepResult { observation: self.observation(), reward, done })
    }

    fn observation_space(&self) -> &BoxSpace {
        &self.observation_space
    }

    fn action_space(&self) -> &Discrete {
        &self.action_space
    }

    fn render(&self, mode: RenderMode) -> Result<String> {
        if mode != RenderMode::Text {
            bail!("render mode {mode:?} is not supported by the position game");
        }

        let mut line = String::with_capacity(WALL_HIGH as usize + 32);
        line.push('|');
        for cell in 0..=WALL_HIGH {
            line.push(match (cell == self.position, cell == self.target) {
                (true, true) => '*',
                (true, false) => 'P',
                (false, true) => 'T',
                (false, false) => '.',
            });
        }
        line.push('|');
        write!(line, " step {}", self.steps)?;
        Ok(line)
    }

    fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
        self.observation_space.seed(seed);
        self.action_space.seed(seed.wrapping_add(1));
    }
}
