//! Train PPO on the position game
//!
//! # Usage
//!
//! ```bash
//! cargo run --example train_position_game --release -- --epochs 20
//! cargo run --example train_position_game -- --config overrides.json --stop-after-secs 10
//! ```
//!
//! The overrides file uses the camelCase option names, e.g.
//! `{ "stepsPerEpoch": 2000, "piLr": 0.0003, "verbosity": "debug" }`.

use std::{path::PathBuf, thread, time::Duration};

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::{bounded, select};
use drive_rl::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "Train PPO on the position game")]
struct Args {
    /// JSON file with training overrides
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of epochs (overrides the file)
    #[arg(long)]
    epochs: Option<usize>,

    /// Steps per epoch (overrides the file)
    #[arg(long)]
    steps_per_epoch: Option<f64>,

    /// Seed for model and environment
    #[arg(long)]
    seed: Option<u64>,

    /// Stop the run from a watchdog thread after this many seconds
    #[arg(long)]
    stop_after_secs: Option<u64>,

    /// Hidden layer sizes
    #[arg(long, value_delimiter = ',', default_value = "24,48")]
    hidden: Vec<i64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut overrides = match &args.config {
        Some(path) => TrainOverrides::from_json_file(path)?,
        None => TrainOverrides::default(),
    };
    overrides.epochs = args.epochs.or(overrides.epochs);
    overrides.steps_per_epoch = args.steps_per_epoch.or(overrides.steps_per_epoch);
    overrides.seed = args.seed.or(overrides.seed);

    let defaults = TrainConfig::default().epochs(20).steps_per_epoch(1000.0).max_ep_len(50);
    let config = defaults.merge(&overrides);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.verbosity)?)
        .init();

    let env = PositionGame::with_seed(config.seed)?;
    tracing::info!("Environment: position game");
    tracing::info!("  Observation: {:?}", env.observation_space().descriptor());
    tracing::info!("  Action: {:?}", env.action_space().descriptor());

    let model_config = MlpConfig { hidden_sizes: args.hidden.clone(), ..Default::default() };
    let mut trainer = PPOTrainer::with_model(env, |env| {
        MlpActorCritic::new(
            &env.observation_space().descriptor(),
            &env.action_space().descriptor(),
            model_config,
        )
    })?;

    let (done_tx, done_rx) = bounded::<()>(1);
    let watchdog = args.stop_after_secs.map(|secs| {
        let handle = trainer.handle();
        thread::spawn(move || {
            select! {
                recv(done_rx) -> _ => {}
                default(Duration::from_secs(secs)) => {
                    tracing::info!("Stopping after {}s", secs);
                    if !handle.stop() {
                        tracing::warn!(
                            "No training run acknowledged the stop within the grace period"
                        );
                    }
                }
            }
        })
    });

    let mut best_mean = f64::NEG_INFINITY;
    let callbacks = Callbacks::new().on_epoch(|event| {
        if let Some(stats) = &event.statistics
            && stats.mean > best_mean
        {
            best_mean = stats.mean;
            tracing::info!("  New best mean return: {:.2}", best_mean);
        }
    });

    let outcome = trainer.train(&config, callbacks)?;
    // The receiver is gone when the watchdog already fired
    let _ = done_tx.send(());
    if let Some(watchdog) = watchdog
        && watchdog.join().is_err()
    {
        tracing::warn!("Watchdog thread panicked");
    }

    tracing::info!("Training {:?}, best mean return {:.2}", outcome, best_mean);

    let mut env = PositionGame::with_seed(config.seed.wrapping_add(1))?;
    let mut obs = env.reset()?;
    tracing::info!("Greedy rollout:");
    tracing::info!("  {}", env.render(RenderMode::Text)?);
    loop {
        let result = env.step(trainer.act(&obs)?)?;
        tracing::info!("  {}  reward {:.1}", env.render(RenderMode::Text)?, result.reward);
        if result.done {
            break;
        }
        obs = result.observation;
    }

    Ok(())
}
