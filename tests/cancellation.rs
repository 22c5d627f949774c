//! Cooperative stop of a running training loop

use std::{thread, time::Duration};

use crossbeam_channel::bounded;
use drive_rl::prelude::*;
use tch::Device;

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
fn test_stop_requested_from_step_callback() {
    let mut trainer = trainer(0);
    let handle = trainer.handle();
    let config = TrainConfig::new().epochs(5).steps_per_epoch(100.0);

    let mut last_step = 0;
    let mut epochs = 0;
    let callbacks = Callbacks::new()
        .on_step(|event| {
            last_step = event.step;
            if event.step == 10 {
                handle.request_stop();
            }
        })
        .on_epoch(|_| epochs += 1);

    let outcome = trainer.train(&config, callbacks).unwrap();

    // The loop notices at the next step boundary
    assert_eq!(outcome, TrainOutcome::Stopped);
    assert_eq!(last_step, 10);
    assert_eq!(epochs, 0);
    assert!(handle.is_stop());
    assert_eq!(handle.state(), RunState::Idle);
}

#[test]
fn test_stop_requested_from_epoch_callback() {
    let mut trainer = trainer(1);
    let handle = trainer.handle();
    let config = TrainConfig::new().epochs(3).steps_per_epoch(20.0).train_v_iters(2);

    let mut epochs = Vec::new();
    let callbacks = Callbacks::new().on_epoch(|event| {
        epochs.push(event.epoch);
        handle.request_stop();
    });

    assert_eq!(trainer.train(&config, callbacks).unwrap(), TrainOutcome::Stopped);
    assert_eq!(epochs, vec![0]);
}

#[test]
fn test_next_run_ignores_previous_stop() {
    let mut trainer = trainer(2);
    let handle = trainer.handle();
    let config = TrainConfig::new().epochs(1).steps_per_epoch(20.0).train_v_iters(2);

    let callbacks = Callbacks::new().on_step(|_| handle.request_stop());
    assert_eq!(trainer.train(&config, callbacks).unwrap(), TrainOutcome::Stopped);
    assert!(handle.stop_requested());

    assert_eq!(trainer.train(&config, Callbacks::default()).unwrap(), TrainOutcome::Completed);
    assert_eq!(handle.state(), RunState::Completed);
}

#[test]
fn test_stop_from_another_thread() {
    let mut trainer = trainer(3);
    let handle = trainer.handle();
    let (started_tx, started_rx) = bounded(1);

    let worker = thread::spawn(move || {
        let config = TrainConfig::new().epochs(1_000).steps_per_epoch(1_000.0);
        let callbacks = Callbacks::new().on_step(|event| {
            if event.total_steps == 1 {
                started_tx.send(()).unwrap();
            }
        });
        trainer.train(&config, callbacks)
    });

    started_rx.recv_timeout(Duration::from_secs(30)).unwrap();
    assert!(!handle.is_done());

    assert!(handle.stop(), "loop did not acknowledge the stop within the grace period");
    assert!(handle.is_stop());
    assert!(handle.is_done());

    let outcome = worker.join().unwrap().unwrap();
    assert_eq!(outcome, TrainOutcome::Stopped);
}

#[test]
fn test_is_stop_waits_for_completion() {
    let mut trainer = trainer(4);
    let handle = trainer.handle();
    let (started_tx, started_rx) = bounded(1);

    let worker = thread::spawn(move || {
        let config = TrainConfig::new().epochs(2).steps_per_epoch(50.0).train_v_iters(5);
        let callbacks = Callbacks::new().on_step(|event| {
            if event.total_steps == 1 {
                started_tx.send(()).unwrap();
            }
        });
        trainer.train(&config, callbacks)
    });

    started_rx.recv_timeout(Duration::from_secs(30)).unwrap();

    // Blocks until the run finishes on its own
    assert!(handle.is_stop());
    assert_eq!(handle.state(), RunState::Completed);
    assert_eq!(worker.join().unwrap().unwrap(), TrainOutcome::Completed);
}
