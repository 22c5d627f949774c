//! Run state and cooperative cancellation
//!
//! ```text
//! Idle -> Running -> Stopping -> Idle
//!                 \-> Completed
//! ```
//!
//! The training loop polls the stop flag at step boundaries, between epochs
//! and before each value-function iteration. Waiters block on a condition
//! variable until the run leaves `Running`/`Stopping`.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use super::TrainError;

/// How long [`TrainingHandle::stop`] waits for the loop to acknowledge
pub const STOP_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Lifecycle of a training run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum RunState {
    /// No run started yet, or the last one was stopped
    #[default]
    Idle,
    /// Collecting experience or updating
    Running,
    /// Stop requested, loop has not acknowledged yet
    Stopping,
    /// Last run finished all epochs
    Completed,
}

impl RunState {
    /// Whether a run is in progress
    pub fn is_active(self) -> bool {
        matches!(self, RunState::Running | RunState::Stopping)
    }
}

#[derive(Debug, Default)]
pub(crate) struct TrainingState {
    stop_requested: AtomicBool,
    run: Mutex<RunState>,
    changed: Condvar,
}

impl TrainingState {
    /// Enter `Running`, clearing any stale stop request
    pub(crate) fn begin_run(self: &Arc<Self>) -> Result<RunGuard, TrainError> {
        let mut run = self.run.lock();
        if run.is_active() {
            return Err(TrainError::AlreadyRunning);
        }
        self.stop_requested.store(false, Ordering::Release);
        *run = RunState::Running;
        self.changed.notify_all();
        Ok(RunGuard { state: Arc::clone(self), finished: false })
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Set the stop flag; returns whether a run was active to receive it
    fn request_stop(&self) -> bool {
        self.stop_requested.store(true, Ordering::Release);
        let mut run = self.run.lock();
        if *run == RunState::Running {
            *run = RunState::Stopping;
            self.changed.notify_all();
        }
        run.is_active()
    }

    fn finish(&self, next: RunState) {
        let mut run = self.run.lock();
        *run = next;
        self.changed.notify_all();
    }

    fn state(&self) -> RunState {
        *self.run.lock()
    }
}

/// Marks the end of a run; dropping it unfinished (error path) returns to `Idle`
#[derive(Debug)]
pub(crate) struct RunGuard {
    state: Arc<TrainingState>,
    finished: bool,
}

impl RunGuard {
    /// The loop acknowledged a stop request
    pub(crate) fn stopped(mut self) {
        self.finished = true;
        self.state.finish(RunState::Idle);
    }

    /// All epochs ran
    pub(crate) fn completed(mut self) {
        self.finished = true;
        self.state.finish(RunState::Completed);
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.state.finish(RunState::Idle);
        }
    }
}

/// Cloneable, thread-safe control surface of a trainer
///
/// Do not call the blocking methods from inside a training callback: the
/// callback runs on the training thread, which would then wait on itself.
#[derive(Debug, Clone)]
pub struct TrainingHandle {
    state: Arc<TrainingState>,
}

impl TrainingHandle {
    pub(crate) fn new(state: Arc<TrainingState>) -> Self {
        Self { state }
    }

    /// Ask the running loop to stop, without waiting
    ///
    /// A request made while no run is active is discarded by the next
    /// `train` call.
    pub fn request_stop(&self) {
        self.state.request_stop();
    }

    /// Ask the running loop to stop and wait up to [`STOP_GRACE_PERIOD`]
    ///
    /// Returns `true` once an active run has ended. Returns `false` when the
    /// loop did not finish within the grace period, and when no run was
    /// active: a `train` call that has not started yet clears the request
    /// and runs to completion.
    pub fn stop(&self) -> bool {
        self.stop_within(STOP_GRACE_PERIOD)
    }

    /// [`TrainingHandle::stop`] with a custom grace period
    pub fn stop_within(&self, grace: Duration) -> bool {
        if !self.state.request_stop() {
            return false;
        }
        let mut run = self.state.run.lock();
        self.state.changed.wait_while_for(&mut run, |run| run.is_active(), grace);
        !run.is_active()
    }

    /// Block until no run is active, then return `true`
    pub fn is_stop(&self) -> bool {
        let mut run = self.state.run.lock();
        self.state.changed.wait_while(&mut run, |run| run.is_active());
        true
    }

    /// Whether no run is active, without blocking
    pub fn is_done(&self) -> bool {
        !self.state.state().is_active()
    }

    /// Current run state
    pub fn state(&self) -> RunState {
        self.state.state()
    }

    /// Whether a stop was requested for the current run
    pub fn stop_requested(&self) -> bool {
        self.state.stop_requested()
    }
}
