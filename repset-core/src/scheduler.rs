//! One-second driver for the active workout.
//!
//! A single tick advances the workout clock, then the rest countdown, then
//! runs autosave every `autosave_every_ticks` ticks. Keeping the order fixed
//! means an autosave always captures the state of the tick it runs in.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::session::{ActiveWorkout, AutosaveOutcome};

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub elapsed_advanced: bool,
    pub rest_finished: bool,
    pub autosave: Option<AutosaveOutcome>,
}

pub struct Scheduler {
    workout: Arc<ActiveWorkout>,
    ticks: u64,
    autosave_every: u64,
}

impl Scheduler {
    pub fn new(workout: Arc<ActiveWorkout>) -> Self {
        let autosave_every = workout.config().autosave_every_ticks.max(1);
        Self {
            workout,
            ticks: 0,
            autosave_every,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub async fn tick(&mut self) -> TickReport {
        self.ticks += 1;
        let elapsed_advanced = self.workout.elapsed_tick().await;
        let rest_finished = self.workout.rest_tick().await;
        let autosave = if self.ticks % self.autosave_every == 0 {
            Some(self.workout.autosave().await)
        } else {
            None
        };
        TickReport {
            elapsed_advanced,
            rest_finished,
            autosave,
        }
    }
}

/// Owns the spawned driver task. Dropping the handle stops the driver.
pub struct SchedulerHandle {
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn spawn(workout: Arc<ActiveWorkout>, runtime: &Handle) -> Self {
        let task = runtime.spawn(async move {
            let mut scheduler = Scheduler::new(workout.clone());
            let mut ticker = interval(TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of an interval completes immediately.
            ticker.tick().await;
            info!("Scheduler started for workout {}", workout.workout_id());
            loop {
                ticker.tick().await;
                if workout.is_finished() {
                    break;
                }
                let report = scheduler.tick().await;
                if report.rest_finished {
                    debug!("Rest finished at tick {}", scheduler.ticks());
                }
            }
            info!(
                "Scheduler stopped for workout {} after {} ticks",
                workout.workout_id(),
                scheduler.ticks()
            );
        });
        Self { task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops the driver. No tick runs after this returns.
    pub fn teardown(&self) {
        if self.is_running() {
            debug!("Scheduler teardown");
        }
        self.task.abort();
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
