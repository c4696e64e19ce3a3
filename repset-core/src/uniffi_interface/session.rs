use std::sync::Arc;

use log::*;
use tokio::sync::Mutex;
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::backend::RestBackend;
use crate::config::SessionConfig;
use crate::events::SessionEvent;
use crate::scheduler::SchedulerHandle;
use crate::session::{ActiveWorkout, SetCompletion};
use crate::storage::FileStore;
use crate::uniffi_interface::errors::RepsetError;
use crate::uniffi_interface::objects::{
    BackendSettings, InputFieldKind, ProgressView, SessionView, WorkoutEvent,
};

/// A running workout as seen from the mobile shell. The scheduler driver
/// lives as long as the handle.
#[derive(uniffi::Object)]
pub struct WorkoutHandle {
    workout: Arc<ActiveWorkout>,
    scheduler: SchedulerHandle,
    events: Mutex<broadcast::Receiver<SessionEvent>>,
}

#[uniffi::export(async_runtime = "tokio")]
pub async fn open_workout(
    settings: BackendSettings,
    storage_dir: String,
    workout_id: String,
) -> std::result::Result<Arc<WorkoutHandle>, RepsetError> {
    // The driver must outlive whichever foreign thread made this call.
    let rt = crate::runtime::init_global_runtime().await?;
    let backend = Arc::new(RestBackend::new(settings.into())?);
    let local = Arc::new(FileStore::open(&storage_dir).await?);

    let workout = Arc::new(
        ActiveWorkout::start(&workout_id, backend, local, SessionConfig::default()).await?,
    );
    let events = Mutex::new(workout.subscribe());
    let scheduler = SchedulerHandle::spawn(workout.clone(), rt.handle());
    info!("Opened workout {} from {}", workout_id, storage_dir);

    Ok(Arc::new(WorkoutHandle {
        workout,
        scheduler,
        events,
    }))
}

#[uniffi::export(async_runtime = "tokio")]
impl WorkoutHandle {
    pub async fn view(&self) -> SessionView {
        let session = self.workout.snapshot().await;
        let (rest, progress) = self.workout.rest_state().await;
        SessionView::new(&session, rest, progress)
    }

    pub async fn progress(&self) -> ProgressView {
        self.workout.progress().await.into()
    }

    pub async fn update_set_input(
        &self,
        exercise_id: String,
        set_index: u32,
        field: InputFieldKind,
        value: String,
    ) -> bool {
        self.workout
            .update_set_input(&exercise_id, set_index as usize, field.into(), &value)
            .await
    }

    /// Returns `false` when every set of the last exercise is already done.
    pub async fn complete_current_set(&self) -> bool {
        !matches!(
            self.workout.complete_current_set().await,
            SetCompletion::NoChange
        )
    }

    pub async fn add_set(&self, exercise_id: String) -> std::result::Result<u32, RepsetError> {
        Ok(self.workout.add_set(&exercise_id).await? as u32)
    }

    pub async fn remove_set(&self, exercise_id: String) -> std::result::Result<u32, RepsetError> {
        Ok(self.workout.remove_set(&exercise_id).await? as u32)
    }

    pub async fn advance_exercise(&self, delta: i32) -> u32 {
        self.workout.advance_exercise(i64::from(delta)).await as u32
    }

    pub async fn pause(&self) {
        self.workout.pause().await;
    }

    pub async fn resume(&self) {
        self.workout.resume().await;
    }

    pub async fn pause_rest(&self) {
        self.workout.pause_rest().await;
    }

    pub async fn resume_rest(&self) {
        self.workout.resume_rest().await;
    }

    pub async fn skip_rest(&self) {
        self.workout.skip_rest().await;
    }

    pub async fn extend_rest(&self, seconds: u32) {
        self.workout.extend_rest(seconds).await;
    }

    pub async fn set_connectivity(&self, connected: bool) {
        if let Some(report) = self.workout.set_connectivity(connected).await {
            debug!("Reconnect flush: {:?}", report);
        }
    }

    /// Saves immediately, e.g. when the app is backgrounded.
    pub async fn save_now(&self) -> bool {
        let outcome = self.workout.autosave().await;
        outcome.local_saved
    }

    pub async fn finish(&self, rating: u8) -> std::result::Result<(), RepsetError> {
        self.workout.complete(rating).await?;
        self.scheduler.teardown();
        Ok(())
    }

    /// Drains events published since the last call.
    pub async fn poll_events(&self) -> Vec<WorkoutEvent> {
        let mut receiver = self.events.lock().await;
        let mut events = Vec::new();
        loop {
            match receiver.try_recv() {
                Ok(event) => events.push(event.into()),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Dropped {} workout events; UI polled too slowly", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        events
    }

    /// Stops the driver without finalizing, leaving the snapshot for recovery.
    pub fn close(&self) {
        self.scheduler.teardown();
    }
}
