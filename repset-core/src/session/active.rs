//! The active workout: store mutations plus their side effects.
//!
//! In-memory state is always updated inside a single lock scope before any
//! backend call is awaited, and results of the call are applied in a fresh
//! scope afterwards. Autosave therefore never sees a half-applied mutation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::sync::{Mutex, broadcast};

use crate::backend::Backend;
use crate::backend::models::WorkoutLogUpdate;
use crate::config::{SessionConfig, snapshot_key};
use crate::error::{InvalidOperation, LoadError, PersistenceError};
use crate::events::SessionEvent;
use crate::retry::with_backoff;
use crate::session::loader::SessionLoader;
use crate::session::model::{InputField, WorkoutSession};
use crate::session::store::{SessionProgress, SessionStore, SetCompletion};
use crate::storage::LocalStore;
use crate::sync::{FlushReport, PendingWrite, send_batch};
use crate::timer::RestTimerState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutosaveOutcome {
    /// `false` when there was no workout log yet and nothing was written.
    pub attempted: bool,
    pub local_saved: bool,
    pub remote_saved: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedWorkout {
    pub log_id: String,
    pub duration_seconds: u64,
    pub rating: u8,
    pub progress: SessionProgress,
}

pub struct ActiveWorkout {
    workout_id: String,
    store: Mutex<SessionStore>,
    backend: Arc<dyn Backend>,
    local: Arc<dyn LocalStore>,
    config: SessionConfig,
    events: broadcast::Sender<SessionEvent>,
    connected: AtomicBool,
    finished: AtomicBool,
    /// Orders set-count sends against offline flushes.
    count_writes: Mutex<()>,
    /// Held by autosave and finalize so a snapshot never outlives completion.
    lifecycle: Mutex<()>,
}

impl ActiveWorkout {
    pub fn new(
        session: WorkoutSession,
        backend: Arc<dyn Backend>,
        local: Arc<dyn LocalStore>,
        config: SessionConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            workout_id: session.workout_id.clone(),
            store: Mutex::new(SessionStore::new(session, &config)),
            backend,
            local,
            config,
            events,
            connected: AtomicBool::new(true),
            finished: AtomicBool::new(false),
            count_writes: Mutex::new(()),
            lifecycle: Mutex::new(()),
        }
    }

    /// Loads (or recovers) the workout and wraps it.
    pub async fn start(
        workout_id: &str,
        backend: Arc<dyn Backend>,
        local: Arc<dyn LocalStore>,
        config: SessionConfig,
    ) -> Result<Self, LoadError> {
        let loader = SessionLoader::new(backend.clone(), local.clone(), config.clone());
        let session = loader.load(workout_id).await?;
        Ok(Self::new(session, backend, local, config))
    }

    pub fn workout_id(&self) -> &str {
        &self.workout_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> WorkoutSession {
        self.store.lock().await.session().clone()
    }

    pub async fn progress(&self) -> SessionProgress {
        self.store.lock().await.progress()
    }

    pub async fn rest_state(&self) -> (RestTimerState, f64) {
        let store = self.store.lock().await;
        (store.rest_state(), store.rest_progress())
    }

    pub async fn pending_writes(&self) -> usize {
        self.store.lock().await.pending_count()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine; the UI may not be listening yet.
        let _ = self.events.send(event);
    }

    pub async fn update_set_input(
        &self,
        exercise_id: &str,
        set_index: usize,
        field: InputField,
        value: &str,
    ) -> bool {
        self.store
            .lock()
            .await
            .update_set_input(exercise_id, set_index, field, value)
    }

    pub async fn complete_current_set(&self) -> SetCompletion {
        let completion = self.store.lock().await.complete_current_set(Utc::now());

        match &completion {
            SetCompletion::Completed {
                set_index,
                rest_seconds,
                write,
                ..
            } => {
                self.emit(SessionEvent::SetCompleted {
                    exercise_id: write.exercise_id.clone(),
                    set_index: *set_index,
                });
                if *rest_seconds > 0 {
                    self.emit(SessionEvent::RestStarted {
                        seconds: *rest_seconds,
                    });
                }
                self.persist_or_queue(PendingWrite::CompletedSet(write.clone()))
                    .await;
            }
            SetCompletion::AdvancedExercise { to } => {
                self.emit(SessionEvent::ExerciseChanged { index: *to });
            }
            SetCompletion::NoChange => {
                debug!("complete_current_set: workout {} already done", self.workout_id);
            }
        }
        completion
    }

    pub async fn add_set(&self, exercise_id: &str) -> Result<usize, InvalidOperation> {
        let write = self.store.lock().await.add_set(exercise_id)?;
        Ok(self.after_set_count_change(exercise_id, write).await)
    }

    pub async fn remove_set(&self, exercise_id: &str) -> Result<usize, InvalidOperation> {
        let write = self.store.lock().await.remove_set(exercise_id)?;
        Ok(self.after_set_count_change(exercise_id, write).await)
    }

    async fn after_set_count_change(&self, exercise_id: &str, write: PendingWrite) -> usize {
        let sets = match &write {
            PendingWrite::SetCount { sets, .. } => *sets as usize,
            PendingWrite::CompletedSet(_) => 0,
        };
        self.emit(SessionEvent::SetCountChanged {
            exercise_id: exercise_id.to_string(),
            sets,
        });
        self.persist_or_queue(write).await;
        sets
    }

    /// Sends a write now; a failure parks it in the offline queue instead of
    /// reaching the caller.
    async fn persist_or_queue(&self, write: PendingWrite) {
        let _order = match &write {
            PendingWrite::SetCount { .. } => Some(self.count_writes.lock().await),
            PendingWrite::CompletedSet(_) => None,
        };

        let superseding = match &write {
            PendingWrite::SetCount {
                workout_exercise_id,
                ..
            } => self
                .store
                .lock()
                .await
                .has_pending_set_count(workout_exercise_id),
            PendingWrite::CompletedSet(_) => false,
        };

        if superseding {
            // Sending now would let the older queued count land last.
            debug!("Replacing queued set count with {:?}", write);
        } else if self.connected.load(Ordering::SeqCst) {
            match write.send(self.backend.as_ref()).await {
                Ok(()) => {
                    debug!("Persisted {:?}", write);
                    return;
                }
                Err(e) => warn!("Write failed, queueing for later: {}", e),
            }
        } else {
            debug!("Offline; queueing {:?}", write);
        }
        let pending = {
            let mut store = self.store.lock().await;
            store.enqueue(write);
            store.pending_count()
        };
        self.emit(SessionEvent::WriteQueued { pending });
    }

    pub async fn advance_exercise(&self, delta: i64) -> usize {
        let index = self.store.lock().await.advance_exercise(delta);
        self.emit(SessionEvent::ExerciseChanged { index });
        index
    }

    pub async fn pause(&self) {
        self.store.lock().await.pause();
    }

    pub async fn resume(&self) {
        self.store.lock().await.resume();
    }

    pub async fn pause_rest(&self) {
        self.store.lock().await.pause_rest();
    }

    pub async fn resume_rest(&self) {
        self.store.lock().await.resume_rest();
    }

    pub async fn skip_rest(&self) {
        if self.store.lock().await.skip_rest() {
            self.emit(SessionEvent::RestFinished);
        }
    }

    pub async fn extend_rest(&self, seconds: u32) {
        let reopened = self.store.lock().await.extend_rest(seconds);
        if reopened {
            self.emit(SessionEvent::RestStarted { seconds });
        }
    }

    /// One second of workout clock.
    pub async fn elapsed_tick(&self) -> bool {
        self.store.lock().await.tick()
    }

    /// One second of rest countdown; returns `true` when rest just ended.
    pub async fn rest_tick(&self) -> bool {
        let finished = self.store.lock().await.rest_tick();
        if finished {
            self.emit(SessionEvent::RestFinished);
        }
        finished
    }

    /// Feeds a connectivity change. Flushes the offline queue when the
    /// device comes back online.
    pub async fn set_connectivity(&self, connected: bool) -> Option<FlushReport> {
        let was_connected = self.connected.swap(connected, Ordering::SeqCst);
        if connected && !was_connected {
            info!("Connectivity restored; flushing offline queue");
            return Some(self.flush_offline().await);
        }
        None
    }

    /// Sends everything queued at call time. Items queued while the flush is
    /// running stay behind the ones that fail again.
    pub async fn flush_offline(&self) -> FlushReport {
        let _order = self.count_writes.lock().await;
        let batch = self.store.lock().await.take_pending();
        if batch.is_empty() {
            return FlushReport::default();
        }

        let (report, failed) = send_batch(self.backend.as_ref(), batch).await;
        let pending = {
            let mut store = self.store.lock().await;
            store.restore_pending(failed);
            store.pending_count()
        };
        self.emit(SessionEvent::OfflineFlushed {
            written: report.written,
            pending,
        });
        report
    }

    /// Writes the recovery snapshot locally and marks the log as saved on
    /// the backend. Does nothing until the workout log exists.
    pub async fn autosave(&self) -> AutosaveOutcome {
        if self.is_finished() {
            return AutosaveOutcome::default();
        }
        let _lifecycle = self.lifecycle.lock().await;
        if self.is_finished() {
            debug!("Autosave skipped: workout {} already finished", self.workout_id);
            return AutosaveOutcome::default();
        }
        let now = Utc::now();
        let (log_id, elapsed, bytes) = {
            let store = self.store.lock().await;
            let Some(log_id) = store.session().log_id.clone() else {
                debug!("Autosave skipped: no workout log yet");
                return AutosaveOutcome::default();
            };
            let mut session = store.session().clone();
            session.last_saved_at = Some(now);
            (log_id, session.elapsed_seconds, session.to_snapshot())
        };

        let mut outcome = AutosaveOutcome {
            attempted: true,
            ..Default::default()
        };

        let local_result = match bytes {
            Ok(bytes) => self
                .local
                .set(&snapshot_key(&self.workout_id), &bytes)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match local_result {
            Ok(()) => {
                outcome.local_saved = true;
                self.store.lock().await.mark_saved(now);
            }
            Err(reason) => {
                warn!("Autosave could not write recovery snapshot: {}", reason);
                self.emit(SessionEvent::AutosaveDegraded { reason });
            }
        }

        match self
            .backend
            .update_workout_log(&log_id, &WorkoutLogUpdate::autosave(elapsed, now))
            .await
        {
            Ok(()) => outcome.remote_saved = true,
            Err(e) => warn!("Autosave could not update workout log {}: {}", log_id, e),
        }

        debug!(
            "Autosave at {}s: local={} remote={}",
            elapsed, outcome.local_saved, outcome.remote_saved
        );
        outcome
    }

    /// Finalizes the workout log with the user's rating. This is the only
    /// in-session write that reports failure to the caller.
    pub async fn complete(&self, rating: u8) -> Result<CompletedWorkout, PersistenceError> {
        if !(1..=5).contains(&rating) {
            return Err(PersistenceError::InvalidRating(rating));
        }
        let _lifecycle = self.lifecycle.lock().await;
        if self.is_finished() {
            return Err(PersistenceError::AlreadyFinished);
        }
        let (log_id, elapsed) = {
            let store = self.store.lock().await;
            let log_id = store
                .session()
                .log_id
                .clone()
                .ok_or(PersistenceError::MissingLog)?;
            (log_id, store.session().elapsed_seconds)
        };

        self.flush_offline().await;

        let update = WorkoutLogUpdate::finalize(elapsed, rating, Utc::now());
        with_backoff(self.config.finalize_retry, "finalize_workout_log", |_| {
            self.backend.update_workout_log(&log_id, &update)
        })
        .await
        .map_err(|e| {
            error!("Could not finalize workout log {}: {}", log_id, e.last);
            PersistenceError::Finalize {
                attempts: e.attempts,
                source: e.last,
            }
        })?;

        if let Err(e) = self
            .backend
            .update_workout_rating(&self.workout_id, rating)
            .await
        {
            warn!("Could not update rating of workout {}: {}", self.workout_id, e);
        }
        self.finished.store(true, Ordering::SeqCst);
        if let Err(e) = self.local.remove(&snapshot_key(&self.workout_id)).await {
            warn!("Could not remove recovery snapshot: {}", e);
        }

        let progress = self.progress().await;
        info!(
            "Workout {} finished in {}s, {}/{} sets, rating {}",
            self.workout_id, elapsed, progress.completed_sets, progress.total_sets, rating
        );
        self.emit(SessionEvent::WorkoutFinished {
            log_id: log_id.clone(),
        });

        Ok(CompletedWorkout {
            log_id,
            duration_seconds: elapsed,
            rating,
            progress,
        })
    }
}
