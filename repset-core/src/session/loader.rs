//! Builds a [`WorkoutSession`] from a local snapshot or from the backend.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::backend::Backend;
use crate::backend::models::{NewWorkoutLog, WorkoutExerciseRow};
use crate::config::{SessionConfig, snapshot_key};
use crate::error::{BackendError, LoadError};
use crate::retry::with_backoff;
use crate::session::model::{SessionExercise, SetInput, WorkoutSession};
use crate::storage::LocalStore;

pub struct SessionLoader {
    backend: Arc<dyn Backend>,
    store: Arc<dyn LocalStore>,
    config: SessionConfig,
}

impl SessionLoader {
    pub fn new(backend: Arc<dyn Backend>, store: Arc<dyn LocalStore>, config: SessionConfig) -> Self {
        Self {
            backend,
            store,
            config,
        }
    }

    /// Recovers the local snapshot if one exists, otherwise starts a fresh
    /// session and creates its workout log.
    pub async fn load(&self, workout_id: &str) -> Result<WorkoutSession, LoadError> {
        if let Some(session) = self.recover(workout_id).await {
            info!(
                "Recovered workout {} at {}s with {} pending writes",
                workout_id,
                session.elapsed_seconds,
                session.offline_queue.len()
            );
            return Ok(session);
        }

        let session = with_backoff(self.config.load_retry, "load_workout", |attempt| {
            debug!("Fetching workout {} (attempt {})", workout_id, attempt);
            self.fetch_fresh(workout_id)
        })
        .await
        .map_err(|e| LoadError::from_backend(e.last, e.attempts))?;

        info!(
            "Started workout {} with {} exercises, log {:?}",
            workout_id,
            session.exercises.len(),
            session.log_id
        );
        Ok(session)
    }

    async fn recover(&self, workout_id: &str) -> Option<WorkoutSession> {
        let key = snapshot_key(workout_id);
        let bytes = match self.store.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!("Could not read snapshot {}: {}", key, e);
                return None;
            }
        };
        match WorkoutSession::from_snapshot(&bytes) {
            Ok(session) if session.workout_id == workout_id => Some(session),
            Ok(session) => {
                warn!(
                    "Snapshot {} belongs to workout {}, ignoring",
                    key, session.workout_id
                );
                None
            }
            Err(e) => {
                warn!("Discarding corrupt snapshot {}: {}", key, e);
                None
            }
        }
    }

    async fn fetch_fresh(
        &self,
        workout_id: &str,
    ) -> Result<WorkoutSession, BackendError> {
        let workout = self.backend.fetch_workout(workout_id).await?;
        let rows = self.backend.fetch_workout_exercises(&workout.id).await?;
        if rows.is_empty() {
            return Err(BackendError::NotFound(format!(
                "exercises for workout {}",
                workout_id
            )));
        }

        let exercises = rows.iter().map(|row| self.session_exercise(row)).collect();
        let mut session = WorkoutSession::new(workout.id.clone(), exercises);

        let log = self
            .backend
            .create_workout_log(&NewWorkoutLog {
                workout_id: workout.id,
                started_at: session.started_at,
            })
            .await?;
        session.log_id = Some(log.id);
        Ok(session)
    }

    fn session_exercise(&self, row: &WorkoutExerciseRow) -> SessionExercise {
        let sets = row.sets.max(1) as usize;
        let input = SetInput::new(
            row.weight
                .map(format_weight)
                .unwrap_or_else(|| self.config.default_weight.clone()),
            row.reps
                .map(|r| r.to_string())
                .unwrap_or_else(|| self.config.default_reps.clone()),
        );
        SessionExercise {
            workout_exercise_id: row.id.clone(),
            exercise_id: row.exercise_id.clone(),
            name: row.name.clone(),
            prescribed_sets: row.sets,
            rest_seconds: row.rest_seconds,
            completed: vec![false; sets],
            inputs: vec![input; sets],
        }
    }
}

fn format_weight(weight: f64) -> String {
    if weight.fract() == 0.0 {
        format!("{:.0}", weight)
    } else {
        weight.to_string()
    }
}
