//! In-process backend used by tests and scripted runs.
//!
//! Faults can be scripted per operation to simulate flaky connectivity:
//! scripted outcomes are consumed first, then a persistent fault (if any)
//! applies to every remaining call.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use log::debug;
use uuid::Uuid;

use super::models::{
    CompletedSetRow, NewWorkoutLog, WorkoutExerciseRow, WorkoutLogRow, WorkoutLogUpdate,
    WorkoutRow,
};
use super::{Backend, BackendResult};
use crate::error::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FetchWorkout,
    FetchExercises,
    CreateLog,
    UpdateLog,
    InsertSet,
    UpdateSets,
    UpdateRating,
}

#[derive(Default)]
struct Tables {
    workouts: HashMap<String, WorkoutRow>,
    exercises: Vec<WorkoutExerciseRow>,
    logs: HashMap<String, WorkoutLogRow>,
    completed_sets: Vec<CompletedSetRow>,
    scripted: HashMap<Operation, VecDeque<Option<BackendError>>>,
    persistent: HashMap<Operation, BackendError>,
    calls: HashMap<Operation, u32>,
}

impl Tables {
    fn check(&mut self, op: Operation) -> BackendResult<()> {
        *self.calls.entry(op).or_insert(0) += 1;
        if let Some(outcome) = self.scripted.get_mut(&op).and_then(|q| q.pop_front()) {
            return match outcome {
                Some(err) => Err(err),
                None => Ok(()),
            };
        }
        match self.persistent.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<Tables>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // A poisoned lock only means a test panicked mid-call; the data is still usable.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert_workout(&self, workout: WorkoutRow, exercises: Vec<WorkoutExerciseRow>) {
        let mut tables = self.tables();
        tables.exercises.retain(|e| e.workout_id != workout.id);
        tables.exercises.extend(exercises);
        tables.workouts.insert(workout.id.clone(), workout);
    }

    /// Queues outcomes for the next calls of `op`; `None` means success.
    pub fn script(&self, op: Operation, outcomes: Vec<Option<BackendError>>) {
        self.tables().scripted.entry(op).or_default().extend(outcomes);
    }

    pub fn fail_next(&self, op: Operation, times: usize, err: BackendError) {
        self.script(op, vec![Some(err); times]);
    }

    pub fn fail_always(&self, op: Operation, err: BackendError) {
        self.tables().persistent.insert(op, err);
    }

    pub fn clear_faults(&self) {
        let mut tables = self.tables();
        tables.scripted.clear();
        tables.persistent.clear();
    }

    pub fn calls(&self, op: Operation) -> u32 {
        self.tables().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn completed_sets(&self) -> Vec<CompletedSetRow> {
        self.tables().completed_sets.clone()
    }

    pub fn log(&self, log_id: &str) -> Option<WorkoutLogRow> {
        self.tables().logs.get(log_id).cloned()
    }

    pub fn workout(&self, workout_id: &str) -> Option<WorkoutRow> {
        self.tables().workouts.get(workout_id).cloned()
    }

    pub fn exercise_sets(&self, workout_exercise_id: &str) -> Option<u32> {
        self.tables()
            .exercises
            .iter()
            .find(|e| e.id == workout_exercise_id)
            .map(|e| e.sets)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn fetch_workout(&self, workout_id: &str) -> BackendResult<WorkoutRow> {
        let mut tables = self.tables();
        tables.check(Operation::FetchWorkout)?;
        tables
            .workouts
            .get(workout_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("workout {}", workout_id)))
    }

    async fn fetch_workout_exercises(
        &self,
        workout_id: &str,
    ) -> BackendResult<Vec<WorkoutExerciseRow>> {
        let mut tables = self.tables();
        tables.check(Operation::FetchExercises)?;
        let mut rows: Vec<WorkoutExerciseRow> = tables
            .exercises
            .iter()
            .filter(|e| e.workout_id == workout_id)
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.order_index);
        Ok(rows)
    }

    async fn create_workout_log(&self, log: &NewWorkoutLog) -> BackendResult<WorkoutLogRow> {
        let mut tables = self.tables();
        tables.check(Operation::CreateLog)?;
        let row = WorkoutLogRow {
            id: Uuid::new_v4().to_string(),
            workout_id: log.workout_id.clone(),
            started_at: log.started_at,
            completed_at: None,
            duration_seconds: None,
            rating: None,
            last_saved_at: None,
        };
        debug!("MemoryBackend created log {} for workout {}", row.id, row.workout_id);
        tables.logs.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn update_workout_log(
        &self,
        log_id: &str,
        update: &WorkoutLogUpdate,
    ) -> BackendResult<()> {
        let mut tables = self.tables();
        tables.check(Operation::UpdateLog)?;
        let row = tables
            .logs
            .get_mut(log_id)
            .ok_or_else(|| BackendError::NotFound(format!("workout log {}", log_id)))?;
        if update.completed_at.is_some() {
            row.completed_at = update.completed_at;
        }
        if update.duration_seconds.is_some() {
            row.duration_seconds = update.duration_seconds;
        }
        if update.rating.is_some() {
            row.rating = update.rating;
        }
        if update.last_saved_at.is_some() {
            row.last_saved_at = update.last_saved_at;
        }
        Ok(())
    }

    async fn insert_completed_set(&self, set: &CompletedSetRow) -> BackendResult<()> {
        let mut tables = self.tables();
        tables.check(Operation::InsertSet)?;
        if tables
            .completed_sets
            .iter()
            .any(|s| s.idempotency_key == set.idempotency_key)
        {
            debug!("MemoryBackend ignoring duplicate set {}", set.idempotency_key);
            return Ok(());
        }
        tables.completed_sets.push(set.clone());
        Ok(())
    }

    async fn update_exercise_sets(
        &self,
        workout_exercise_id: &str,
        sets: u32,
    ) -> BackendResult<()> {
        let mut tables = self.tables();
        tables.check(Operation::UpdateSets)?;
        let row = tables
            .exercises
            .iter_mut()
            .find(|e| e.id == workout_exercise_id)
            .ok_or_else(|| {
                BackendError::NotFound(format!("workout exercise {}", workout_exercise_id))
            })?;
        row.sets = sets;
        Ok(())
    }

    async fn update_workout_rating(&self, workout_id: &str, rating: u8) -> BackendResult<()> {
        let mut tables = self.tables();
        tables.check(Operation::UpdateRating)?;
        let row = tables
            .workouts
            .get_mut(workout_id)
            .ok_or_else(|| BackendError::NotFound(format!("workout {}", workout_id)))?;
        row.rating = Some(f64::from(rating));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_set(key: &str) -> CompletedSetRow {
        CompletedSetRow {
            idempotency_key: key.to_string(),
            workout_id: "w1".into(),
            log_id: Some("log".into()),
            exercise_id: "squat".into(),
            set_order: 1,
            reps: 5,
            weight: 100.0,
            completed_at: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_idempotency_keys_insert_once() {
        let backend = MemoryBackend::new();
        backend.insert_completed_set(&sample_set("k1")).await.unwrap();
        backend.insert_completed_set(&sample_set("k1")).await.unwrap();
        backend.insert_completed_set(&sample_set("k2")).await.unwrap();
        assert_eq!(backend.completed_sets().len(), 2);
        assert_eq!(backend.calls(Operation::InsertSet), 3);
    }

    #[tokio::test]
    async fn scripted_faults_are_consumed_in_order() {
        let backend = MemoryBackend::new();
        backend.script(
            Operation::InsertSet,
            vec![None, Some(BackendError::Transient("offline".into()))],
        );
        assert!(backend.insert_completed_set(&sample_set("a")).await.is_ok());
        assert!(backend.insert_completed_set(&sample_set("b")).await.is_err());
        assert!(backend.insert_completed_set(&sample_set("c")).await.is_ok());
        assert_eq!(backend.completed_sets().len(), 2);
    }

    #[tokio::test]
    async fn missing_workout_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend.fetch_workout("nope").await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));
    }
}
