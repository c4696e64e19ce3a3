//! Synchronous mutations of the active workout.
//!
//! Every method here runs to completion without awaiting, so a snapshot
//! taken between two calls is always consistent. Backend writes are handed
//! back to the caller as [`PendingWrite`]s or [`CompletedSetRow`]s.

use chrono::{DateTime, Utc};
use log::{debug, info};
use uuid::Uuid;

use crate::backend::models::CompletedSetRow;
use crate::config::SessionConfig;
use crate::error::InvalidOperation;
use crate::session::model::{InputField, SetInput, WorkoutSession};
use crate::sync::PendingWrite;
use crate::timer::{RestTimer, RestTimerState};

#[derive(Debug, Clone, PartialEq)]
pub enum SetCompletion {
    Completed {
        exercise_index: usize,
        set_index: usize,
        rest_seconds: u32,
        write: CompletedSetRow,
    },
    AdvancedExercise {
        to: usize,
    },
    /// Every set of the last exercise is already done.
    NoChange,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionProgress {
    pub completed_sets: usize,
    pub total_sets: usize,
    /// Sum of weight x reps over completed sets.
    pub volume: f64,
}

#[derive(Debug)]
pub struct SessionStore {
    session: WorkoutSession,
    timer: RestTimer,
    default_rest_seconds: u32,
    default_input: SetInput,
}

impl SessionStore {
    pub fn new(session: WorkoutSession, config: &SessionConfig) -> Self {
        let mut timer = RestTimer::new();
        if session.is_resting {
            timer.restore(session.rest_remaining_seconds, session.rest_total_seconds);
            if session.rest_paused {
                timer.pause();
            }
        }
        let mut store = Self {
            session,
            timer,
            default_rest_seconds: config.default_rest_seconds,
            default_input: SetInput::new(config.default_weight.clone(), config.default_reps.clone()),
        };
        store.sync_rest_mirror();
        store
    }

    pub fn session(&self) -> &WorkoutSession {
        &self.session
    }

    pub fn into_session(self) -> WorkoutSession {
        self.session
    }

    pub fn rest_state(&self) -> RestTimerState {
        self.timer.state()
    }

    pub fn rest_progress(&self) -> f64 {
        self.timer.progress()
    }

    pub fn on_rest_complete(&mut self, callback: impl FnMut() + Send + 'static) {
        self.timer.on_complete(callback);
    }

    /// Returns `false` when the exercise or set does not exist.
    pub fn update_set_input(
        &mut self,
        exercise_id: &str,
        set_index: usize,
        field: InputField,
        value: &str,
    ) -> bool {
        let Some(input) = self
            .session
            .exercise_position(exercise_id)
            .and_then(|pos| self.session.exercises[pos].inputs.get_mut(set_index))
        else {
            debug!(
                "update_set_input ignored: exercise={} set={} out of range",
                exercise_id, set_index
            );
            return false;
        };
        match field {
            InputField::Weight => input.weight = value.to_string(),
            InputField::Reps => input.reps = value.to_string(),
        }
        true
    }

    /// Completes the first incomplete set of the current exercise and starts
    /// the rest countdown. When all sets are done, moves to the next exercise
    /// instead.
    pub fn complete_current_set(&mut self, now: DateTime<Utc>) -> SetCompletion {
        let index = self.session.current_exercise_index;
        let Some(exercise) = self.session.exercises.get_mut(index) else {
            return SetCompletion::NoChange;
        };

        let Some(set_index) = exercise.first_incomplete_set() else {
            let to = self.clamped_index(index as i64 + 1);
            if to == index {
                return SetCompletion::NoChange;
            }
            self.session.current_exercise_index = to;
            info!("All sets done; advanced to exercise {}", to);
            return SetCompletion::AdvancedExercise { to };
        };

        let input = &exercise.inputs[set_index];
        let write = CompletedSetRow {
            idempotency_key: Uuid::new_v4().to_string(),
            workout_id: self.session.workout_id.clone(),
            log_id: self.session.log_id.clone(),
            exercise_id: exercise.exercise_id.clone(),
            set_order: set_index as u32 + 1,
            reps: input.reps_value(),
            weight: input.weight_value(),
            completed_at: now,
            created_at: now,
        };
        exercise.completed[set_index] = true;
        let rest_seconds = exercise.rest_seconds.unwrap_or(self.default_rest_seconds);
        debug!("Completed {} set {}", exercise.exercise_id, set_index + 1);

        self.timer.start(rest_seconds);
        self.sync_rest_mirror();

        SetCompletion::Completed {
            exercise_index: index,
            set_index,
            rest_seconds,
            write,
        }
    }

    pub fn add_set(&mut self, exercise_id: &str) -> Result<PendingWrite, InvalidOperation> {
        let pos = self.position_of(exercise_id)?;
        let exercise = &mut self.session.exercises[pos];
        exercise.completed.push(false);
        exercise.inputs.push(self.default_input.clone());
        Ok(PendingWrite::SetCount {
            workout_exercise_id: exercise.workout_exercise_id.clone(),
            sets: exercise.set_count() as u32,
        })
    }

    pub fn remove_set(&mut self, exercise_id: &str) -> Result<PendingWrite, InvalidOperation> {
        let pos = self.position_of(exercise_id)?;
        let exercise = &mut self.session.exercises[pos];
        if exercise.set_count() < 2 {
            return Err(InvalidOperation::new(format!(
                "{} must keep at least one set",
                exercise.name
            )));
        }
        if exercise.completed.last() == Some(&true) {
            return Err(InvalidOperation::new(format!(
                "last set of {} is already completed",
                exercise.name
            )));
        }
        exercise.completed.pop();
        exercise.inputs.pop();
        Ok(PendingWrite::SetCount {
            workout_exercise_id: exercise.workout_exercise_id.clone(),
            sets: exercise.set_count() as u32,
        })
    }

    /// Moves the exercise cursor; a running rest countdown keeps going.
    pub fn advance_exercise(&mut self, delta: i64) -> usize {
        let target = self.session.current_exercise_index as i64 + delta;
        self.session.current_exercise_index = self.clamped_index(target);
        self.session.current_exercise_index
    }

    /// One second of wall-clock workout time. Returns `false` while paused.
    pub fn tick(&mut self) -> bool {
        if self.session.is_paused {
            return false;
        }
        self.session.elapsed_seconds += 1;
        true
    }

    /// One second of rest countdown. Returns `true` when the rest just ended.
    pub fn rest_tick(&mut self) -> bool {
        let finished = self.timer.tick();
        self.sync_rest_mirror();
        finished
    }

    pub fn pause_rest(&mut self) {
        self.timer.pause();
        self.sync_rest_mirror();
    }

    pub fn resume_rest(&mut self) {
        self.timer.resume();
        self.sync_rest_mirror();
    }

    pub fn skip_rest(&mut self) -> bool {
        let finished = self.timer.skip();
        self.sync_rest_mirror();
        finished
    }

    /// Returns `true` if extending re-opened a finished rest.
    pub fn extend_rest(&mut self, seconds: u32) -> bool {
        let was_resting = self.timer.is_active();
        self.timer.extend(seconds);
        self.sync_rest_mirror();
        !was_resting && self.session.is_resting
    }

    pub fn pause(&mut self) {
        self.session.is_paused = true;
    }

    pub fn resume(&mut self) {
        self.session.is_paused = false;
    }

    pub fn set_log_id(&mut self, log_id: String) {
        self.session.log_id = Some(log_id);
    }

    pub fn mark_saved(&mut self, at: DateTime<Utc>) {
        self.session.last_saved_at = Some(at);
    }

    pub fn enqueue(&mut self, write: PendingWrite) {
        self.session.offline_queue.enqueue(write);
    }

    pub fn has_pending_set_count(&self, workout_exercise_id: &str) -> bool {
        self.session.offline_queue.has_set_count(workout_exercise_id)
    }

    pub fn take_pending(&mut self) -> Vec<PendingWrite> {
        self.session.offline_queue.take_batch()
    }

    pub fn restore_pending(&mut self, failed: Vec<PendingWrite>) {
        self.session.offline_queue.restore_front(failed);
    }

    pub fn pending_count(&self) -> usize {
        self.session.offline_queue.len()
    }

    pub fn progress(&self) -> SessionProgress {
        let mut progress = SessionProgress {
            completed_sets: 0,
            total_sets: 0,
            volume: 0.0,
        };
        for exercise in &self.session.exercises {
            progress.total_sets += exercise.set_count();
            for (done, input) in exercise.completed.iter().zip(&exercise.inputs) {
                if *done {
                    progress.completed_sets += 1;
                    progress.volume += input.weight_value() * f64::from(input.reps_value());
                }
            }
        }
        progress
    }

    fn position_of(&self, exercise_id: &str) -> Result<usize, InvalidOperation> {
        self.session
            .exercise_position(exercise_id)
            .ok_or_else(|| InvalidOperation::new(format!("unknown exercise {}", exercise_id)))
    }

    fn clamped_index(&self, target: i64) -> usize {
        let last = self.session.exercises.len().saturating_sub(1) as i64;
        target.clamp(0, last) as usize
    }

    fn sync_rest_mirror(&mut self) {
        self.session.is_resting = self.timer.is_active();
        self.session.rest_remaining_seconds = self.timer.remaining_seconds();
        self.session.rest_total_seconds = self.timer.total_seconds();
        self.session.rest_paused = self.timer.state().is_paused;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fixtures::{exercise, session_with};

    fn store(exercises: Vec<crate::session::model::SessionExercise>) -> SessionStore {
        SessionStore::new(session_with(exercises), &SessionConfig::default())
    }

    fn assert_arrays_aligned(store: &SessionStore) {
        for e in &store.session().exercises {
            assert_eq!(e.completed.len(), e.inputs.len(), "{}", e.exercise_id);
        }
    }

    #[test]
    fn three_set_scenario_with_rest() {
        let mut store = store(vec![exercise("squat", 3, None)]);
        let now = Utc::now();

        let first = store.complete_current_set(now);
        assert!(matches!(
            first,
            SetCompletion::Completed { set_index: 0, rest_seconds: 45, .. }
        ));
        assert_eq!(store.session().exercises[0].completed, vec![true, false, false]);
        assert!(store.session().is_resting);
        assert_eq!(store.session().rest_remaining_seconds, 45);

        let finished: Vec<bool> = (0..45).map(|_| store.rest_tick()).collect();
        assert_eq!(finished.iter().filter(|f| **f).count(), 1);
        assert!(!store.session().is_resting);

        store.complete_current_set(now);
        assert_eq!(store.session().exercises[0].completed, vec![true, true, false]);
        store.complete_current_set(now);
        assert_eq!(store.session().exercises[0].completed, vec![true, true, true]);

        let before = store.session().clone();
        assert_eq!(store.complete_current_set(now), SetCompletion::NoChange);
        assert_eq!(store.session().current_exercise_index, 0);
        assert_eq!(store.session().exercises, before.exercises);
        assert_arrays_aligned(&store);
    }

    #[test]
    fn finished_exercise_advances_without_touching_sets() {
        let mut store = store(vec![exercise("bench", 1, Some(0)), exercise("row", 2, None)]);
        store.complete_current_set(Utc::now());
        assert!(!store.session().is_resting);

        let before = store.session().exercises.clone();
        assert_eq!(
            store.complete_current_set(Utc::now()),
            SetCompletion::AdvancedExercise { to: 1 }
        );
        assert_eq!(store.session().current_exercise_index, 1);
        assert_eq!(store.session().exercises, before);
    }

    #[test]
    fn completion_builds_write_from_inputs() {
        let mut store = store(vec![exercise("dl", 2, None)]);
        store.session.log_id = Some("log-9".into());
        assert!(store.update_set_input("dl", 0, InputField::Weight, "140"));
        assert!(store.update_set_input("dl", 0, InputField::Reps, "5"));

        let SetCompletion::Completed { write, .. } = store.complete_current_set(Utc::now()) else {
            panic!("expected a completed set");
        };
        assert_eq!(write.exercise_id, "dl");
        assert_eq!(write.set_order, 1);
        assert_eq!(write.reps, 5);
        assert_eq!(write.weight, 140.0);
        assert_eq!(write.log_id.as_deref(), Some("log-9"));
        assert!(!write.idempotency_key.is_empty());
    }

    #[test]
    fn out_of_range_input_updates_are_ignored() {
        let mut store = store(vec![exercise("dl", 2, None)]);
        let before = store.session().clone();
        assert!(!store.update_set_input("dl", 2, InputField::Reps, "3"));
        assert!(!store.update_set_input("nope", 0, InputField::Reps, "3"));
        assert_eq!(store.session(), &before);
    }

    #[test]
    fn add_and_remove_keep_arrays_aligned() {
        let mut store = store(vec![exercise("ohp", 2, None)]);
        let write = store.add_set("ohp").unwrap();
        assert_eq!(
            write,
            PendingWrite::SetCount {
                workout_exercise_id: "we-ohp".into(),
                sets: 3
            }
        );
        assert_arrays_aligned(&store);

        store.remove_set("ohp").unwrap();
        store.remove_set("ohp").unwrap();
        assert_eq!(store.session().exercises[0].set_count(), 1);
        assert_arrays_aligned(&store);
    }

    #[test]
    fn cannot_remove_only_set() {
        let mut store = store(vec![exercise("ohp", 1, None)]);
        let before = store.session().clone();
        assert!(store.remove_set("ohp").is_err());
        assert_eq!(store.session(), &before);
    }

    #[test]
    fn cannot_remove_completed_last_set() {
        let mut store = store(vec![exercise("ohp", 2, None)]);
        store.complete_current_set(Utc::now());
        store.complete_current_set(Utc::now());
        let err = store.remove_set("ohp").unwrap_err();
        assert!(err.0.contains("already completed"));
        assert_eq!(store.session().exercises[0].set_count(), 2);
    }

    #[test]
    fn unknown_exercise_is_invalid() {
        let mut store = store(vec![exercise("ohp", 2, None)]);
        assert!(store.add_set("curl").is_err());
        assert!(store.remove_set("curl").is_err());
    }

    #[test]
    fn advance_is_clamped_and_rest_continues() {
        let mut store = store(vec![
            exercise("a", 1, Some(30)),
            exercise("b", 1, None),
            exercise("c", 1, None),
        ]);
        store.complete_current_set(Utc::now());
        assert_eq!(store.advance_exercise(5), 2);
        assert!(store.session().is_resting);
        store.rest_tick();
        assert_eq!(store.session().rest_remaining_seconds, 29);
        assert_eq!(store.advance_exercise(-10), 0);
    }

    #[test]
    fn paused_session_does_not_accumulate_time() {
        let mut store = store(vec![exercise("a", 1, None)]);
        store.tick();
        store.pause();
        assert!(!store.tick());
        store.resume();
        store.tick();
        assert_eq!(store.session().elapsed_seconds, 2);
    }

    #[test]
    fn rest_controls_update_mirror() {
        let mut store = store(vec![exercise("a", 3, Some(20))]);
        store.complete_current_set(Utc::now());
        store.pause_rest();
        store.rest_tick();
        assert_eq!(store.session().rest_remaining_seconds, 20);
        assert!(store.session().is_resting);
        assert!(store.skip_rest());
        assert!(!store.session().is_resting);
        assert_eq!(store.session().rest_remaining_seconds, 0);
        assert!(store.extend_rest(10));
        assert!(store.session().is_resting);
        assert_eq!(store.session().rest_remaining_seconds, 10);
    }

    #[test]
    fn recovered_rest_resumes_countdown() {
        let mut session = session_with(vec![exercise("a", 2, None)]);
        session.exercises[0].completed[0] = true;
        session.is_resting = true;
        session.rest_remaining_seconds = 2;
        session.rest_total_seconds = 45;
        let mut store = SessionStore::new(session, &SessionConfig::default());
        assert!(!store.rest_tick());
        assert!(store.rest_tick());
        assert!(!store.session().is_resting);
    }

    #[test]
    fn recovered_paused_rest_stays_paused() {
        let mut live = store(vec![exercise("a", 2, Some(30))]);
        live.complete_current_set(Utc::now());
        live.rest_tick();
        live.pause_rest();
        let saved = live.session().clone();
        assert!(saved.rest_paused);

        let mut recovered = SessionStore::new(saved, &SessionConfig::default());
        assert!(recovered.rest_state().is_paused);
        assert!(!recovered.rest_tick());
        assert_eq!(recovered.session().rest_remaining_seconds, 29);

        recovered.resume_rest();
        assert!(!recovered.session().rest_paused);
        recovered.rest_tick();
        assert_eq!(recovered.session().rest_remaining_seconds, 28);
    }

    #[test]
    fn progress_counts_completed_volume() {
        let mut store = store(vec![exercise("a", 2, None), exercise("b", 1, None)]);
        store.update_set_input("a", 0, InputField::Weight, "50");
        store.update_set_input("a", 0, InputField::Reps, "10");
        store.complete_current_set(Utc::now());
        let progress = store.progress();
        assert_eq!(progress.completed_sets, 1);
        assert_eq!(progress.total_sets, 3);
        assert_eq!(progress.volume, 500.0);
    }
}
