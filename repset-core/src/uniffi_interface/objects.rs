use std::time::Duration;

use crate::config::BackendConfig;
use crate::events::SessionEvent;
use crate::session::{InputField, SessionExercise, SessionProgress, WorkoutSession};
use crate::timer::RestTimerState;

#[derive(Debug, Clone, uniffi::Record)]
pub struct BackendSettings {
    pub base_url: String,
    pub api_key: String,
    pub access_token: Option<String>,
    pub timeout_seconds: u64,
}

impl From<BackendSettings> for BackendConfig {
    fn from(s: BackendSettings) -> Self {
        let mut config = BackendConfig::new(s.base_url, s.api_key).with_access_token(s.access_token);
        if s.timeout_seconds > 0 {
            config.timeout = Duration::from_secs(s.timeout_seconds);
        }
        config
    }
}

#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum InputFieldKind {
    Weight,
    Reps,
}

impl From<InputFieldKind> for InputField {
    fn from(kind: InputFieldKind) -> Self {
        match kind {
            InputFieldKind::Weight => InputField::Weight,
            InputFieldKind::Reps => InputField::Reps,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct SetInputView {
    pub weight: String,
    pub reps: String,
    pub completed: bool,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct ExerciseView {
    pub workout_exercise_id: String,
    pub exercise_id: String,
    pub name: String,
    pub rest_seconds: Option<u32>,
    pub sets: Vec<SetInputView>,
}

impl From<&SessionExercise> for ExerciseView {
    fn from(e: &SessionExercise) -> Self {
        ExerciseView {
            workout_exercise_id: e.workout_exercise_id.clone(),
            exercise_id: e.exercise_id.clone(),
            name: e.name.clone(),
            rest_seconds: e.rest_seconds,
            sets: e
                .inputs
                .iter()
                .zip(&e.completed)
                .map(|(input, done)| SetInputView {
                    weight: input.weight.clone(),
                    reps: input.reps.clone(),
                    completed: *done,
                })
                .collect(),
        }
    }
}

/// Everything the workout screen renders in one read.
#[derive(Debug, Clone, uniffi::Record)]
pub struct SessionView {
    pub workout_id: String,
    pub log_id: Option<String>,
    pub exercises: Vec<ExerciseView>,
    pub current_exercise_index: u32,
    pub elapsed_seconds: u64,
    pub is_paused: bool,
    pub is_resting: bool,
    pub rest_remaining_seconds: u32,
    pub rest_total_seconds: u32,
    pub rest_paused: bool,
    pub rest_progress: f64,
    pub pending_writes: u32,
}

impl SessionView {
    pub fn new(session: &WorkoutSession, rest: RestTimerState, rest_progress: f64) -> Self {
        SessionView {
            workout_id: session.workout_id.clone(),
            log_id: session.log_id.clone(),
            exercises: session.exercises.iter().map(ExerciseView::from).collect(),
            current_exercise_index: session.current_exercise_index as u32,
            elapsed_seconds: session.elapsed_seconds,
            is_paused: session.is_paused,
            is_resting: session.is_resting,
            rest_remaining_seconds: rest.remaining_seconds,
            rest_total_seconds: rest.total_seconds,
            rest_paused: rest.is_paused,
            rest_progress,
            pending_writes: session.offline_queue.len() as u32,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct ProgressView {
    pub completed_sets: u32,
    pub total_sets: u32,
    pub volume: f64,
}

impl From<SessionProgress> for ProgressView {
    fn from(p: SessionProgress) -> Self {
        ProgressView {
            completed_sets: p.completed_sets as u32,
            total_sets: p.total_sets as u32,
            volume: p.volume,
        }
    }
}

#[derive(Debug, Clone, uniffi::Enum)]
pub enum WorkoutEvent {
    SetCompleted { exercise_id: String, set_index: u32 },
    WriteQueued { pending: u32 },
    SetCountChanged { exercise_id: String, sets: u32 },
    ExerciseChanged { index: u32 },
    RestStarted { seconds: u32 },
    RestFinished,
    OfflineFlushed { written: u32, pending: u32 },
    AutosaveDegraded { reason: String },
    WorkoutFinished { log_id: String },
}

impl From<SessionEvent> for WorkoutEvent {
    fn from(e: SessionEvent) -> Self {
        match e {
            SessionEvent::SetCompleted {
                exercise_id,
                set_index,
            } => WorkoutEvent::SetCompleted {
                exercise_id,
                set_index: set_index as u32,
            },
            SessionEvent::WriteQueued { pending } => WorkoutEvent::WriteQueued {
                pending: pending as u32,
            },
            SessionEvent::SetCountChanged { exercise_id, sets } => WorkoutEvent::SetCountChanged {
                exercise_id,
                sets: sets as u32,
            },
            SessionEvent::ExerciseChanged { index } => WorkoutEvent::ExerciseChanged {
                index: index as u32,
            },
            SessionEvent::RestStarted { seconds } => WorkoutEvent::RestStarted { seconds },
            SessionEvent::RestFinished => WorkoutEvent::RestFinished,
            SessionEvent::OfflineFlushed { written, pending } => WorkoutEvent::OfflineFlushed {
                written: written as u32,
                pending: pending as u32,
            },
            SessionEvent::AutosaveDegraded { reason } => WorkoutEvent::AutosaveDegraded { reason },
            SessionEvent::WorkoutFinished { log_id } => WorkoutEvent::WorkoutFinished { log_id },
        }
    }
}
