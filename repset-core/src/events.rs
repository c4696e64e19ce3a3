/// Progress notifications published by an active workout.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SetCompleted {
        exercise_id: String,
        set_index: usize,
    },
    /// A write could not reach the backend and is waiting in the offline queue.
    WriteQueued {
        pending: usize,
    },
    SetCountChanged {
        exercise_id: String,
        sets: usize,
    },
    ExerciseChanged {
        index: usize,
    },
    RestStarted {
        seconds: u32,
    },
    RestFinished,
    OfflineFlushed {
        written: usize,
        pending: usize,
    },
    /// The local recovery snapshot could not be written.
    AutosaveDegraded {
        reason: String,
    },
    WorkoutFinished {
        log_id: String,
    },
}
