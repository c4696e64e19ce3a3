//! Offline queue of writes that did not reach the backend.

use std::collections::VecDeque;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::backend::models::CompletedSetRow;
use crate::error::BackendError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingWrite {
    CompletedSet(CompletedSetRow),
    SetCount {
        workout_exercise_id: String,
        sets: u32,
    },
}

impl PendingWrite {
    fn set_count_target(&self) -> Option<&str> {
        match self {
            PendingWrite::SetCount {
                workout_exercise_id,
                ..
            } => Some(workout_exercise_id),
            PendingWrite::CompletedSet(_) => None,
        }
    }

    pub async fn send(&self, backend: &dyn Backend) -> Result<(), BackendError> {
        match self {
            PendingWrite::CompletedSet(row) => backend.insert_completed_set(row).await,
            PendingWrite::SetCount {
                workout_exercise_id,
                sets,
            } => backend.update_exercise_sets(workout_exercise_id, *sets).await,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub written: usize,
    pub failed: usize,
}

/// FIFO of pending writes. Serialized as part of the session snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfflineQueue {
    items: VecDeque<PendingWrite>,
}

impl OfflineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingWrite> {
        self.items.iter()
    }

    /// Whether a set count for this workout exercise is still waiting.
    pub fn has_set_count(&self, workout_exercise_id: &str) -> bool {
        self.items
            .iter()
            .any(|item| item.set_count_target() == Some(workout_exercise_id))
    }

    pub fn enqueue(&mut self, write: PendingWrite) {
        // Only the latest set count per exercise matters.
        if let Some(target) = write.set_count_target() {
            self.items.retain(|item| item.set_count_target() != Some(target));
        }
        debug!("OfflineQueue enqueue; pending={}", self.items.len() + 1);
        self.items.push_back(write);
    }

    /// Removes every item present right now, for sending outside a lock.
    pub fn take_batch(&mut self) -> Vec<PendingWrite> {
        self.items.drain(..).collect()
    }

    /// Puts failed items back ahead of anything enqueued since the batch was
    /// taken. A failed set count is dropped when a newer one for the same
    /// exercise arrived meanwhile.
    pub fn restore_front(&mut self, failed: Vec<PendingWrite>) {
        for item in failed.into_iter().rev() {
            if let Some(target) = item.set_count_target() {
                if self.has_set_count(target) {
                    debug!("Dropping superseded set count for {}", target);
                    continue;
                }
            }
            self.items.push_front(item);
        }
    }

    /// Sends every queued item, keeping the failures in their original order.
    pub async fn flush(&mut self, backend: &dyn Backend) -> FlushReport {
        let batch = self.take_batch();
        let (report, failed) = send_batch(backend, batch).await;
        self.restore_front(failed);
        report
    }
}

/// Sends a batch in order and returns the items that failed.
pub async fn send_batch(
    backend: &dyn Backend,
    batch: Vec<PendingWrite>,
) -> (FlushReport, Vec<PendingWrite>) {
    let mut report = FlushReport::default();
    let mut failed = Vec::new();

    for item in batch {
        match item.send(backend).await {
            Ok(()) => report.written += 1,
            Err(e) => {
                warn!("Offline write still failing: {}", e);
                report.failed += 1;
                failed.push(item);
            }
        }
    }

    if report.written > 0 || report.failed > 0 {
        info!(
            "Offline flush finished: written={} still_pending={}",
            report.written, report.failed
        );
    }
    (report, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::backend::memory::Operation;
    use chrono::Utc;

    fn set_write(key: &str, order: u32) -> PendingWrite {
        PendingWrite::CompletedSet(CompletedSetRow {
            idempotency_key: key.to_string(),
            workout_id: "w1".into(),
            log_id: Some("log-1".into()),
            exercise_id: "bench".into(),
            set_order: order,
            reps: 8,
            weight: 60.0,
            completed_at: Utc::now(),
            created_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn flush_empties_queue_when_all_succeed() {
        let backend = MemoryBackend::new();
        let mut queue = OfflineQueue::new();
        queue.enqueue(set_write("a", 1));
        queue.enqueue(set_write("b", 2));
        queue.enqueue(set_write("c", 3));

        let report = queue.flush(&backend).await;
        assert_eq!(report, FlushReport { written: 3, failed: 0 });
        assert!(queue.is_empty());
        assert_eq!(backend.completed_sets().len(), 3);
    }

    #[tokio::test]
    async fn failed_item_stays_queued_in_order() {
        let backend = MemoryBackend::new();
        backend.script(
            Operation::InsertSet,
            vec![None, Some(BackendError::Transient("offline".into())), None],
        );
        let mut queue = OfflineQueue::new();
        queue.enqueue(set_write("a", 1));
        queue.enqueue(set_write("b", 2));
        queue.enqueue(set_write("c", 3));

        let report = queue.flush(&backend).await;
        assert_eq!(report, FlushReport { written: 2, failed: 1 });
        assert_eq!(keys(&queue), vec!["b"]);
        assert_eq!(backend.completed_sets().len(), 2);
    }

    fn keys(queue: &OfflineQueue) -> Vec<String> {
        queue
            .iter()
            .map(|item| match item {
                PendingWrite::CompletedSet(row) => row.idempotency_key.clone(),
                PendingWrite::SetCount {
                    workout_exercise_id,
                    ..
                } => workout_exercise_id.clone(),
            })
            .collect()
    }

    #[test]
    fn items_added_during_flush_stay_behind_failures() {
        let mut queue = OfflineQueue::new();
        queue.enqueue(set_write("a", 1));
        queue.enqueue(set_write("b", 2));
        let batch = queue.take_batch();
        queue.enqueue(set_write("c", 3));
        queue.restore_front(batch);
        assert_eq!(keys(&queue), vec!["a", "b", "c"]);
    }

    #[test]
    fn failed_set_count_does_not_override_newer_one() {
        let mut queue = OfflineQueue::new();
        queue.enqueue(PendingWrite::SetCount {
            workout_exercise_id: "we-1".into(),
            sets: 4,
        });
        queue.enqueue(set_write("a", 1));
        let batch = queue.take_batch();
        queue.enqueue(PendingWrite::SetCount {
            workout_exercise_id: "we-1".into(),
            sets: 5,
        });
        queue.restore_front(batch);

        assert_eq!(keys(&queue), vec!["a", "we-1"]);
        assert!(queue.iter().any(|item| matches!(
            item,
            PendingWrite::SetCount { sets: 5, .. }
        )));
        assert!(queue.has_set_count("we-1"));
        assert!(!queue.has_set_count("we-2"));
    }

    #[test]
    fn newer_set_count_replaces_older_one() {
        let mut queue = OfflineQueue::new();
        queue.enqueue(PendingWrite::SetCount {
            workout_exercise_id: "we-1".into(),
            sets: 4,
        });
        queue.enqueue(set_write("a", 1));
        queue.enqueue(PendingWrite::SetCount {
            workout_exercise_id: "we-1".into(),
            sets: 5,
        });
        assert_eq!(queue.len(), 2);
        assert_eq!(
            queue.iter().last(),
            Some(&PendingWrite::SetCount {
                workout_exercise_id: "we-1".into(),
                sets: 5
            })
        );
    }
}
