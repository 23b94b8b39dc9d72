//! Tracking of in-flight command invocations.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};
use tokio::task::AbortHandle;
use tracing::debug;

use crate::commands::Invocation;

/// One command that is currently executing.
#[derive(Debug, Clone)]
pub struct InvocationRecord {
    pub sequence: u64,
    pub invocation: Invocation,
    pub started_at: DateTime<Local>,
    /// Handle of the task running the command, once attached.
    pub task: Option<AbortHandle>,
}

#[derive(Debug, Default)]
struct TrackerState {
    counter: u64,
    records: VecDeque<InvocationRecord>,
}

/// Registry of running commands for one extension instance.
#[derive(Debug, Clone, Default)]
pub struct TaskTracker {
    state: Arc<Mutex<TrackerState>>,
}

impl TaskTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `invocation` until the returned guard is dropped.
    pub fn submit(&self, invocation: Invocation) -> TaskGuard {
        let mut state = self.lock();
        state.counter += 1;
        let sequence = state.counter;
        state.records.push_back(InvocationRecord {
            sequence,
            invocation,
            started_at: Local::now(),
            task: None,
        });
        debug!("Tracking invocation #{}", sequence);

        TaskGuard {
            tracker: self.clone(),
            sequence,
        }
    }

    /// Associates a running task with a record.
    pub fn attach(&self, sequence: u64, task: AbortHandle) {
        if let Some(record) = self
            .lock()
            .records
            .iter_mut()
            .find(|r| r.sequence == sequence)
        {
            record.task = Some(task);
        }
    }

    /// Snapshot of everything currently running, oldest first.
    pub fn running(&self) -> Vec<InvocationRecord> {
        self.lock().records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Aborts the task behind `sequence`. Returns whether one was found.
    pub fn cancel(&self, sequence: u64) -> bool {
        let task = self
            .lock()
            .records
            .iter()
            .find(|r| r.sequence == sequence)
            .and_then(|r| r.task.clone());

        match task {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    /// Removes a record; a no-op if it is already gone.
    fn release(&self, sequence: u64) {
        let mut state = self.lock();
        if let Some(index) = state.records.iter().position(|r| r.sequence == sequence) {
            state.records.remove(index);
            debug!("Released invocation #{}", sequence);
        }
    }
}

/// Keeps an [`InvocationRecord`] registered for as long as it lives.
#[derive(Debug)]
pub struct TaskGuard {
    tracker: TaskTracker,
    sequence: u64,
}

impl TaskGuard {
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Removes the record now instead of on drop.
    pub fn release(&self) {
        self.tracker.release(self.sequence);
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.tracker.release(self.sequence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ChannelId, UserId};

    fn invocation(text: &str) -> Invocation {
        Invocation::new(UserId(1), ChannelId(2), text)
    }

    #[test]
    fn test_sequence_numbers_increase() {
        let tracker = TaskTracker::new();
        let first = tracker.submit(invocation("a"));
        let second = tracker.submit(invocation("b"));
        assert!(second.sequence() > first.sequence());
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let tracker = TaskTracker::new();
        {
            let _guard = tracker.submit(invocation("a"));
            assert_eq!(tracker.running().len(), 1);
        }
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_double_release_is_harmless() {
        let tracker = TaskTracker::new();
        let keep = tracker.submit(invocation("keep"));
        let guard = tracker.submit(invocation("gone"));
        guard.release();
        drop(guard);

        let running = tracker.running();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].sequence, keep.sequence());
    }

    #[tokio::test]
    async fn test_cancel_aborts_task_and_releases_record() {
        let tracker = TaskTracker::new();
        let guard = tracker.submit(invocation("slow"));
        let sequence = guard.sequence();

        let handle = tokio::spawn(async move {
            let _guard = guard;
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        });
        tracker.attach(sequence, handle.abort_handle());

        assert!(tracker.cancel(sequence));
        assert!(handle.await.unwrap_err().is_cancelled());
        assert!(tracker.is_empty());
        assert!(!tracker.cancel(sequence));
    }
}
