//! Thread-safe FIFO work queue with a shutdown-aware blocking pop.
//!
//! The queue, the shutdown flag, and the condition variable form a single
//! exclusion domain: every read or write of the pending tasks or the flag
//! happens under one mutex, and the condvar is tied to that same mutex.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::types::Task;

/// Unbounded FIFO queue shared by one producer and many workers.
///
/// Workers block in [`WorkQueue::pop_blocking_or_shutdown`] until either a
/// task arrives or the producer calls [`WorkQueue::shutdown`].
pub struct WorkQueue {
    state: Mutex<QueueState>,
    /// Signalled whenever "queue non-empty OR shutdown" may have become true.
    available: Condvar,
}

struct QueueState {
    pending: VecDeque<Task>,
    /// Monotonic: set once by the producer, never cleared.
    shutdown: bool,
}

impl WorkQueue {
    /// Create an empty, open queue.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Append a task and wake one waiting worker.
    ///
    /// Only one worker needs to act on a single new task, so this signals
    /// rather than broadcasts. After shutdown the queue rejects the task and
    /// hands it back to the caller.
    pub fn push(&self, task: Task) -> Result<(), Task> {
        let mut guard = self.state.lock().expect("work queue mutex poisoned");
        if guard.shutdown {
            return Err(task);
        }
        guard.pending.push_back(task);
        self.available.notify_one();
        Ok(())
    }

    /// Remove and return the head without blocking.
    pub fn try_pop(&self) -> Option<Task> {
        let mut guard = self.state.lock().expect("work queue mutex poisoned");
        guard.pending.pop_front()
    }

    /// Block until a task can be claimed or the queue is drained for good.
    ///
    /// Returns `None` only when shutdown is set AND the queue is empty; a
    /// worker receiving `None` can exit without ever re-checking. The wait
    /// loop re-evaluates the predicate on every wakeup, so spurious wakeups
    /// and already-drained queues are both harmless.
    pub fn pop_blocking_or_shutdown(&self) -> Option<Task> {
        let mut guard = self.state.lock().expect("work queue mutex poisoned");
        loop {
            if let Some(task) = guard.pending.pop_front() {
                return Some(task);
            }
            if guard.shutdown {
                return None;
            }
            // wait atomically releases the lock while blocking and holds it
            // again before returning.
            guard = self.available.wait(guard).expect("condvar wait failed");
        }
    }

    /// Mark that no further tasks will ever be pushed and wake all waiters.
    ///
    /// Every blocked worker must re-check the predicate and possibly exit,
    /// hence the broadcast. Idempotent.
    pub fn shutdown(&self) {
        let mut guard = self.state.lock().expect("work queue mutex poisoned");
        guard.shutdown = true;
        self.available.notify_all();
    }

    /// Current number of pending tasks.
    pub fn len(&self) -> usize {
        let guard = self.state.lock().expect("work queue mutex poisoned");
        guard.pending.len()
    }

    /// True when no tasks are pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::mpsc;
    use std::sync::{Arc, Barrier, Mutex};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fifo_order_is_preserved() {
        let queue = WorkQueue::new();
        for id in 1..=5 {
            queue.push(Task::new(id, format!("t-{id}"))).expect("open");
        }
        for id in 1..=5 {
            assert_eq!(queue.try_pop().map(|t| t.id), Some(id));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn each_task_is_claimed_exactly_once() {
        let queue = Arc::new(WorkQueue::new());
        let total = 200u64;
        for id in 1..=total {
            queue.push(Task::new(id, format!("t-{id}"))).expect("open");
        }
        queue.shutdown();

        let consumers = 4;
        let barrier = Arc::new(Barrier::new(consumers));
        let seen: Arc<Mutex<HashSet<u64>>> = Arc::new(Mutex::new(HashSet::new()));

        let mut handles = Vec::new();
        for _ in 0..consumers {
            let queue = Arc::clone(&queue);
            let barrier = Arc::clone(&barrier);
            let seen = Arc::clone(&seen);
            handles.push(thread::spawn(move || {
                barrier.wait();
                while let Some(task) = queue.pop_blocking_or_shutdown() {
                    let mut guard = seen.lock().expect("seen mutex poisoned");
                    // Each task id must be observed at most once.
                    assert!(guard.insert(task.id));
                }
            }));
        }

        for handle in handles {
            handle.join().expect("consumer thread panicked");
        }

        let guard = seen.lock().expect("seen mutex poisoned");
        assert_eq!(guard.len(), total as usize);
        assert!(queue.is_empty());
    }

    #[test]
    fn blocked_pop_wakes_on_push() {
        let queue = Arc::new(WorkQueue::new());
        let (tx, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        let queue_clone = Arc::clone(&queue);
        let handle = thread::spawn(move || {
            ready_tx.send(()).expect("send ready");
            let task = queue_clone
                .pop_blocking_or_shutdown()
                .expect("queue shut down before push");
            tx.send(task.id).expect("send task id");
        });

        ready_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("ready");
        queue.push(Task::new(99, "wake")).expect("open");

        let received = rx
            .recv_timeout(Duration::from_secs(1))
            .expect("receive task id");
        assert_eq!(received, 99);
        handle.join().expect("blocking pop thread panicked");
    }

    #[test]
    fn shutdown_unblocks_waiting_consumers() {
        let queue = Arc::new(WorkQueue::new());
        let (ready_tx, ready_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let queue_clone = Arc::clone(&queue);
        let handle = thread::spawn(move || {
            ready_tx.send(()).expect("ready");
            let popped = queue_clone.pop_blocking_or_shutdown();
            done_tx.send(popped.is_none()).expect("done");
        });

        ready_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("ready");
        queue.shutdown();

        let exited_empty = done_rx
            .recv_timeout(Duration::from_secs(1))
            .expect("done recv");
        assert!(exited_empty);
        handle.join().expect("consumer thread panicked");
    }

    #[test]
    fn pending_tasks_are_drained_before_shutdown_applies() {
        // Shutdown with tasks still queued: pops keep returning tasks until
        // the queue is empty, then report shutdown.
        let queue = WorkQueue::new();
        queue.push(Task::new(1, "a")).expect("open");
        queue.push(Task::new(2, "b")).expect("open");
        queue.shutdown();

        assert_eq!(queue.pop_blocking_or_shutdown().map(|t| t.id), Some(1));
        assert_eq!(queue.pop_blocking_or_shutdown().map(|t| t.id), Some(2));
        assert!(queue.pop_blocking_or_shutdown().is_none());
    }

    #[test]
    fn push_after_shutdown_returns_task() {
        let queue = WorkQueue::new();
        queue.shutdown();
        let rejected = queue.push(Task::new(7, "late"));
        assert_eq!(rejected.err().map(|t| t.id), Some(7));
        assert!(queue.is_empty());
    }
}
