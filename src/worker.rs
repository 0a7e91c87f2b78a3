//! Fixed pool of worker threads draining the shared work queue.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::info;

use crate::error::PoolError;
use crate::task_queue::WorkQueue;
use crate::types::{TaskId, WorkerId};

/// Observable lifecycle state of a worker, tracked in an atomic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Blocked on the queue's wait condition.
    Waiting = 0,
    /// Processing a claimed task, queue lock released.
    Running = 1,
    /// Loop finished; reached exactly once per worker.
    Exited = 2,
}

impl WorkerStatus {
    fn from_usize(raw: usize) -> WorkerStatus {
        match raw {
            0 => WorkerStatus::Waiting,
            1 => WorkerStatus::Running,
            _ => WorkerStatus::Exited,
        }
    }
}

/// Knobs for worker behavior.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Simulated per-task processing time, spent outside the queue lock.
    pub work: Duration,
    /// Record every claimed task id for validation.
    pub record_claims: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work: Duration::from_millis(5),
            record_claims: false,
        }
    }
}

/// Accounting returned once every worker has been joined.
#[derive(Debug)]
pub struct PoolReport {
    /// Tasks claimed by each worker, indexed by worker id.
    pub claimed_per_worker: Vec<usize>,
    /// Claimed task ids, in claim order (empty unless recording was on).
    pub claims: Vec<TaskId>,
    /// Final state of each worker; all `Exited` after a clean join.
    pub statuses: Vec<WorkerStatus>,
}

impl PoolReport {
    /// Total tasks claimed across the pool.
    pub fn total_claimed(&self) -> usize {
        self.claimed_per_worker.iter().sum()
    }
}

/// Handles and shared counters for a running pool.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    claimed: Arc<Vec<AtomicUsize>>,
    statuses: Arc<Vec<AtomicUsize>>,
    claims: Arc<Mutex<Vec<TaskId>>>,
}

impl WorkerPool {
    /// Spawn `workers` named threads consuming from `queue`.
    ///
    /// A spawn failure is terminal: the queue is shut down so that any
    /// already-running workers drain out, and the error is returned.
    pub fn spawn(
        workers: usize,
        queue: Arc<WorkQueue>,
        config: WorkerConfig,
    ) -> Result<Self, PoolError> {
        let claimed = Arc::new(
            (0..workers).map(|_| AtomicUsize::new(0)).collect::<Vec<_>>(),
        );
        let statuses = Arc::new(
            (0..workers)
                .map(|_| AtomicUsize::new(WorkerStatus::Waiting as usize))
                .collect::<Vec<_>>(),
        );
        let claims = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let name = format!("worker-{worker_id}");
            let worker_queue = Arc::clone(&queue);
            let claimed = Arc::clone(&claimed);
            let statuses = Arc::clone(&statuses);
            let claims = config.record_claims.then(|| Arc::clone(&claims));
            let work = config.work;
            let thread_name = name.clone();
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || {
                    worker_loop(
                        worker_id,
                        &thread_name,
                        &worker_queue,
                        &claimed,
                        &statuses,
                        claims.as_deref(),
                        work,
                    );
                })
                .map_err(|source| {
                    queue.shutdown();
                    PoolError::Spawn { name, source }
                })?;
            handles.push(handle);
        }

        Ok(Self {
            handles,
            claimed,
            statuses,
            claims,
        })
    }

    /// Join every worker and collect the final accounting.
    pub fn join(self) -> Result<PoolReport, PoolError> {
        for (worker_id, handle) in self.handles.into_iter().enumerate() {
            handle.join().map_err(|_| PoolError::WorkerPanicked {
                name: format!("worker-{worker_id}"),
            })?;
        }
        let claimed_per_worker = self
            .claimed
            .iter()
            .map(|count| count.load(Ordering::SeqCst))
            .collect();
        let statuses = self
            .statuses
            .iter()
            .map(|status| WorkerStatus::from_usize(status.load(Ordering::SeqCst)))
            .collect();
        let claims = self
            .claims
            .lock()
            .expect("claims mutex poisoned")
            .clone();
        Ok(PoolReport {
            claimed_per_worker,
            claims,
            statuses,
        })
    }
}

/// Worker state machine: wait for work or shutdown, claim, process with the
/// lock released, exit once shutdown is set and the queue is drained.
fn worker_loop(
    worker_id: WorkerId,
    name: &str,
    queue: &WorkQueue,
    claimed: &[AtomicUsize],
    statuses: &[AtomicUsize],
    claims: Option<&Mutex<Vec<TaskId>>>,
    work: Duration,
) {
    loop {
        statuses[worker_id].store(WorkerStatus::Waiting as usize, Ordering::SeqCst);
        // Returns None only when shutdown is set and the queue is empty.
        let Some(task) = queue.pop_blocking_or_shutdown() else {
            break;
        };
        statuses[worker_id].store(WorkerStatus::Running as usize, Ordering::SeqCst);
        claimed[worker_id].fetch_add(1, Ordering::SeqCst);
        info!("{name} claimed task {}", task.id);
        if let Some(claims) = claims {
            claims.lock().expect("claims mutex poisoned").push(task.id);
        }
        // Processing never holds the queue lock.
        if !work.is_zero() {
            thread::sleep(work);
        }
    }
    statuses[worker_id].store(WorkerStatus::Exited as usize, Ordering::SeqCst);
    info!("{name} exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use crate::types::Task;

    fn instant_config() -> WorkerConfig {
        WorkerConfig {
            work: Duration::ZERO,
            record_claims: true,
        }
    }

    #[test]
    fn pool_drains_all_tasks_exactly_once() {
        let queue = Arc::new(WorkQueue::new());
        let total = 100u64;
        for id in 1..=total {
            queue.push(Task::new(id, format!("t-{id}"))).expect("open");
        }

        let pool = WorkerPool::spawn(4, Arc::clone(&queue), instant_config())
            .expect("spawn pool");
        queue.shutdown();
        let report = pool.join().expect("join pool");

        assert_eq!(report.total_claimed(), total as usize);
        let unique: HashSet<_> = report.claims.iter().copied().collect();
        assert_eq!(unique.len(), total as usize);
        assert!(queue.is_empty());
        assert!(report
            .statuses
            .iter()
            .all(|&status| status == WorkerStatus::Exited));
    }

    #[test]
    fn zero_tasks_pool_exits_on_shutdown() {
        let queue = Arc::new(WorkQueue::new());
        let pool = WorkerPool::spawn(1, Arc::clone(&queue), instant_config())
            .expect("spawn pool");
        queue.shutdown();
        let report = pool.join().expect("join pool");

        assert_eq!(report.total_claimed(), 0);
        assert!(report.claims.is_empty());
        assert_eq!(report.statuses, vec![WorkerStatus::Exited]);
    }

    #[test]
    fn tasks_pushed_after_spawn_are_claimed() {
        let queue = Arc::new(WorkQueue::new());
        let pool = WorkerPool::spawn(3, Arc::clone(&queue), instant_config())
            .expect("spawn pool");

        // Workers are already blocked waiting; pushes must wake them.
        for id in 1..=10 {
            queue.push(Task::new(id, format!("t-{id}"))).expect("open");
        }
        queue.shutdown();
        let report = pool.join().expect("join pool");

        assert_eq!(report.total_claimed(), 10);
        let unique: HashSet<_> = report.claims.iter().copied().collect();
        assert_eq!(unique.len(), 10);
    }

    #[test]
    fn claims_are_not_recorded_when_disabled() {
        let queue = Arc::new(WorkQueue::new());
        queue.push(Task::new(1, "only")).expect("open");
        let config = WorkerConfig {
            work: Duration::ZERO,
            record_claims: false,
        };
        let pool = WorkerPool::spawn(1, Arc::clone(&queue), config).expect("spawn pool");
        queue.shutdown();
        let report = pool.join().expect("join pool");

        assert_eq!(report.total_claimed(), 1);
        assert!(report.claims.is_empty());
    }
}
