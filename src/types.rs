//! Shared identifiers and the task model.

/// Unique identifier for a task in the queue.
pub type TaskId = u64;
/// Index of a worker thread within the pool.
pub type WorkerId = usize;

/// Immutable unit of work handed from the producer to whichever worker
/// dequeues it. Ownership moves into the queue on push and out on pop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    /// Stable task identifier for tracing and validation.
    pub id: TaskId,
    /// Human-readable label for trace output.
    pub label: String,
}

impl Task {
    /// Construct a new task with the provided id and label.
    pub fn new(id: TaskId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }
}
