//! Terminal error conditions for pool setup and teardown.

use std::io;

use thiserror::Error;

use crate::types::TaskId;

/// Errors surfaced by the producer/orchestrator. All are terminal: the run
/// is abandoned at the point of detection.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to spawn {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("{name} panicked during the run")]
    WorkerPanicked { name: String },
    #[error("queue rejected task {id}: shutdown already requested")]
    QueueClosed { id: TaskId },
}
