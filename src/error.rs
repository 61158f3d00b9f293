//! # Engine Errors
//!
//! A single error type shared by every subsystem of the engine. Pool misuse,
//! pipeline misuse and I/O failures all surface as an [`EngineError`] so that
//! callers can propagate them with `?`.

use cgmath::Point3;

use crate::engine_state::voxels::chunk::{ChunkBuildEvent, ChunkBuildState};

/// Result alias used throughout the crate.
pub type EngineResult<T> = Result<T, EngineError>;

/// Every failure the engine can report.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An array was pushed whose length does not belong to any bucket of the pool.
    #[error("array of length {length} does not belong to a known pool bucket")]
    UnknownArrayLength { length: usize },

    /// An item was pushed to a pool that has nothing outstanding.
    #[error("push to pool `{pool}` without a matching pop")]
    NothingBorrowed { pool: &'static str },

    /// A mesh handed to the batcher can never fit in a single geometry buffer.
    #[error("mesh with {vertices} vertices exceeds the per-buffer limit of {limit}")]
    MeshTooLarge { vertices: usize, limit: usize },

    /// A chunk was asked to move through its build pipeline in an illegal order.
    #[error("chunk cannot handle {event:?} while {state:?}")]
    InvalidTransition {
        state: ChunkBuildState,
        event: ChunkBuildEvent,
    },

    /// The chunk is not present in the world.
    #[error("no chunk loaded at {0:?}")]
    ChunkNotLoaded(Point3<i32>),

    /// Configuration could not be parsed or failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem failure while saving or loading.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted chunk record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// A task returned an error or panicked inside its error boundary.
    #[error("task `{task}` failed: {reason}")]
    TaskFailed { task: String, reason: String },

    /// Work was submitted after the scheduler was shut down.
    #[error("the task scheduler has been stopped")]
    SchedulerStopped,

    /// Outstanding tasks did not finish in time.
    #[error("timed out with {in_flight} tasks still in flight")]
    Timeout { in_flight: usize },

    /// A persisted chunk does not fit the grid it is loaded into.
    #[error("invalid chunk record: {0}")]
    InvalidRecord(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(error: serde_json::Error) -> Self {
        EngineError::Config(error.to_string())
    }
}
