//! # Task Definitions
//!
//! A [`Task`] runs on a worker thread and produces a [`TaskResult`]; the result
//! is brought back to the main thread, where it applies its effects to the
//! world and may schedule follow-up work.

use std::{fmt, sync::Arc};

use cgmath::Point3;

use super::WorkerId;
use crate::{
    engine_state::{
        context::{EngineResources, ScratchPools},
        voxels::chunk::ChunkBuildState,
        CommitContext,
    },
    error::{EngineError, EngineResult},
};

/// Which queue a task goes into.
///
/// Every priority task committed to a worker runs before the worker picks up
/// another ordinary one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskPriority {
    High,
    Ordinary,
}

/// The chunk build a task belongs to: the state it moved the chunk into and
/// the chunk revision at that moment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkBuild {
    pub state: ChunkBuildState,
    pub revision: u64,
}

/// What a task is, for logs and failure reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskLabel {
    pub name: &'static str,
    /// The chunk the task works on, if any.
    pub chunk: Option<Point3<i32>>,
    /// Set for tasks whose failure should fail the chunk's build.
    pub build: Option<ChunkBuild>,
}

impl TaskLabel {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            chunk: None,
            build: None,
        }
    }

    pub fn for_chunk(name: &'static str, chunk: Point3<i32>) -> Self {
        Self {
            name,
            chunk: Some(chunk),
            build: None,
        }
    }

    /// Labels a task that drives the chunk's build pipeline.
    ///
    /// # Arguments
    /// * `chunk` - The chunk's position
    /// * `state` - The state the chunk is in while the task runs
    /// * `revision` - The chunk's revision when the task was created
    pub fn for_build(
        name: &'static str,
        chunk: Point3<i32>,
        state: ChunkBuildState,
        revision: u64,
    ) -> Self {
        Self {
            name,
            chunk: Some(chunk),
            build: Some(ChunkBuild { state, revision }),
        }
    }
}

impl fmt::Display for TaskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.chunk {
            Some(chunk) => write!(f, "{} ({}, {}, {})", self.name, chunk.x, chunk.y, chunk.z),
            None => f.write_str(self.name),
        }
    }
}

/// Everything a task can reach while it runs on a worker.
pub struct WorkerContext {
    pub worker_id: WorkerId,
    pub resources: Arc<EngineResources>,
    pub scratch: ScratchPools,
}

impl WorkerContext {
    pub fn new(worker_id: WorkerId, resources: Arc<EngineResources>) -> Self {
        let scratch = ScratchPools::new(&resources.config);
        Self {
            worker_id,
            resources,
            scratch,
        }
    }
}

/// A unit of background work.
pub trait Task: Send {
    /// Identifies the task in logs and failure reports.
    fn label(&self) -> TaskLabel;

    /// Runs the task on a worker thread.
    ///
    /// # Arguments
    /// * `context` - The executing worker's resources and scratch memory
    ///
    /// # Returns
    /// A result to be handled on the main thread, or the reason the task failed
    fn process(self: Box<Self>, context: &mut WorkerContext) -> EngineResult<Box<dyn TaskResult>>;
}

/// The output of a [`Task`], applied on the main thread.
pub trait TaskResult: Send {
    /// Applies the result and returns any follow-up tasks.
    ///
    /// # Arguments
    /// * `context` - Main-thread state the result may modify
    ///
    /// # Returns
    /// Tasks to enqueue for the next commit
    fn handle_result(
        self: Box<Self>,
        context: &mut CommitContext<'_>,
    ) -> EngineResult<Vec<TaskItem>>;
}

/// A task together with its scheduling request.
pub struct TaskItem {
    pub task: Box<dyn Task>,
    pub priority: TaskPriority,
    /// Worker that must run the task; round robin when `None`.
    pub affinity: Option<WorkerId>,
}

impl TaskItem {
    pub fn new(task: impl Task + 'static, priority: TaskPriority) -> Self {
        Self {
            task: Box::new(task),
            priority,
            affinity: None,
        }
    }

    /// Pins the task to `worker`.
    pub fn on_worker(mut self, worker: WorkerId) -> Self {
        self.affinity = Some(worker);
        self
    }
}

/// What a worker reports back after running a task.
pub enum TaskCompletion {
    Completed {
        worker: WorkerId,
        label: TaskLabel,
        result: Box<dyn TaskResult>,
    },
    Failed {
        worker: WorkerId,
        label: TaskLabel,
        error: EngineError,
    },
}

impl TaskCompletion {
    pub fn label(&self) -> &TaskLabel {
        match self {
            TaskCompletion::Completed { label, .. } | TaskCompletion::Failed { label, .. } => label,
        }
    }

    pub fn worker(&self) -> WorkerId {
        match self {
            TaskCompletion::Completed { worker, .. } | TaskCompletion::Failed { worker, .. } => {
                *worker
            }
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TaskCompletion::Failed { .. })
    }
}

impl fmt::Debug for TaskCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskCompletion::Completed { worker, label, .. } => f
                .debug_struct("Completed")
                .field("worker", worker)
                .field("label", label)
                .finish(),
            TaskCompletion::Failed { worker, label, error } => f
                .debug_struct("Failed")
                .field("worker", worker)
                .field("label", label)
                .field("error", error)
                .finish(),
        }
    }
}
