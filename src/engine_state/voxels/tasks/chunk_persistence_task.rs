//! # Chunk Persistence Tasks
//!
//! Save and load a chunk's voxels on the chunk's worker. A save writes a
//! snapshot taken on the main thread; a load reads into a grid of its own,
//! which the main thread swaps into the chunk. The caller's
//! [`PersistenceJob`](crate::engine_state::voxels::persistence::PersistenceJob)
//! is resolved from the main thread once the result has been applied, so a
//! finished load is immediately ready for a mesh build.

use std::path::PathBuf;

use cgmath::Point3;
use log::{debug, error, info};

use crate::{
    core::MtResource,
    engine_state::{
        task_management::task::{Task, TaskItem, TaskLabel, TaskResult, WorkerContext},
        voxels::{
            chunk::{Chunk, ChunkBuildEvent, ChunkBuildState, ChunkSnapshot},
            grid::VoxelGrid,
            persistence::{load_record, save_record, ChunkRecord, PersistenceHandle},
        },
        CommitContext,
    },
    error::{EngineError, EngineResult},
};

/// Writes a chunk's voxels to disk.
pub struct ChunkSaveTask {
    position: Point3<i32>,
    snapshot: ChunkSnapshot,
    path: PathBuf,
    handle: PersistenceHandle,
}

impl ChunkSaveTask {
    pub fn new(
        position: Point3<i32>,
        snapshot: ChunkSnapshot,
        path: PathBuf,
        handle: PersistenceHandle,
    ) -> Self {
        Self {
            position,
            snapshot,
            path,
            handle,
        }
    }
}

impl Task for ChunkSaveTask {
    fn label(&self) -> TaskLabel {
        TaskLabel::for_chunk("save chunk", self.position)
    }

    fn process(self: Box<Self>, _context: &mut WorkerContext) -> EngineResult<Box<dyn TaskResult>> {
        let task = *self;
        let record = ChunkRecord::from_grid(task.position, &task.snapshot.grid);
        let outcome = save_record(&record, &task.path, &task.handle.progress);
        match &outcome {
            Ok(()) => info!("saved chunk {:?} to {}", task.position, task.path.display()),
            Err(error) => error!(
                "saving chunk {:?} to {} failed: {}",
                task.position,
                task.path.display(),
                error
            ),
        }

        Ok(Box::new(ChunkSaveTaskResult {
            outcome,
            handle: task.handle,
        }))
    }
}

/// Resolves the caller's job once the save finished.
pub struct ChunkSaveTaskResult {
    outcome: EngineResult<()>,
    handle: PersistenceHandle,
}

impl TaskResult for ChunkSaveTaskResult {
    fn handle_result(
        self: Box<Self>,
        _context: &mut CommitContext<'_>,
    ) -> EngineResult<Vec<TaskItem>> {
        let result = *self;
        result.handle.finish(result.outcome);
        Ok(Vec::new())
    }
}

/// Reads a chunk's voxels from disk for a chunk in the `Loading` state.
pub struct ChunkLoadTask {
    chunk: MtResource<Chunk>,
    position: Point3<i32>,
    revision: u64,
    path: PathBuf,
    handle: PersistenceHandle,
}

impl ChunkLoadTask {
    pub fn new(
        chunk: MtResource<Chunk>,
        position: Point3<i32>,
        revision: u64,
        path: PathBuf,
        handle: PersistenceHandle,
    ) -> Self {
        Self {
            chunk,
            position,
            revision,
            path,
            handle,
        }
    }
}

impl Task for ChunkLoadTask {
    fn label(&self) -> TaskLabel {
        TaskLabel::for_build(
            "load chunk",
            self.position,
            ChunkBuildState::Loading,
            self.revision,
        )
    }

    fn process(self: Box<Self>, context: &mut WorkerContext) -> EngineResult<Box<dyn TaskResult>> {
        let task = *self;
        let config = &context.resources.config;
        let outcome = load_record(&task.path).and_then(|record| {
            let expected = [task.position.x, task.position.y, task.position.z];
            if record.position != expected {
                return Err(EngineError::InvalidRecord(format!(
                    "record is for chunk {:?}, not {:?}",
                    record.position, expected
                )));
            }
            let mut grid = VoxelGrid::new(config.chunk_dimension, config.padding);
            record.apply_to(&mut grid, &context.resources.registry, &task.handle.progress)?;
            Ok(grid)
        });
        if let Err(error) = &outcome {
            error!(
                "loading chunk {:?} from {} failed: {}",
                task.position,
                task.path.display(),
                error
            );
        }

        Ok(Box::new(ChunkLoadTaskResult {
            chunk: task.chunk,
            position: task.position,
            outcome,
            handle: task.handle,
        }))
    }
}

/// The voxels read by a load, or why they could not be read.
pub struct ChunkLoadTaskResult {
    chunk: MtResource<Chunk>,
    position: Point3<i32>,
    outcome: EngineResult<VoxelGrid>,
    handle: PersistenceHandle,
}

fn is_current(
    chunk: &MtResource<Chunk>,
    position: Point3<i32>,
    context: &CommitContext<'_>,
) -> bool {
    context
        .world
        .get_chunk_at(position)
        .is_some_and(|current| current.ptr_eq(chunk))
}

/// Swaps loaded voxels into the chunk and moves it on to `TerrainGenerated`.
fn apply_loaded(
    chunk: &MtResource<Chunk>,
    position: Point3<i32>,
    grid: VoxelGrid,
    context: &mut CommitContext<'_>,
) -> EngineResult<()> {
    if !is_current(chunk, position, context) {
        return Err(EngineError::ChunkNotLoaded(position));
    }

    {
        let mut chunk = chunk.get_mut();
        chunk.state().transition(ChunkBuildEvent::TerrainGenerated)?;
        chunk.grid = grid;
        chunk.apply(ChunkBuildEvent::TerrainGenerated)?;
    }
    context.world.invalidate_neighbours(position)?;
    Ok(())
}

impl TaskResult for ChunkLoadTaskResult {
    /// Applies the load and resolves the caller's job.
    ///
    /// # Errors
    /// [`EngineError::TaskFailed`] when the file could not be read, after the
    /// job has received the underlying error. The chunk stays `Loading` so
    /// the scheduler's failure handling returns it to `Idle`.
    fn handle_result(
        self: Box<Self>,
        context: &mut CommitContext<'_>,
    ) -> EngineResult<Vec<TaskItem>> {
        let ChunkLoadTaskResult {
            chunk,
            position,
            outcome,
            handle,
        } = *self;

        match outcome {
            Ok(grid) => {
                let applied = apply_loaded(&chunk, position, grid, context);
                match &applied {
                    Ok(()) => info!("loaded chunk {:?}", position),
                    Err(error) => debug!("load of chunk {:?} was not applied: {}", position, error),
                }
                handle.finish(applied);
                Ok(Vec::new())
            }
            Err(error) => {
                let reason = error.to_string();
                handle.finish(Err(error));
                if !is_current(&chunk, position, context) {
                    return Ok(Vec::new());
                }
                Err(EngineError::TaskFailed {
                    task: format!("load chunk {:?}", position),
                    reason,
                })
            }
        }
    }
}
