//! # Chunk Generation Task
//!
//! Runs a [`TerrainGenerator`] on the chunk's worker. The generator fills a
//! grid owned by the task; the chunk itself is only touched on the main
//! thread, where the grid is swapped in and the chunk becomes meshable.
//! Neighbours meshed earlier are invalidated because their padding mirrored
//! empty space.

use std::sync::Arc;

use cgmath::Point3;
use log::debug;
use web_time::Instant;

use crate::{
    core::MtResource,
    engine_state::{
        task_management::task::{Task, TaskItem, TaskLabel, TaskResult, WorkerContext},
        voxels::{
            chunk::{Chunk, ChunkBuildEvent, ChunkBuildState},
            grid::VoxelGrid,
            terrain::TerrainGenerator,
        },
        CommitContext,
    },
    error::EngineResult,
};

/// A task that generates chunk data asynchronously.
pub struct ChunkGenerationTask {
    /// The chunk to fill, in the `Loading` state
    chunk: MtResource<Chunk>,
    /// The position of the chunk to generate (in chunk coordinates)
    position: Point3<i32>,
    revision: u64,
    generator: Arc<dyn TerrainGenerator>,
}

impl ChunkGenerationTask {
    /// Creates a new chunk generation task.
    ///
    /// # Arguments
    /// * `chunk` - The chunk to fill
    /// * `position` - The chunk coordinates of the chunk
    /// * `revision` - The chunk's revision when loading started
    /// * `generator` - The terrain collaborator
    ///
    /// # Returns
    /// A new `ChunkGenerationTask` instance
    pub fn new(
        chunk: MtResource<Chunk>,
        position: Point3<i32>,
        revision: u64,
        generator: Arc<dyn TerrainGenerator>,
    ) -> Self {
        ChunkGenerationTask {
            chunk,
            position,
            revision,
            generator,
        }
    }
}

impl Task for ChunkGenerationTask {
    fn label(&self) -> TaskLabel {
        TaskLabel::for_build(
            "generate terrain",
            self.position,
            ChunkBuildState::Loading,
            self.revision,
        )
    }

    fn process(self: Box<Self>, context: &mut WorkerContext) -> EngineResult<Box<dyn TaskResult>> {
        let start = Instant::now();
        let config = &context.resources.config;
        let mut grid = VoxelGrid::new(config.chunk_dimension, config.padding);
        self.generator
            .generate(self.position, &mut grid, &context.resources.registry);
        debug!(
            "generated chunk {:?} with {} blocks in {:?}",
            self.position,
            grid.count_non_air(),
            start.elapsed()
        );

        Ok(Box::new(ChunkGenerationTaskResult {
            chunk: self.chunk,
            position: self.position,
            grid,
        }))
    }
}

/// The result of a chunk generation task.
pub struct ChunkGenerationTaskResult {
    chunk: MtResource<Chunk>,
    position: Point3<i32>,
    grid: VoxelGrid,
}

impl TaskResult for ChunkGenerationTaskResult {
    /// Hands the generated voxels to the chunk and invalidates its meshed neighbours.
    fn handle_result(
        self: Box<Self>,
        context: &mut CommitContext<'_>,
    ) -> EngineResult<Vec<TaskItem>> {
        let result = *self;
        let loaded = context
            .world
            .get_chunk_at(result.position)
            .is_some_and(|chunk| chunk.ptr_eq(&result.chunk));
        if !loaded {
            debug!("chunk {:?} was unloaded during generation", result.position);
            return Ok(Vec::new());
        }

        {
            let mut chunk = result.chunk.get_mut();
            if chunk.state() != ChunkBuildState::Loading {
                debug!(
                    "discarding terrain of chunk {:?}, now {:?}",
                    result.position,
                    chunk.state()
                );
                return Ok(Vec::new());
            }
            chunk.grid = result.grid;
            chunk.apply(ChunkBuildEvent::TerrainGenerated)?;
        }
        context.world.invalidate_neighbours(result.position)?;
        Ok(Vec::new())
    }
}
