//! Task for generating mesh data for chunks in a background thread.
//!
//! The task greedy-meshes a snapshot of the chunk into pooled geometry
//! buffers. Its result commits the buffers to the chunk's mesh slot and
//! schedules the collider build on the same worker, over the same snapshot.

use cgmath::Point3;
use log::debug;
use web_time::Instant;

use super::chunk_collider_task::ChunkColliderTask;
use crate::{
    core::MtResource,
    engine_state::{
        meshing::{
            geometry_buffer::{ChunkGeometry, GeometryBatcher},
            mesh::{build_chunk_geometry, greedy::EdgePolicy},
        },
        task_management::task::{
            Task, TaskItem, TaskLabel, TaskPriority, TaskResult, WorkerContext,
        },
        voxels::chunk::{Chunk, ChunkBuildEvent, ChunkBuildState, ChunkSnapshot},
        CommitContext,
    },
    error::EngineResult,
};

/// A task that builds the render mesh of one chunk.
pub struct ChunkMeshGenerationTask {
    /// The chunk that needs mesh generation
    chunk: MtResource<Chunk>,
    position: Point3<i32>,
    /// The voxels to mesh, padding included
    snapshot: ChunkSnapshot,
    /// Sides whose outward faces are dropped
    edges: EdgePolicy,
}

impl ChunkMeshGenerationTask {
    /// Creates a new chunk mesh generation task.
    ///
    /// # Arguments
    /// * `chunk` - The chunk to mesh
    /// * `position` - The chunk's position
    /// * `snapshot` - The chunk's voxels, taken after its padding was refreshed
    /// * `edges` - World-edge face suppression for this chunk
    ///
    /// # Returns
    /// A new `ChunkMeshGenerationTask` instance
    pub fn new(
        chunk: MtResource<Chunk>,
        position: Point3<i32>,
        snapshot: ChunkSnapshot,
        edges: EdgePolicy,
    ) -> Self {
        ChunkMeshGenerationTask {
            chunk,
            position,
            snapshot,
            edges,
        }
    }
}

impl Task for ChunkMeshGenerationTask {
    fn label(&self) -> TaskLabel {
        TaskLabel::for_build(
            "build mesh",
            self.position,
            ChunkBuildState::MeshBuilding,
            self.snapshot.revision,
        )
    }

    /// Meshes the snapshot on the worker.
    ///
    /// # Returns
    /// The finished geometry, tagged with the revision it was built from
    fn process(self: Box<Self>, context: &mut WorkerContext) -> EngineResult<Box<dyn TaskResult>> {
        let start = Instant::now();
        let resources = context.resources.clone();
        let mut batcher =
            GeometryBatcher::new(resources.config.vertex_limit, resources.geometry_pool.clone());

        let faces = build_chunk_geometry(
            &self.snapshot.grid,
            &resources.registry,
            &self.edges,
            &mut context.scratch,
            self.snapshot.offset(),
            &mut batcher,
        )?;

        let geometry = batcher.commit();
        debug!(
            "meshed chunk {:?} on worker {}: {} faces, {} vertices in {} buffers, took {:?}",
            self.position,
            context.worker_id,
            faces,
            geometry.vertex_count(),
            geometry.buffers.len(),
            start.elapsed()
        );

        Ok(Box::new(ChunkMeshGenerationTaskResult {
            chunk: self.chunk,
            position: self.position,
            snapshot: self.snapshot,
            edges: self.edges,
            geometry,
        }))
    }
}

/// The result of a chunk mesh generation task.
pub struct ChunkMeshGenerationTaskResult {
    chunk: MtResource<Chunk>,
    position: Point3<i32>,
    snapshot: ChunkSnapshot,
    edges: EdgePolicy,
    geometry: ChunkGeometry,
}

impl TaskResult for ChunkMeshGenerationTaskResult {
    /// Commits the mesh unless the chunk changed since the snapshot was taken.
    ///
    /// # Returns
    /// The collider task for the chunk, or nothing for a stale result
    fn handle_result(
        self: Box<Self>,
        context: &mut CommitContext<'_>,
    ) -> EngineResult<Vec<TaskItem>> {
        let result = *self;
        let still_loaded = context
            .world
            .get_chunk_at(result.position)
            .is_some_and(|chunk| chunk.ptr_eq(&result.chunk));

        let worker = {
            let mut chunk = result.chunk.get_mut();
            let current = still_loaded
                && chunk.revision() == result.snapshot.revision
                && chunk.state() == ChunkBuildState::MeshBuilding;
            if !current {
                debug!(
                    "discarding stale mesh of chunk {:?} (revision {}, now {} in {:?})",
                    result.position,
                    result.snapshot.revision,
                    chunk.revision(),
                    chunk.state()
                );
                drop(chunk);
                context.meshes.discard(result.geometry);
                return Ok(Vec::new());
            }
            chunk.apply(ChunkBuildEvent::MeshBuilt)?;
            chunk.apply(ChunkBuildEvent::ColliderRequested)?;
            chunk.worker
        };

        context
            .meshes
            .commit(result.position, result.geometry, &mut *context.renderer);

        let collider =
            ChunkColliderTask::new(result.chunk, result.position, result.snapshot, result.edges);
        Ok(vec![TaskItem::new(collider, TaskPriority::Ordinary).on_worker(worker)])
    }
}
