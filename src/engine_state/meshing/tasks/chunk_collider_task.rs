//! Task for building a chunk's collision surface in a background thread.

use cgmath::Point3;
use log::debug;

use crate::{
    core::MtResource,
    engine_state::{
        meshing::{
            collider::{build_collider, CollisionGeometry},
            mesh::greedy::EdgePolicy,
        },
        task_management::task::{Task, TaskItem, TaskLabel, TaskResult, WorkerContext},
        voxels::chunk::{Chunk, ChunkBuildEvent, ChunkBuildState, ChunkSnapshot},
        CommitContext,
    },
    error::EngineResult,
};

/// Builds the collider of a chunk whose mesh was just committed, from the
/// snapshot the mesh was built from.
pub struct ChunkColliderTask {
    chunk: MtResource<Chunk>,
    position: Point3<i32>,
    snapshot: ChunkSnapshot,
    edges: EdgePolicy,
}

impl ChunkColliderTask {
    pub fn new(
        chunk: MtResource<Chunk>,
        position: Point3<i32>,
        snapshot: ChunkSnapshot,
        edges: EdgePolicy,
    ) -> Self {
        Self {
            chunk,
            position,
            snapshot,
            edges,
        }
    }
}

impl Task for ChunkColliderTask {
    fn label(&self) -> TaskLabel {
        TaskLabel::for_build(
            "build collider",
            self.position,
            ChunkBuildState::ColliderBuilding,
            self.snapshot.revision,
        )
    }

    fn process(self: Box<Self>, context: &mut WorkerContext) -> EngineResult<Box<dyn TaskResult>> {
        let resources = context.resources.clone();
        let collider = build_collider(
            &self.snapshot.grid,
            &resources.registry,
            &self.edges,
            &mut context.scratch,
            self.snapshot.offset(),
        )?;

        Ok(Box::new(ChunkColliderTaskResult {
            chunk: self.chunk,
            position: self.position,
            revision: self.snapshot.revision,
            collider,
        }))
    }
}

pub struct ChunkColliderTaskResult {
    chunk: MtResource<Chunk>,
    position: Point3<i32>,
    revision: u64,
    collider: CollisionGeometry,
}

impl TaskResult for ChunkColliderTaskResult {
    /// Forwards the collider and marks the chunk ready, unless the chunk changed meanwhile.
    fn handle_result(
        self: Box<Self>,
        context: &mut CommitContext<'_>,
    ) -> EngineResult<Vec<TaskItem>> {
        let result = *self;
        if !context
            .world
            .get_chunk_at(result.position)
            .is_some_and(|chunk| chunk.ptr_eq(&result.chunk))
        {
            return Ok(Vec::new());
        }

        {
            let mut chunk = result.chunk.get_mut();
            if chunk.revision() != result.revision
                || chunk.state() != ChunkBuildState::ColliderBuilding
            {
                debug!("discarding stale collider of chunk {:?}", result.position);
                return Ok(Vec::new());
            }
            chunk.apply(ChunkBuildEvent::ColliderBuilt)?;
        }

        context
            .meshes
            .commit_collider(result.position, &result.collider, &mut *context.renderer);
        Ok(Vec::new())
    }
}
