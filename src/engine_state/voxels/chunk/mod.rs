//! # Chunk Module
//!
//! A chunk is a fixed-size cuboid of the world: the unit of generation,
//! meshing, saving and loading. It owns its padded [`VoxelGrid`], tracks where
//! it is in the build pipeline, and remembers which worker thread all of its
//! tasks run on so the worker's scratch pools are only touched by one thread.

use std::sync::Arc;

use cgmath::Point3;

use super::{block::Block, grid::VoxelGrid};
use crate::{engine_state::task_management::WorkerId, error::EngineResult};

mod build_state;

pub use build_state::{ChunkBuildEvent, ChunkBuildState};

/// Represents one `N³` region of voxel blocks.
pub struct Chunk {
    /// The position of this chunk in chunk coordinates (not block coordinates).
    pub position: Point3<i32>,
    /// Padded voxel storage.
    pub grid: VoxelGrid,
    /// The worker every task for this chunk is sent to.
    pub worker: WorkerId,
    state: ChunkBuildState,
    /// Bumped on every voxel change; build results carry the revision they read.
    revision: u64,
}

impl Chunk {
    /// Creates an empty (all air) chunk in the `Idle` state.
    pub fn new(position: Point3<i32>, dimension: usize, padding: usize, worker: WorkerId) -> Self {
        Chunk {
            position,
            grid: VoxelGrid::new(dimension, padding),
            worker,
            state: ChunkBuildState::Idle,
            revision: 0,
        }
    }

    pub fn state(&self) -> ChunkBuildState {
        self.state
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Advances the build pipeline.
    ///
    /// # Errors
    /// [`crate::error::EngineError::InvalidTransition`] if the event is illegal in the current
    /// state; the state is left unchanged.
    pub fn apply(&mut self, event: ChunkBuildEvent) -> EngineResult<ChunkBuildState> {
        self.state = self.state.transition(event)?;
        Ok(self.state)
    }

    /// Records that voxel data changed.
    pub fn mark_edited(&mut self) -> EngineResult<ChunkBuildState> {
        let state = self.apply(ChunkBuildEvent::BlockEdited)?;
        self.revision += 1;
        Ok(state)
    }

    /// Edits one interior voxel by chunk-local coordinates.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, block: Block) -> EngineResult<()> {
        self.state.transition(ChunkBuildEvent::BlockEdited)?;
        self.grid.set_local(x, y, z, block);
        self.mark_edited()?;
        Ok(())
    }

    /// World-space block coordinate of the chunk's first interior voxel.
    pub fn world_origin(&self) -> Point3<i32> {
        let dimension = self.grid.dimension() as i32;
        Point3::new(
            self.position.x * dimension,
            self.position.y * dimension,
            self.position.z * dimension,
        )
    }

    /// Copies the grid out for a build that runs without holding the chunk's lock.
    pub fn snapshot(&self) -> ChunkSnapshot {
        ChunkSnapshot {
            grid: Arc::new(self.grid.clone()),
            revision: self.revision,
            origin: self.world_origin(),
        }
    }
}

/// The voxels of a chunk as they were when a build was requested.
///
/// Mesh, collider and save tasks read a snapshot instead of the chunk, so a
/// worker never holds a lock the main thread could wait on.
#[derive(Clone, Debug)]
pub struct ChunkSnapshot {
    pub grid: Arc<VoxelGrid>,
    /// The chunk revision the grid was copied at.
    pub revision: u64,
    pub origin: Point3<i32>,
}

impl ChunkSnapshot {
    /// World-space offset added to every vertex built from this snapshot.
    pub fn offset(&self) -> [f32; 3] {
        [self.origin.x as f32, self.origin.y as f32, self.origin.z as f32]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edits_bump_revision_and_respect_state() {
        let mut chunk = Chunk::new(Point3::new(1, 0, -1), 4, 1, 0);
        assert!(chunk.set_block(0, 0, 0, Block::new(1, true)).is_err());
        assert_eq!(chunk.revision(), 0);

        chunk.apply(ChunkBuildEvent::TerrainGenerated).unwrap();
        chunk.set_block(0, 0, 0, Block::new(1, true)).unwrap();
        assert_eq!(chunk.revision(), 1);
        assert_eq!(chunk.state(), ChunkBuildState::TerrainGenerated);
        assert_eq!(chunk.world_origin(), Point3::new(4, 0, -4));
    }

    #[test]
    fn snapshots_do_not_follow_later_edits() {
        let mut chunk = Chunk::new(Point3::new(0, 1, 0), 4, 1, 0);
        chunk.apply(ChunkBuildEvent::TerrainGenerated).unwrap();
        let snapshot = chunk.snapshot();

        chunk.set_block(1, 1, 1, Block::new(1, true)).unwrap();
        assert_eq!(snapshot.revision, 0);
        assert_eq!(snapshot.grid.count_non_air(), 0);
        assert_eq!(snapshot.offset(), [0.0, 4.0, 0.0]);
        assert_eq!(chunk.grid.count_non_air(), 1);
    }
}
