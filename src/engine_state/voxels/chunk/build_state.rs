//! # Chunk Build State
//!
//! The pipeline a chunk walks through between being created and being
//! renderable and collidable:
//!
//! ```text
//! Idle -> (Loading) -> TerrainGenerated -> MeshBuilding -> MeshReady -> ColliderBuilding -> Ready
//!                                              ^                                              |
//!                                              +------------ Dirty <--- block edited ---------+
//! ```
//!
//! The pipeline owns no thread. Transitions are driven by whoever enqueues
//! the corresponding task and by the task results arriving on the main thread.

use crate::error::{EngineError, EngineResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkBuildState {
    /// Created, no voxel data yet.
    Idle,
    /// Voxel data is being read from disk.
    Loading,
    /// Voxel data present, never meshed.
    TerrainGenerated,
    MeshBuilding,
    MeshReady,
    ColliderBuilding,
    Ready,
    /// Voxels changed since the last mesh build.
    Dirty,
    /// The last build failed; retrying is allowed.
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkBuildEvent {
    LoadStarted,
    /// Terrain generation or a load finished populating the grid.
    TerrainGenerated,
    MeshRequested,
    MeshBuilt,
    ColliderRequested,
    ColliderBuilt,
    BlockEdited,
    BuildFailed,
}

impl ChunkBuildState {
    /// Computes the state after `event`, or reports an illegal transition.
    pub fn transition(self, event: ChunkBuildEvent) -> EngineResult<ChunkBuildState> {
        use ChunkBuildEvent as E;
        use ChunkBuildState as S;

        let next = match (self, event) {
            (S::Idle, E::LoadStarted) => S::Loading,
            (S::Idle | S::Loading, E::TerrainGenerated) => S::TerrainGenerated,
            (S::Loading, E::BuildFailed) => S::Idle,

            (
                S::TerrainGenerated | S::MeshReady | S::Ready | S::Dirty | S::Failed,
                E::MeshRequested,
            ) => S::MeshBuilding,
            (S::MeshBuilding, E::MeshBuilt) => S::MeshReady,
            (S::MeshReady, E::ColliderRequested) => S::ColliderBuilding,
            (S::ColliderBuilding, E::ColliderBuilt) => S::Ready,
            (S::MeshBuilding | S::ColliderBuilding, E::BuildFailed) => S::Failed,

            // Never meshed, so there is nothing to invalidate yet.
            (S::TerrainGenerated, E::BlockEdited) => S::TerrainGenerated,
            (
                S::MeshBuilding
                | S::MeshReady
                | S::ColliderBuilding
                | S::Ready
                | S::Dirty
                | S::Failed,
                E::BlockEdited,
            ) => S::Dirty,

            (state, event) => return Err(EngineError::InvalidTransition { state, event }),
        };
        Ok(next)
    }

    /// Whether the chunk holds voxel data a mesh can be built from.
    pub fn has_voxels(self) -> bool {
        !matches!(self, ChunkBuildState::Idle | ChunkBuildState::Loading)
    }

    /// Whether a build task for this chunk is in flight.
    pub fn is_building(self) -> bool {
        matches!(
            self,
            ChunkBuildState::MeshBuilding | ChunkBuildState::ColliderBuilding
        )
    }

    /// Whether the streaming layer should request another mesh build.
    pub fn needs_mesh(self) -> bool {
        matches!(
            self,
            ChunkBuildState::TerrainGenerated | ChunkBuildState::Dirty | ChunkBuildState::Failed
        )
    }

    pub fn is_retryable(self) -> bool {
        self == ChunkBuildState::Failed
    }
}
