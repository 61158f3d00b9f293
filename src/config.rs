//! # Engine Configuration
//!
//! Tunables for chunk size, geometry limits, pooling and the worker pool.
//! Every field has a default so a partial JSON document is enough to override
//! a single setting.
//!
//! ```json
//! { "chunk_dimension": 32, "vertex_limit": 30000 }
//! ```

use std::path::Path;

use cgmath::Point3;
use serde::{Deserialize, Serialize};

use crate::{
    engine_state::voxels::block::block_side::BlockSide,
    error::{EngineError, EngineResult},
};

/// Inclusive range of chunk coordinates that make up the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldBounds {
    pub min: [i32; 3],
    pub max: [i32; 3],
}

impl WorldBounds {
    /// Returns true when the chunk at `position` lies on the world edge facing `side`.
    pub fn is_edge(&self, position: Point3<i32>, side: BlockSide) -> bool {
        let axis = side.axis() as usize;
        let coordinate = [position.x, position.y, position.z][axis];
        if side.is_positive() {
            coordinate >= self.max[axis]
        } else {
            coordinate <= self.min[axis]
        }
    }
}

/// Engine-wide settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Visible edge length of a chunk, in voxels.
    pub chunk_dimension: usize,
    /// Number of mirrored neighbour layers around each chunk.
    pub padding: usize,
    /// Maximum number of vertices in one geometry buffer.
    pub vertex_limit: usize,
    /// Number of background workers. `None` means processor count minus one.
    pub worker_threads: Option<usize>,
    /// Array pool lengths are rounded up to a multiple of this.
    pub array_bucket_size: usize,
    /// Minimum number of instances an object pool keeps around.
    pub object_pool_floor: usize,
    /// Whether object pools release idle capacity after a spike.
    pub auto_shrink_pools: bool,
    /// Extent of the world, used to detect edge chunks.
    pub world_bounds: Option<WorldBounds>,
    /// Per side (indexed by [`BlockSide`]), drop faces that point out of the world.
    pub suppress_world_edge_faces: [bool; 6],
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_dimension: 16,
            padding: 1,
            vertex_limit: 65_000,
            worker_threads: None,
            array_bucket_size: 100,
            object_pool_floor: 4,
            auto_shrink_pools: true,
            world_bounds: None,
            suppress_world_edge_faces: [false; 6],
        }
    }
}

impl EngineConfig {
    /// Parses and validates a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> EngineResult<()> {
        if self.chunk_dimension == 0 {
            return Err(EngineError::Config("chunk_dimension must be positive".into()));
        }
        if self.padding == 0 {
            return Err(EngineError::Config("padding must be at least one layer".into()));
        }
        if self.vertex_limit < 4 {
            return Err(EngineError::Config(format!(
                "vertex_limit {} cannot hold a single quad",
                self.vertex_limit
            )));
        }
        if self.array_bucket_size == 0 {
            return Err(EngineError::Config("array_bucket_size must be positive".into()));
        }
        if self.worker_threads == Some(0) {
            return Err(EngineError::Config("worker_threads must be at least one".into()));
        }
        Ok(())
    }

    /// Number of workers the scheduler should start.
    pub fn resolved_worker_threads(&self) -> usize {
        self.worker_threads
            .unwrap_or_else(|| num_cpus::get().saturating_sub(1))
            .max(1)
    }

    /// Whether faces of the chunk at `position` that point towards `side` are dropped.
    pub fn suppresses_edge(&self, position: Point3<i32>, side: BlockSide) -> bool {
        self.suppress_world_edge_faces[side as usize]
            && self
                .world_bounds
                .is_some_and(|bounds| bounds.is_edge(position, side))
    }
}
