//! # Shared and Per-Worker Context
//!
//! [`EngineResources`] holds what every thread reads: the configuration, the
//! block registry and the shared geometry pool. It is built once at startup
//! and shared through an `Arc`; nothing in it changes afterwards apart from
//! the pool, which has its own lock.
//!
//! [`ScratchPools`] is owned by exactly one worker and holds the memory the
//! meshing path reuses between builds.

use std::sync::Arc;

use crate::{
    config::EngineConfig,
    core::pool::{BucketPolicy, ObjectPool},
    engine_state::{
        meshing::{
            geometry_buffer::{geometry_pool, GeometryPool},
            mesh::{face::MergedFace, greedy::GreedyScratch},
        },
        voxels::block::registry::BlockRegistry,
    },
};

/// Read-mostly state shared by the main thread and every worker.
pub struct EngineResources {
    pub config: EngineConfig,
    pub registry: BlockRegistry,
    pub geometry_pool: GeometryPool,
}

impl EngineResources {
    /// Bundles the configuration and block set, creating the geometry pool.
    ///
    /// # Arguments
    /// * `config` - Validated engine configuration
    /// * `registry` - The block set, fixed for the lifetime of the engine
    ///
    /// # Returns
    /// The resources, ready to be cloned into workers
    pub fn new(config: EngineConfig, registry: BlockRegistry) -> Arc<Self> {
        let geometry_pool = geometry_pool(&config);
        Arc::new(Self {
            config,
            registry,
            geometry_pool,
        })
    }
}

/// Scratch memory owned by a single worker.
pub struct ScratchPools {
    pub greedy: GreedyScratch,
    pub faces: ObjectPool<Vec<MergedFace>>,
}

impl ScratchPools {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            greedy: GreedyScratch::new(BucketPolicy::RoundUp(config.array_bucket_size)),
            faces: ObjectPool::new("merged faces", 1, Vec::new)
                .with_auto_shrink(config.auto_shrink_pools),
        }
    }
}
