#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Geometry Engine
//!
//! Turns populated voxel chunks into renderable and collidable geometry on a
//! pool of worker threads.
//!
//! ## Key Modules
//!
//! * `config` - Engine settings loaded from JSON
//! * `core` - Shared resource handles and memory pools
//! * `engine_state` - The world, greedy meshing, task scheduling and the frame loop
//! * `error` - The engine-wide error type
//!
//! ## Architecture
//!
//! The host owns an [`engine_state::EngineState`] and calls its `tick` once per
//! frame with something implementing
//! [`RenderCollaborator`](engine_state::meshing::mesh_registry::RenderCollaborator).
//! Terrain generation, mesh builds, collider builds and saves run as tasks on
//! the workers; their results are applied on the host's thread during the
//! tick, which is the only place geometry reaches the renderer.
//!
//! ## Usage
//!
//! ```rust,no_run
//! fn main() {
//!     voxel_geometry_engine::run();
//! }
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use cgmath::Point3;
use log::{error, info};
use web_time::Instant;

use crate::{
    config::EngineConfig,
    engine_state::{
        meshing::{
            collider::CollisionGeometry, geometry_buffer::GeometryBuffer,
            mesh_registry::RenderCollaborator,
        },
        voxels::{block::registry::BlockRegistry, terrain::PerlinTerrain},
        EngineState,
    },
    error::EngineResult,
};

pub mod config;
pub mod core;
pub mod engine_state;
pub mod error;

const DEMO_STOPWATCH: &str = "Demo";

/// Chunks generated by the demo along each horizontal axis.
const DEMO_RADIUS: i32 = 2;

/// Counts what would have been uploaded to a GPU.
#[derive(Default)]
struct UploadStatistics {
    buffers: usize,
    vertices: usize,
    colliders: usize,
    triangles: usize,
}

impl RenderCollaborator for UploadStatistics {
    fn resize_meshes(&mut self, _position: Point3<i32>, _count: usize) {}

    fn upload_mesh(&mut self, _position: Point3<i32>, _slot: usize, buffer: &GeometryBuffer) {
        self.buffers += 1;
        self.vertices += buffer.vertex_count();
    }

    fn upload_collider(&mut self, _position: Point3<i32>, collider: &CollisionGeometry) {
        self.colliders += 1;
        self.triangles += collider.triangle_count();
    }

    fn remove_chunk(&mut self, _position: Point3<i32>) {}
}

/// Runs a headless demo: generates a patch of Perlin terrain, meshes it on the
/// worker pool, edits a block and logs what was produced.
///
/// The first command-line argument, if any, names a JSON configuration file.
pub fn run() {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();
    info!("Logger initialized");

    if let Err(error) = run_demo(std::env::args().nth(1).map(PathBuf::from)) {
        error!("demo failed: {}", error);
        std::process::exit(1);
    }
}

fn run_demo(config_path: Option<PathBuf>) -> EngineResult<()> {
    let config = match config_path {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    let terrain = Arc::new(PerlinTerrain::new(0, &["stone", "dirt", "grass", "wood"]));
    let mut engine = EngineState::new(config, BlockRegistry::with_default_blocks(), terrain)?;
    let mut statistics = UploadStatistics::default();

    let start = Instant::now();
    for x in -DEMO_RADIUS..DEMO_RADIUS {
        for y in -1..1 {
            for z in -DEMO_RADIUS..DEMO_RADIUS {
                engine.request_terrain(Point3::new(x, y, z))?;
            }
        }
    }
    engine.flush(&mut statistics, Duration::from_secs(60))?;
    info!(
        "{}: {} chunks, {} buffers, {} vertices, {} colliders, {} triangles in {:?}",
        DEMO_STOPWATCH,
        engine.world().len(),
        statistics.buffers,
        statistics.vertices,
        statistics.colliders,
        statistics.triangles,
        start.elapsed()
    );

    let edit_start = Instant::now();
    engine.set_block_named(Point3::new(0, 0, 0), "wood")?;
    engine.flush(&mut statistics, Duration::from_secs(10))?;
    info!("block edit rebuilt in {:?}", edit_start.elapsed());

    let failed = engine.failed_chunks();
    if !failed.is_empty() {
        error!("{} chunks failed to build: {:?}", failed.len(), failed);
    }
    let (executed, task_failures) = engine.scheduler().statistics();
    info!("{} tasks executed, {} failed", executed, task_failures);
    engine.shutdown();
    Ok(())
}
