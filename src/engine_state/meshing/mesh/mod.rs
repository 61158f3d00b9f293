//! Mesh generation for a single chunk.
//!
//! [`greedy`] reduces a padded grid to merged rectangles, [`face`] describes
//! those rectangles, and [`build_chunk_geometry`] turns them into vertices
//! through the block registry.

pub mod face;
pub mod greedy;

use self::greedy::{merge_faces, EdgePolicy, FaceFilter};
use super::geometry_buffer::GeometryBatcher;
use crate::{
    engine_state::{
        context::ScratchPools,
        voxels::{block::registry::BlockRegistry, grid::VoxelGrid},
    },
    error::EngineResult,
};

/// Meshes `grid` into `batcher`.
///
/// # Arguments
/// * `grid` - The chunk's grid with up-to-date padding
/// * `registry` - Supplies each block type's face builder
/// * `edges` - Sides whose outward faces are dropped
/// * `scratch` - The calling worker's scratch pools
/// * `position_offset` - Added to every vertex, usually the chunk's world origin
/// * `batcher` - Receives the quads
///
/// # Returns
/// The number of merged faces that produced geometry
pub fn build_chunk_geometry(
    grid: &VoxelGrid,
    registry: &BlockRegistry,
    edges: &EdgePolicy,
    scratch: &mut ScratchPools,
    position_offset: [f32; 3],
    batcher: &mut GeometryBatcher,
) -> EngineResult<usize> {
    let mut faces = scratch.faces.pop();
    faces.clear();

    let filter = FaceFilter::Render;
    let result = merge_faces(grid, registry, filter, edges, &mut scratch.greedy, &mut faces)
        .and_then(|_| {
            let mut emitted = 0;
            for face in faces.iter() {
                let definition = registry.definition(face.block_type);
                if let Some(vertices) = definition.build_face(face, position_offset) {
                    batcher.add_face(vertices, face.is_backface())?;
                    emitted += 1;
                }
            }
            Ok(emitted)
        });

    faces.clear();
    scratch.faces.push(faces)?;
    result
}
