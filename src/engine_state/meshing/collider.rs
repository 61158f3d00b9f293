//! Collision geometry for a chunk.
//!
//! Built from the same greedy merge as the render mesh, but every solid block
//! takes part, including kinds that are never drawn.

use log::debug;

use super::mesh::{
    face::MergedFace,
    greedy::{merge_faces, EdgePolicy, FaceFilter},
};
use crate::{
    engine_state::{
        context::ScratchPools,
        voxels::{block::registry::BlockRegistry, grid::VoxelGrid},
    },
    error::EngineResult,
};

/// A triangle soup describing a chunk's solid surface.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollisionGeometry {
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl CollisionGeometry {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Appends one merged face as two outward-facing triangles.
    pub fn push_face(&mut self, face: &MergedFace, position_offset: [f32; 3]) {
        let base = self.positions.len() as u32;
        self.positions.extend(face.corners().iter().map(|corner| {
            [
                corner.x + position_offset[0],
                corner.y + position_offset[1],
                corner.z + position_offset[2],
            ]
        }));
        let winding: [u32; 6] = if face.is_backface() {
            [0, 2, 1, 0, 3, 2]
        } else {
            [0, 1, 2, 0, 2, 3]
        };
        self.indices.extend(winding.iter().map(|index| base + index));
    }
}

/// Builds the collision surface of `grid`.
///
/// # Arguments
/// * `grid` - The chunk's grid with up-to-date padding
/// * `registry` - Resolves which blocks are solid
/// * `edges` - Sides whose outward faces are dropped
/// * `scratch` - The calling worker's scratch pools
/// * `position_offset` - Added to every position
pub fn build_collider(
    grid: &VoxelGrid,
    registry: &BlockRegistry,
    edges: &EdgePolicy,
    scratch: &mut ScratchPools,
    position_offset: [f32; 3],
) -> EngineResult<CollisionGeometry> {
    let mut faces = scratch.faces.pop();
    faces.clear();

    let filter = FaceFilter::Collision;
    let result = merge_faces(grid, registry, filter, edges, &mut scratch.greedy, &mut faces)
        .map(|_| {
            let mut collider = CollisionGeometry::default();
            for face in faces.iter() {
                collider.push_face(face, position_offset);
            }
            debug!(
                "collider with {} triangles from {} faces",
                collider.triangle_count(),
                faces.len()
            );
            collider
        });

    faces.clear();
    scratch.faces.push(faces)?;
    result
}
