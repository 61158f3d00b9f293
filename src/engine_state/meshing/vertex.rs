//! Vertex format emitted by the geometry batcher.
//!
//! Vertices are plain-old-data so a committed
//! [`GeometryBuffer`](super::geometry_buffer::GeometryBuffer) can be handed to a
//! renderer as a byte slice without conversion.

use cgmath::Point3;

use super::mesh::face::MergedFace;
use crate::engine_state::voxels::block::registry::BlockDefinition;

/// A single corner of a voxel quad.
///
/// # Memory Layout
/// - Position: [f32; 3] (12 bytes)
/// - Normal: [f32; 3] (12 bytes)
/// - Texture Coordinates: [f32; 2] (8 bytes)
/// - Color: [f32; 4] (16 bytes)
/// - Tangent: [f32; 4] (16 bytes)
/// - Texture Index: u32 (4 bytes)
///
/// Total size: 68 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Position in chunk-local or world space, depending on the offset used
    pub position: [f32; 3],
    pub normal: [f32; 3],
    /// Texture coordinates in block units; a merged face tiles its texture
    pub tex_coords: [f32; 2],
    pub color: [f32; 4],
    /// Tangent along the face's `u` axis, `w` holds the bitangent sign
    pub tangent: [f32; 4],
    /// Layer of the texture array
    pub texture_index: u32,
}

impl Vertex {
    /// Builds the four corners of a merged face.
    ///
    /// # Arguments
    /// * `face` - The merged rectangle to emit
    /// * `definition` - The block type the face belongs to
    /// * `position_offset` - Added to every corner, usually the chunk's world origin
    ///
    /// # Returns
    /// Corners in the order of [`MergedFace::corners`]
    pub fn quad(
        face: &MergedFace,
        definition: &BlockDefinition,
        position_offset: [f32; 3],
    ) -> [Vertex; 4] {
        let side = face.side();
        let normal = side.normal();
        let normal = [normal.x as f32, normal.y as f32, normal.z as f32];
        let (u_axis, _) = face.axis.plane_axes();
        let mut tangent = [0.0, 0.0, 0.0, 1.0];
        tangent[u_axis as usize] = 1.0;

        let (w, h) = (face.width as f32, face.height as f32);
        let tex_coords = [[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]];
        let texture_index = definition.textures[side as usize];

        let corners = face.corners();
        std::array::from_fn(|i| {
            let corner: Point3<f32> = corners[i];
            Vertex {
                position: [
                    corner.x + position_offset[0],
                    corner.y + position_offset[1],
                    corner.z + position_offset[2],
                ],
                normal,
                tex_coords: tex_coords[i],
                color: definition.color,
                tangent,
                texture_index,
            }
        })
    }

    /// Returns a copy moved by `position_offset` with its texture coordinates
    /// shifted by `uv_offset`.
    pub fn translated(&self, position_offset: [f32; 3], uv_offset: [f32; 2]) -> Vertex {
        let mut vertex = *self;
        for axis in 0..3 {
            vertex.position[axis] += position_offset[axis];
        }
        vertex.tex_coords[0] += uv_offset[0];
        vertex.tex_coords[1] += uv_offset[1];
        vertex
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::block::{
        block_side::{Axis, Facing},
        registry::BlockRegistry,
    };

    #[test]
    fn quad_carries_side_texture_and_normal() {
        let registry = BlockRegistry::with_default_blocks();
        let grass = registry.definition(registry.id_of("grass"));
        let face = MergedFace {
            origin: Point3::new(0, 0, 0),
            width: 3,
            height: 2,
            axis: Axis::Y,
            facing: Facing::Positive,
            block_type: grass.id,
        };

        let quad = Vertex::quad(&face, grass, [16.0, 0.0, 0.0]);
        assert!(quad.iter().all(|vertex| vertex.normal == [0.0, 1.0, 0.0]));
        assert!(quad.iter().all(|vertex| vertex.texture_index == 4));
        assert_eq!(quad[0].position, [16.0, 1.0, 0.0]);
        assert_eq!(quad[2].tex_coords, [3.0, 2.0]);
        assert_eq!(std::mem::size_of::<Vertex>(), 68);
    }
}
