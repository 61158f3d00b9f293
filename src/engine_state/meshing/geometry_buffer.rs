//! # Geometry Buffers
//!
//! Vertex and index storage for chunk meshes, recycled through a shared
//! [`ObjectPool`](crate::core::pool::ObjectPool).
//!
//! A [`GeometryBatcher`] collects quads and whole meshes into pooled buffers,
//! opening a new buffer whenever the next addition would push the current one
//! past the vertex limit. Indices stored in a buffer are always relative to
//! that buffer's own vertices, so every buffer can be drawn on its own.

use bytemuck::cast_slice;
use log::warn;

use super::vertex::Vertex;
use crate::{
    config::EngineConfig,
    core::pool::{self, ObjectPool, SharedObjectPool},
    error::{EngineError, EngineResult},
};

/// Triangle order for a quad whose corners run counter-clockwise around its facing.
const FRONT_WINDING: [u32; 6] = [0, 1, 2, 0, 2, 3];
/// Triangle order for a quad that faces against its corner ordering.
const BACK_WINDING: [u32; 6] = [0, 2, 1, 0, 3, 2];

/// One drawable block of geometry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeometryBuffer {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl GeometryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Empties the buffer but keeps its allocations.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    /// The vertex data as raw bytes, ready for upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        cast_slice(&self.vertices)
    }

    /// The index data as raw bytes, ready for upload.
    pub fn index_bytes(&self) -> &[u8] {
        cast_slice(&self.indices)
    }
}

/// The pool every batcher draws its buffers from.
pub type GeometryPool = SharedObjectPool<GeometryBuffer>;

/// Creates the shared geometry pool described by `config`.
pub fn geometry_pool(config: &EngineConfig) -> GeometryPool {
    pool::shared(
        ObjectPool::new("geometry", config.object_pool_floor, GeometryBuffer::new)
            .with_auto_shrink(config.auto_shrink_pools),
    )
}

/// Returns buffers to `pool`, logging instead of failing.
///
/// # Arguments
/// * `pool` - The pool the buffers were taken from
/// * `buffers` - Buffers to recycle
pub fn release_buffers(pool: &GeometryPool, buffers: impl IntoIterator<Item = GeometryBuffer>) {
    let mut pool = pool.lock();
    for mut buffer in buffers {
        buffer.clear();
        if let Err(error) = pool.push(buffer) {
            warn!("dropping geometry buffer: {}", error);
        }
    }
}

/// Finished geometry for one chunk, possibly split over several buffers.
#[derive(Debug, Default)]
pub struct ChunkGeometry {
    pub buffers: Vec<GeometryBuffer>,
}

impl ChunkGeometry {
    pub fn vertex_count(&self) -> usize {
        self.buffers.iter().map(GeometryBuffer::vertex_count).sum()
    }

    pub fn index_count(&self) -> usize {
        self.buffers.iter().map(GeometryBuffer::index_count).sum()
    }
}

/// Accumulates quads and meshes into pooled buffers under a per-buffer vertex limit.
pub struct GeometryBatcher {
    vertex_limit: usize,
    pool: GeometryPool,
    buffers: Vec<GeometryBuffer>,
}

impl GeometryBatcher {
    /// # Arguments
    /// * `vertex_limit` - Maximum vertices per buffer, at least four
    /// * `pool` - Where buffers come from and go back to
    pub fn new(vertex_limit: usize, pool: GeometryPool) -> Self {
        Self {
            vertex_limit,
            pool,
            buffers: Vec::new(),
        }
    }

    /// The buffer that receives the next `vertices` vertices, opening a new one when needed.
    fn buffer_with_room(&mut self, vertices: usize) -> &mut GeometryBuffer {
        let needs_new = self
            .buffers
            .last()
            .map_or(true, |buffer| buffer.vertex_count() + vertices > self.vertex_limit);
        if needs_new {
            let mut buffer = self.pool.lock().pop();
            buffer.clear();
            self.buffers.push(buffer);
        }
        let last = self.buffers.len() - 1;
        &mut self.buffers[last]
    }

    /// Appends one quad as two triangles.
    ///
    /// # Arguments
    /// * `vertices` - Corners in the order of
    ///   [`MergedFace::corners`](super::mesh::face::MergedFace::corners)
    /// * `backface` - Use the reversed winding so the quad faces the other way
    pub fn add_face(&mut self, vertices: [Vertex; 4], backface: bool) -> EngineResult<()> {
        if self.vertex_limit < vertices.len() {
            return Err(EngineError::MeshTooLarge {
                vertices: vertices.len(),
                limit: self.vertex_limit,
            });
        }
        let buffer = self.buffer_with_room(vertices.len());
        let base = buffer.vertices.len() as u32;
        buffer.vertices.extend_from_slice(&vertices);
        let winding = if backface { BACK_WINDING } else { FRONT_WINDING };
        buffer.indices.extend(winding.iter().map(|index| base + index));
        Ok(())
    }

    /// Appends an arbitrary indexed mesh, kept whole in a single buffer.
    ///
    /// # Arguments
    /// * `indices` - Triangle indices into `vertices`
    /// * `vertices` - The mesh's vertices
    /// * `uv_offset` - Added to every texture coordinate
    /// * `position_offset` - Added to every position
    ///
    /// # Errors
    /// [`EngineError::MeshTooLarge`] when the mesh alone exceeds the vertex limit.
    pub fn add_mesh(
        &mut self,
        indices: &[u32],
        vertices: &[Vertex],
        uv_offset: [f32; 2],
        position_offset: [f32; 3],
    ) -> EngineResult<()> {
        if vertices.len() > self.vertex_limit {
            return Err(EngineError::MeshTooLarge {
                vertices: vertices.len(),
                limit: self.vertex_limit,
            });
        }
        let buffer = self.buffer_with_room(vertices.len());
        let base = buffer.vertices.len() as u32;
        buffer.vertices.extend(
            vertices
                .iter()
                .map(|vertex| vertex.translated(position_offset, uv_offset)),
        );
        buffer.indices.extend(indices.iter().map(|index| base + index));
        Ok(())
    }

    pub fn vertex_count(&self) -> usize {
        self.buffers.iter().map(GeometryBuffer::vertex_count).sum()
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Finishes the batch, handing the buffers over to the caller.
    pub fn commit(mut self) -> ChunkGeometry {
        ChunkGeometry {
            buffers: std::mem::take(&mut self.buffers),
        }
    }
}

impl Drop for GeometryBatcher {
    fn drop(&mut self) {
        if !self.buffers.is_empty() {
            release_buffers(&self.pool, self.buffers.drain(..));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f32) -> Vertex {
        Vertex {
            position: [x, 0.0, 0.0],
            normal: [0.0, 1.0, 0.0],
            tex_coords: [0.0, 0.0],
            color: [1.0; 4],
            tangent: [1.0, 0.0, 0.0, 1.0],
            texture_index: 0,
        }
    }

    fn quad() -> [Vertex; 4] {
        [vertex(0.0), vertex(1.0), vertex(2.0), vertex(3.0)]
    }

    fn pool() -> GeometryPool {
        pool::shared(ObjectPool::new("geometry", 0, GeometryBuffer::new))
    }

    #[test]
    fn faces_split_at_the_vertex_limit() {
        let mut batcher = GeometryBatcher::new(8, pool());
        for _ in 0..3 {
            batcher.add_face(quad(), false).unwrap();
        }
        let geometry = batcher.commit();
        assert_eq!(geometry.buffers.len(), 2);
        assert_eq!(geometry.buffers[0].vertex_count(), 8);
        assert_eq!(geometry.buffers[1].vertex_count(), 4);
        // Indices restart in each buffer.
        assert_eq!(geometry.buffers[1].indices, FRONT_WINDING.to_vec());
        assert_eq!(&geometry.buffers[0].indices[6..], &[4, 5, 6, 4, 6, 7]);
    }

    #[test]
    fn backfaces_reverse_the_winding() {
        let mut batcher = GeometryBatcher::new(64, pool());
        batcher.add_face(quad(), true).unwrap();
        assert_eq!(batcher.commit().buffers[0].indices, BACK_WINDING.to_vec());
    }

    #[test]
    fn meshes_are_offset_and_kept_whole() {
        let mut batcher = GeometryBatcher::new(6, pool());
        batcher.add_face(quad(), false).unwrap();
        let triangle = [vertex(0.0), vertex(1.0), vertex(2.0)];
        batcher
            .add_mesh(&[0, 1, 2], &triangle, [0.5, 0.5], [10.0, 0.0, 0.0])
            .unwrap();

        let geometry = batcher.commit();
        assert_eq!(geometry.buffers.len(), 2);
        assert_eq!(geometry.buffers[1].indices, vec![0, 1, 2]);
        assert_eq!(geometry.buffers[1].vertices[1].position, [11.0, 0.0, 0.0]);
        assert_eq!(geometry.buffers[1].vertices[0].tex_coords, [0.5, 0.5]);
    }

    #[test]
    fn oversized_mesh_is_rejected() {
        let mut batcher = GeometryBatcher::new(4, pool());
        let vertices = vec![vertex(0.0); 5];
        let result = batcher.add_mesh(&[0, 1, 2], &vertices, [0.0; 2], [0.0; 3]);
        assert!(matches!(
            result,
            Err(EngineError::MeshTooLarge { vertices: 5, limit: 4 })
        ));
    }

    #[test]
    fn dropped_batch_returns_its_buffers() {
        let pool = pool();
        {
            let mut batcher = GeometryBatcher::new(4, pool.clone());
            batcher.add_face(quad(), false).unwrap();
            batcher.add_face(quad(), false).unwrap();
            assert_eq!(pool.lock().in_use(), 2);
        }
        assert_eq!(pool.lock().in_use(), 0);
        assert_eq!(pool.lock().available(), 2);
    }
}
