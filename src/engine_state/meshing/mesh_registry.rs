//! # Mesh Registry
//!
//! Main-thread bookkeeping of the geometry each chunk currently shows.
//!
//! Workers never talk to the renderer. A finished [`ChunkGeometry`] travels
//! back in a task result and is committed here: the chunk's previous buffers
//! go back to the pool, the renderer is told when the chunk's buffer count
//! changes, and each new buffer is uploaded. Colliders are forwarded the same
//! way.

use std::collections::HashMap;

use cgmath::Point3;
use log::debug;

use super::{
    collider::CollisionGeometry,
    geometry_buffer::{release_buffers, ChunkGeometry, GeometryBuffer, GeometryPool},
};

/// The rendering and physics side of the engine, driven from the main thread.
pub trait RenderCollaborator {
    /// The chunk will from now on be drawn with `count` buffers.
    fn resize_meshes(&mut self, position: Point3<i32>, count: usize);

    /// Replace buffer `slot` of the chunk with `buffer`.
    fn upload_mesh(&mut self, position: Point3<i32>, slot: usize, buffer: &GeometryBuffer);

    /// Replace the chunk's collision surface.
    fn upload_collider(&mut self, position: Point3<i32>, collider: &CollisionGeometry);

    /// Forget everything about the chunk.
    fn remove_chunk(&mut self, position: Point3<i32>);
}

/// A renderer that drops everything, for headless runs.
#[derive(Debug, Default)]
pub struct NullRenderer;

impl RenderCollaborator for NullRenderer {
    fn resize_meshes(&mut self, _position: Point3<i32>, _count: usize) {}

    fn upload_mesh(&mut self, _position: Point3<i32>, _slot: usize, _buffer: &GeometryBuffer) {}

    fn upload_collider(&mut self, _position: Point3<i32>, _collider: &CollisionGeometry) {}

    fn remove_chunk(&mut self, _position: Point3<i32>) {}
}

/// The buffers a chunk currently shows.
#[derive(Debug, Default)]
pub struct ChunkMeshSlot {
    buffers: Vec<GeometryBuffer>,
}

impl ChunkMeshSlot {
    pub fn buffers(&self) -> &[GeometryBuffer] {
        &self.buffers
    }

    pub fn vertex_count(&self) -> usize {
        self.buffers.iter().map(GeometryBuffer::vertex_count).sum()
    }
}

/// Committed geometry of every chunk that has been meshed.
pub struct MeshRegistry {
    slots: HashMap<Point3<i32>, ChunkMeshSlot>,
    pool: GeometryPool,
}

impl MeshRegistry {
    pub fn new(pool: GeometryPool) -> Self {
        Self {
            slots: HashMap::new(),
            pool,
        }
    }

    /// Makes `geometry` the chunk's visible mesh.
    ///
    /// # Arguments
    /// * `position` - The chunk the geometry belongs to
    /// * `geometry` - Freshly built buffers
    /// * `renderer` - Receives the resize and upload calls
    pub fn commit(
        &mut self,
        position: Point3<i32>,
        geometry: ChunkGeometry,
        renderer: &mut dyn RenderCollaborator,
    ) {
        let slot = self.slots.entry(position).or_default();
        let previous = std::mem::take(&mut slot.buffers);
        let previous_count = previous.len();
        release_buffers(&self.pool, previous);

        slot.buffers = geometry.buffers;
        if slot.buffers.len() != previous_count {
            renderer.resize_meshes(position, slot.buffers.len());
        }
        for (index, buffer) in slot.buffers.iter().enumerate() {
            renderer.upload_mesh(position, index, buffer);
        }
        debug!(
            "committed {} vertices in {} buffers for chunk {:?}",
            slot.vertex_count(),
            slot.buffers.len(),
            position
        );
    }

    /// Forwards a finished collider.
    pub fn commit_collider(
        &mut self,
        position: Point3<i32>,
        collider: &CollisionGeometry,
        renderer: &mut dyn RenderCollaborator,
    ) {
        renderer.upload_collider(position, collider);
    }

    /// Drops geometry that will never be shown.
    pub fn discard(&self, geometry: ChunkGeometry) {
        release_buffers(&self.pool, geometry.buffers);
    }

    /// Releases the chunk's buffers and tells the renderer to forget it.
    pub fn remove(&mut self, position: Point3<i32>, renderer: &mut dyn RenderCollaborator) {
        if let Some(slot) = self.slots.remove(&position) {
            release_buffers(&self.pool, slot.buffers);
        }
        renderer.remove_chunk(position);
    }

    pub fn slot(&self, position: Point3<i32>) -> Option<&ChunkMeshSlot> {
        self.slots.get(&position)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pool::{self, ObjectPool};

    #[derive(Default)]
    struct RecordingRenderer {
        resizes: Vec<usize>,
        uploads: usize,
        removed: usize,
    }

    impl RenderCollaborator for RecordingRenderer {
        fn resize_meshes(&mut self, _position: Point3<i32>, count: usize) {
            self.resizes.push(count);
        }

        fn upload_mesh(&mut self, _position: Point3<i32>, _slot: usize, _buffer: &GeometryBuffer) {
            self.uploads += 1;
        }

        fn upload_collider(&mut self, _position: Point3<i32>, _collider: &CollisionGeometry) {}

        fn remove_chunk(&mut self, _position: Point3<i32>) {
            self.removed += 1;
        }
    }

    fn borrowed(pool: &GeometryPool, count: usize) -> ChunkGeometry {
        let mut pool = pool.lock();
        ChunkGeometry {
            buffers: (0..count).map(|_| pool.pop()).collect(),
        }
    }

    #[test]
    fn recommit_releases_previous_buffers_and_resizes_on_change() {
        let pool = pool::shared(ObjectPool::new("geometry", 0, GeometryBuffer::new));
        let mut registry = MeshRegistry::new(pool.clone());
        let mut renderer = RecordingRenderer::default();
        let position = Point3::new(0, 0, 0);

        let first = borrowed(&pool, 2);
        registry.commit(position, first, &mut renderer);
        let second = borrowed(&pool, 2);
        registry.commit(position, second, &mut renderer);
        let third = borrowed(&pool, 1);
        registry.commit(position, third, &mut renderer);

        assert_eq!(renderer.resizes, vec![2, 1]);
        assert_eq!(renderer.uploads, 5);
        assert_eq!(pool.lock().in_use(), 1);

        registry.remove(position, &mut renderer);
        assert_eq!(pool.lock().in_use(), 0);
        assert_eq!(renderer.removed, 1);
        assert!(registry.is_empty());
    }
}
