//! # Meshing
//!
//! Turns a chunk's padded voxel grid into render and collision geometry.
//!
//! ## Data Flow
//!
//! 1. [`mesh::greedy`] sweeps the grid in six directions and emits merged
//!    rectangles ([`mesh::face::MergedFace`]).
//! 2. Each block type's face builder turns a rectangle into four
//!    [`vertex::Vertex`] records.
//! 3. A [`geometry_buffer::GeometryBatcher`] packs the quads into pooled
//!    buffers under the vertex limit.
//! 4. On the main thread the [`mesh_registry::MeshRegistry`] swaps the new
//!    buffers into the chunk's slot and hands them to the renderer.
//!
//! Steps 1 to 3 run on a worker inside
//! [`tasks::chunk_mesh_generation_task::ChunkMeshGenerationTask`]; the
//! collider follows the same path with every solid block included.

pub mod collider;
pub mod geometry_buffer;
pub mod mesh;
pub mod mesh_registry;
pub mod tasks;
pub mod vertex;
