//! # Meshing Tasks
//!
//! Background tasks that turn a chunk's voxels into render and collision
//! geometry. Both build from a snapshot of the chunk and carry its revision,
//! so results overtaken by an edit are dropped on the main thread instead of
//! being shown.

pub mod chunk_collider_task;
pub mod chunk_mesh_generation_task;
