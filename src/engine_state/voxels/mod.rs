//! # Voxel Data
//!
//! Everything that describes what is in the world, as opposed to how it is
//! drawn.
//!
//! * **Block**: block records, the six sides, and the registry of block types
//! * **Grid**: the padded per-chunk voxel storage
//! * **Chunk**: a grid plus its build state, revision and worker affinity
//! * **World**: the loaded chunks, neighbour padding and block edits
//! * **Terrain** and **Persistence**: the collaborators that fill chunks
//! * **Tasks**: generation, save and load running on the workers
//!
//! ## Thread Safety
//!
//! Chunks live in [`MtResource`](crate::core::MtResource) handles, locked only
//! by the main thread and never two at once. Workers generate or load into
//! grids of their own and read [`ChunkSnapshot`](chunk::ChunkSnapshot)s, so a
//! tick never waits for a task to finish with a chunk.

pub mod block;
pub mod chunk;
pub mod grid;
pub mod persistence;
pub mod tasks;
pub mod terrain;
pub mod world;
