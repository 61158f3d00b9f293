//! # Voxel Task System
//!
//! Tasks that fill or store a chunk's voxel data: terrain generation, and
//! saving and loading through the persistence record.

pub mod chunk_generation_task;
pub mod chunk_persistence_task;
