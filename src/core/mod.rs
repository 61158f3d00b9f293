//! # Core Module
//!
//! Building blocks shared by the voxel, meshing and scheduling layers: a
//! lock-guarded shared handle and the memory pools behind the meshing path.
//!
//! ## Key Components
//! - `MtResource`: Shared handle with a read-write lock, compared by identity
//! - `pool`: Object and array pools that keep the meshing hot path free of allocations
//!
//! ## Usage
//! ```rust
//! use voxel_geometry_engine::core::{pool::ObjectPool, MtResource};
//!
//! let revision = MtResource::new(0u64);
//! *revision.get_mut() += 1;
//! assert_eq!(*revision.get(), 1);
//!
//! let mut pool = ObjectPool::new("scratch", 2, || Vec::<u32>::with_capacity(64));
//! let scratch = pool.pop();
//! pool.push(scratch).unwrap();
//! assert_eq!(pool.available(), 2);
//! ```

pub mod mt_resource;
pub mod pool;

pub use mt_resource::MtResource;
