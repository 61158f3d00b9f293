//! # Memory Pools
//!
//! Object and array pools that let the meshing path reuse its scratch memory
//! and finished geometry instead of allocating per build.
//!
//! Pools are plain single-owner values (`&mut self` everywhere). Scratch pools
//! live inside a worker's context and are only ever touched by that worker;
//! pools that are shared across threads (finished geometry buffers handed to
//! the main thread) are wrapped in a [`SharedObjectPool`].
//!
//! Every `pop` must be matched by exactly one `push` of the same item. Pushing
//! something the pool never handed out is reported as an error instead of
//! being absorbed, since it would corrupt later reuse.

mod array_pool;
mod object_pool;

use std::sync::Arc;

use parking_lot::Mutex;

pub use array_pool::{ArrayPool, BucketPolicy, PooledArray};
pub use object_pool::ObjectPool;

/// An object pool guarded by a lock, for resources that cross threads.
pub type SharedObjectPool<T> = Arc<Mutex<ObjectPool<T>>>;

/// Wraps a pool for sharing between the workers and the main thread.
pub fn shared<T>(pool: ObjectPool<T>) -> SharedObjectPool<T> {
    Arc::new(Mutex::new(pool))
}
