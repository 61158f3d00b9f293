use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shared, lock-guarded ownership of a chunk or any other cross-thread value.
///
/// The world map and the tasks in flight each hold a handle to the same
/// chunk. Handles compare by identity with [`MtResource::ptr_eq`], which is
/// how a finished task tells whether its chunk was unloaded and replaced
/// while it ran. Chunk guards are only taken on the main thread; workers
/// build from snapshots, so the tick never waits on them.
///
/// ```
/// use voxel_geometry_engine::core::MtResource;
///
/// let voxels = MtResource::new(vec![0u16; 8]);
/// let worker_view = voxels.clone();
/// std::thread::spawn(move || worker_view.get_mut()[3] = 7)
///     .join()
///     .unwrap();
///
/// assert_eq!(voxels.get()[3], 7);
/// assert!(voxels.ptr_eq(&voxels.clone()));
/// assert!(!voxels.ptr_eq(&MtResource::new(vec![0u16; 8])));
/// ```
///
/// Readers share the lock and writers are exclusive. Never hold guards on two
/// chunks at once: copy what you need out of one and release it first.
pub struct MtResource<T: Send + Sync> {
    resource: Arc<RwLock<T>>,
}

impl<T: Send + Sync> MtResource<T> {
    /// Wraps `resource` in a fresh lock.
    pub fn new(resource: T) -> Self {
        Self {
            resource: Arc::new(RwLock::new(resource)),
        }
    }

    pub fn get(&self) -> RwLockReadGuard<'_, T> {
        self.resource.read()
    }

    /// Blocks until no other guard is held.
    pub fn get_mut(&self) -> RwLockWriteGuard<'_, T> {
        self.resource.write()
    }

    /// Whether two handles point at the same resource.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.resource, &other.resource)
    }
}

impl<T: Send + Sync> Clone for MtResource<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}
