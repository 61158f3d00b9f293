use log::debug;

use crate::error::{EngineError, EngineResult};

/// A pool of reusable instances created on demand by a factory.
///
/// The pool pre-allocates `floor` instances. `pop` hands out an idle instance
/// or grows the pool; `push` returns one. With auto-shrink enabled, once fewer
/// than a quarter of the instances are in use, half of the idle ones are
/// released on each return, never going below the floor.
pub struct ObjectPool<T> {
    name: &'static str,
    factory: Box<dyn Fn() -> T + Send>,
    available: Vec<T>,
    capacity: usize,
    floor: usize,
    auto_shrink: bool,
}

impl<T> ObjectPool<T> {
    /// Creates a pool holding `floor` freshly built instances.
    ///
    /// # Arguments
    /// * `name` - Used in error messages and logs
    /// * `floor` - Number of instances to pre-allocate, and the shrink lower bound
    /// * `factory` - Builds a new instance whenever the pool runs dry
    pub fn new(name: &'static str, floor: usize, factory: impl Fn() -> T + Send + 'static) -> Self {
        let available = (0..floor).map(|_| factory()).collect();
        Self {
            name,
            factory: Box::new(factory),
            available,
            capacity: floor,
            floor,
            auto_shrink: false,
        }
    }

    /// Enables or disables releasing idle capacity after load spikes.
    pub fn with_auto_shrink(mut self, enabled: bool) -> Self {
        self.auto_shrink = enabled;
        self
    }

    /// Takes an instance out of the pool, building a new one if none is idle.
    pub fn pop(&mut self) -> T {
        match self.available.pop() {
            Some(item) => item,
            None => {
                self.capacity += 1;
                (self.factory)()
            }
        }
    }

    /// Returns an instance previously obtained from [`ObjectPool::pop`].
    ///
    /// # Errors
    /// [`EngineError::NothingBorrowed`] when every instance is already idle.
    pub fn push(&mut self, item: T) -> EngineResult<()> {
        if self.in_use() == 0 {
            return Err(EngineError::NothingBorrowed { pool: self.name });
        }
        self.available.push(item);
        if self.auto_shrink {
            self.shrink_if_idle();
        }
        Ok(())
    }

    fn shrink_if_idle(&mut self) {
        if self.capacity <= self.floor || self.in_use() * 4 >= self.capacity {
            return;
        }
        let release = (self.available.len() / 2).min(self.capacity - self.floor);
        if release == 0 {
            return;
        }
        self.available.truncate(self.available.len() - release);
        self.capacity -= release;
        debug!(
            "pool `{}` released {} idle instances, capacity now {}",
            self.name, release, self.capacity
        );
    }

    /// Number of idle instances.
    pub fn available(&self) -> usize {
        self.available.len()
    }

    /// Number of instances the pool currently accounts for, idle or not.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of instances handed out and not yet returned.
    pub fn in_use(&self) -> usize {
        self.capacity - self.available.len()
    }

    pub fn floor(&self) -> usize {
        self.floor
    }
}
