use std::{
    collections::HashMap,
    ops::{Deref, DerefMut},
};

use crate::error::{EngineError, EngineResult};

/// How requested sizes map onto pool buckets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BucketPolicy {
    /// One bucket per exact length.
    Exact,
    /// Lengths are rounded up to the next multiple of the step.
    RoundUp(usize),
}

impl BucketPolicy {
    /// The array length handed out for a request of `size` elements.
    pub fn bucket_length(&self, size: usize) -> usize {
        match *self {
            BucketPolicy::Exact => size,
            BucketPolicy::RoundUp(step) => size.div_ceil(step) * step,
        }
    }

    fn accepts(&self, length: usize) -> bool {
        match *self {
            BucketPolicy::Exact => true,
            BucketPolicy::RoundUp(step) => length % step == 0,
        }
    }
}

/// A fixed-length array owned by an [`ArrayPool`] bucket.
///
/// Contents are whatever the previous user left behind; callers overwrite
/// the cells they read.
#[derive(Debug)]
pub struct PooledArray<T> {
    data: Box<[T]>,
}

impl<T> Deref for PooledArray<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T> DerefMut for PooledArray<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

struct Bucket<T> {
    free: Vec<Box<[T]>>,
    outstanding: usize,
}

/// Pools of arrays keyed by (rounded) length.
pub struct ArrayPool<T> {
    policy: BucketPolicy,
    buckets: HashMap<usize, Bucket<T>>,
}

impl<T: Default + Clone> ArrayPool<T> {
    pub fn new(policy: BucketPolicy) -> Self {
        Self {
            policy,
            buckets: HashMap::new(),
        }
    }

    /// Hands out an array of at least `size` elements, reusing a returned one when possible.
    ///
    /// The array's length is the bucket length for `size`, which may be larger.
    pub fn pop(&mut self, size: usize) -> PooledArray<T> {
        let length = self.policy.bucket_length(size);
        let bucket = self.buckets.entry(length).or_insert_with(|| Bucket {
            free: Vec::new(),
            outstanding: 0,
        });
        bucket.outstanding += 1;
        let data = bucket
            .free
            .pop()
            .unwrap_or_else(|| vec![T::default(); length].into_boxed_slice());
        PooledArray { data }
    }

    /// Returns an array to the bucket matching its length.
    ///
    /// # Errors
    /// - [`EngineError::UnknownArrayLength`] if the length is not a bucket of this pool
    /// - [`EngineError::NothingBorrowed`] if that bucket has nothing outstanding
    pub fn push(&mut self, array: PooledArray<T>) -> EngineResult<()> {
        let length = array.data.len();
        if !self.policy.accepts(length) {
            return Err(EngineError::UnknownArrayLength { length });
        }
        let bucket = self
            .buckets
            .get_mut(&length)
            .ok_or(EngineError::UnknownArrayLength { length })?;
        if bucket.outstanding == 0 {
            return Err(EngineError::NothingBorrowed { pool: "array" });
        }
        bucket.outstanding -= 1;
        bucket.free.push(array.data);
        Ok(())
    }

    /// Pre-allocates `count` idle arrays in the bucket for `size`.
    pub fn prewarm(&mut self, size: usize, count: usize) {
        let length = self.policy.bucket_length(size);
        let bucket = self.buckets.entry(length).or_insert_with(|| Bucket {
            free: Vec::new(),
            outstanding: 0,
        });
        bucket
            .free
            .extend((0..count).map(|_| vec![T::default(); length].into_boxed_slice()));
    }

    /// Idle arrays in the bucket that would serve a request of `size`.
    pub fn available(&self, size: usize) -> usize {
        self.buckets
            .get(&self.policy.bucket_length(size))
            .map_or(0, |bucket| bucket.free.len())
    }

    /// Arrays from the bucket for `size` that have not been returned.
    pub fn outstanding(&self, size: usize) -> usize {
        self.buckets
            .get(&self.policy.bucket_length(size))
            .map_or(0, |bucket| bucket.outstanding)
    }

    pub fn policy(&self) -> BucketPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_up_policy_buckets_by_step() {
        let policy = BucketPolicy::RoundUp(100);
        assert_eq!(policy.bucket_length(1), 100);
        assert_eq!(policy.bucket_length(100), 100);
        assert_eq!(policy.bucket_length(101), 200);
        assert_eq!(BucketPolicy::Exact.bucket_length(101), 101);
    }

    #[test]
    fn pop_returns_rounded_length_and_round_trips() {
        let mut pool = ArrayPool::<u32>::new(BucketPolicy::RoundUp(100));
        pool.prewarm(256, 2);
        assert_eq!(pool.available(256), 2);

        let array = pool.pop(256);
        assert_eq!(array.len(), 300);
        pool.push(array).unwrap();
        assert_eq!(pool.available(256), 2);
        assert_eq!(pool.outstanding(256), 0);
    }

    #[test]
    fn empty_bucket_allocates_instead_of_failing() {
        let mut pool = ArrayPool::<u8>::new(BucketPolicy::Exact);
        let a = pool.pop(10);
        let b = pool.pop(10);
        assert_eq!(pool.outstanding(10), 2);
        pool.push(a).unwrap();
        pool.push(b).unwrap();
        assert_eq!(pool.available(10), 2);
    }

    #[test]
    fn foreign_length_is_rejected() {
        let mut rounded = ArrayPool::<u8>::new(BucketPolicy::RoundUp(100));
        let mut exact = ArrayPool::<u8>::new(BucketPolicy::Exact);
        let odd = exact.pop(37);
        let result = rounded.push(odd);
        assert!(matches!(result, Err(EngineError::UnknownArrayLength { length: 37 })));
    }

    #[test]
    fn known_length_without_outstanding_is_rejected() {
        let mut pool = ArrayPool::<u8>::new(BucketPolicy::Exact);
        let mut other = ArrayPool::<u8>::new(BucketPolicy::Exact);
        pool.prewarm(16, 1);
        let stray = other.pop(16);
        assert!(matches!(
            pool.push(stray),
            Err(EngineError::NothingBorrowed { .. })
        ));
    }
}
