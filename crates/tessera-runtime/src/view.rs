//! Shared-write view for scatter-style kernels.
//!
//! Most launches hand each work-group an exclusive chunk, which safe Rust
//! expresses directly. Scatter kernels (masked compaction, the sort
//! networks) instead compute their destination index per work-item, so every
//! work-item of the launch needs write access to the whole output. The
//! accessor below makes that remote access explicit as `read`/`write` calls
//! rather than hiding it behind proxy objects.

use core::marker::PhantomData;

/// Mutable view over one buffer, shared by all work-items of a single
/// launch.
///
/// # Safety contract
///
/// The kernel using the view must guarantee that within one launch each
/// index is written by at most one work-item, and that no work-item reads an
/// index another work-item writes. All scatter kernels in `tessera-std`
/// write disjoint destinations (compaction targets are strictly increasing
/// per flagged element; sort comparators own their pair; merge ranks form a
/// permutation), which satisfies the contract.
pub struct ScatterView<'a, T> {
    ptr: *mut T,
    len: usize,
    marker: PhantomData<&'a mut [T]>,
}

unsafe impl<T: Send> Send for ScatterView<'_, T> {}
unsafe impl<T: Send + Sync> Sync for ScatterView<'_, T> {}

impl<'a, T> ScatterView<'a, T> {
    pub fn new(data: &'a mut [T]) -> Self {
        Self {
            ptr: data.as_mut_ptr(),
            len: data.len(),
            marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read the element at `index`.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn read(&self, index: usize) -> T
    where
        T: Clone,
    {
        assert!(index < self.len, "read out of bounds: {index} >= {}", self.len);
        // SAFETY: bounds checked above; the launch contract rules out a
        // concurrent write to the same index.
        unsafe { (*self.ptr.add(index)).clone() }
    }

    /// Write `value` to the element at `index`.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn write(&self, index: usize, value: T) {
        assert!(index < self.len, "write out of bounds: {index} >= {}", self.len);
        // SAFETY: bounds checked above; the launch contract makes this
        // work-item the only writer of `index`.
        unsafe { *self.ptr.add(index) = value };
    }
}
