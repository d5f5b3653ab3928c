//! Reusable scratch storage owned by the execution context.
//!
//! Repeated calls into the algorithm engines need short-lived device-side
//! buffers (per-group partials, flag vectors, ping-pong storage). Instead of
//! hiding those in thread-local statics, the arena is an explicit object
//! passed by reference: buffers are checked out for the duration of one call
//! and recycled afterwards. Capacity grows by doubling and is kept across
//! calls; contents are not.
//!
//! Buffers are keyed by element type plus a caller-chosen slot index, so one
//! algorithm can hold several scratch buffers of the same type at once.

use core::any::{Any, TypeId};
use core::ops::{Deref, DerefMut};

use hashbrown::HashMap;

use crate::error::AllocError;

type SlotKey = (TypeId, usize);

/// Type-keyed scratch buffers with doubling capacity growth.
#[derive(Default)]
pub struct ScratchArena {
    slots: HashMap<SlotKey, Box<dyn Any + Send>>,
}

impl ScratchArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check out a scratch buffer of `len` elements initialized to `fill`.
    ///
    /// The buffer is removed from the arena while in use; call
    /// [`recycle`](Self::recycle) to return it so later calls reuse the
    /// allocation. If the current capacity is insufficient, the buffer grows
    /// to `max(len, 2 * capacity)` in a single reservation.
    pub fn take<T>(&mut self, slot: usize, len: usize, fill: T) -> Result<Scratch<T>, AllocError>
    where
        T: Clone + Send + 'static,
    {
        let key = (TypeId::of::<T>(), slot);
        let mut vec: Vec<T> = match self.slots.remove(&key) {
            Some(boxed) => *boxed.downcast().expect("slot key pins the element type"),
            None => Vec::new(),
        };
        vec.clear();
        if vec.capacity() < len {
            let target = len.max(vec.capacity() * 2);
            vec.try_reserve_exact(target).map_err(|_| AllocError {
                requested: len,
                bytes: target * core::mem::size_of::<T>(),
            })?;
        }
        vec.resize(len, fill);
        Ok(Scratch { key, vec })
    }

    /// Return a buffer to the arena so its allocation is reused.
    pub fn recycle<T>(&mut self, scratch: Scratch<T>)
    where
        T: Send + 'static,
    {
        self.slots.insert(scratch.key, Box::new(scratch.vec));
    }
}

impl core::fmt::Debug for ScratchArena {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScratchArena")
            .field("slots", &self.slots.len())
            .finish()
    }
}

/// A scratch buffer checked out of the arena. Dereferences to a slice.
pub struct Scratch<T> {
    key: SlotKey,
    vec: Vec<T>,
}

impl<T> Scratch<T> {
    pub fn capacity(&self) -> usize {
        self.vec.capacity()
    }
}

impl<T> Deref for Scratch<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.vec
    }
}

impl<T> DerefMut for Scratch<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.vec
    }
}
