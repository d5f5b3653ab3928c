//! Execution context handed to every algorithm entry point.

use std::sync::Arc;

use crate::arena::ScratchArena;
use crate::device::{Device, DeviceProperties, NdRange};
use crate::error::RuntimeError;
use crate::queue::Queue;

/// The execution context: a queue bound to one device plus the scratch arena
/// reused across calls.
///
/// A context is `Send` but deliberately not shared: concurrent host threads
/// each create their own context so scratch buffers are never aliased
/// between unrelated calls.
#[derive(Debug)]
pub struct Context {
    queue: Queue,
    arena: ScratchArena,
}

impl Context {
    /// Context on the host device.
    pub fn host() -> Result<Self, RuntimeError> {
        Self::with_device(Device::host())
    }

    /// Context on a specific device.
    pub fn with_device(device: Device) -> Result<Self, RuntimeError> {
        let queue = Queue::new(Arc::new(device))?;
        Ok(Self {
            queue,
            arena: ScratchArena::new(),
        })
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn properties(&self) -> &DeviceProperties {
        self.queue.device().properties()
    }

    /// Launch shape for `size` logical work-items on this context's device.
    pub fn nd_range(&self, size: usize) -> NdRange {
        self.queue.device().calculate_nd_range(size)
    }

    /// Split the context into the queue and the scratch arena, so a kernel
    /// launch can borrow the queue while scratch buffers are checked out.
    pub fn launch_parts(&mut self) -> (&Queue, &mut ScratchArena) {
        (&self.queue, &mut self.arena)
    }
}
