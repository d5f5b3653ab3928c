//! Emulated accelerator runtime for the tessera algorithm library.
//!
//! Models the two-level execution hierarchy of a data-parallel device:
//! work-groups dispatched onto a thread pool sized to the device's compute
//! units, work-items inside one group executed as sequential phase loops
//! separated where a real device would place local barriers. Algorithms see
//! the same surface a real backend would provide: device capability limits,
//! a synchronous kernel queue, an nd-range calculator and explicit scratch
//! storage.

mod arena;
mod context;
mod device;
mod error;
mod queue;
mod view;

pub use arena::{Scratch, ScratchArena};
pub use context::Context;
pub use device::{
    DEFAULT_LOCAL_MEM_SIZE, DEFAULT_MAX_WORK_GROUP_SIZE, Device, DeviceProperties, NdRange,
};
pub use error::{AllocError, RuntimeError};
pub use queue::Queue;
pub use view::ScatterView;
