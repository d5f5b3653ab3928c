//! Device capability surface and launch shapes.
//!
//! The emulated device executes work-groups on host threads, but it still
//! advertises the capability limits a real accelerator would: a number of
//! compute units, a maximum work-group size and a local-memory budget. The
//! algorithm planners consume only these limits, so swapping in a device with
//! different numbers reshapes every tiling decision without touching the
//! algorithms.

use derive_new::new;

/// Default work-group size limit advertised by the host device.
pub const DEFAULT_MAX_WORK_GROUP_SIZE: usize = 256;

/// Default local-memory budget advertised by the host device, in bytes.
pub const DEFAULT_LOCAL_MEM_SIZE: usize = 32 * 1024;

/// Capability limits of the device executing kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct DeviceProperties {
    /// Number of compute units; one work-group executes per unit at a time.
    pub max_compute_units: usize,
    /// Maximum number of work-items per work-group.
    pub max_work_group_size: usize,
    /// Maximum work-item count along the first (and only) launch dimension.
    pub max_work_item_sizes: usize,
    /// Bytes of fast local memory available to one work-group.
    pub local_mem_size: usize,
}

impl DeviceProperties {
    /// Properties of the host device: one compute unit per hardware thread,
    /// conservative work-group and local-memory limits.
    pub fn host() -> Self {
        let units = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            max_compute_units: units,
            max_work_group_size: DEFAULT_MAX_WORK_GROUP_SIZE,
            max_work_item_sizes: DEFAULT_MAX_WORK_GROUP_SIZE,
            local_mem_size: DEFAULT_LOCAL_MEM_SIZE,
        }
    }

    /// Effective per-group work-item limit along the launch dimension.
    pub fn max_work_item(&self) -> usize {
        self.max_work_group_size.min(self.max_work_item_sizes)
    }
}

/// A compute device. Owns nothing but its advertised properties; the queue
/// holding the device owns the execution resources.
#[derive(Debug, Clone)]
pub struct Device {
    properties: DeviceProperties,
}

impl Device {
    /// The host device.
    pub fn host() -> Self {
        Self {
            properties: DeviceProperties::host(),
        }
    }

    /// A device with synthetic limits. Used to force specific tilings, e.g.
    /// a local-memory budget too small to hold a single element.
    pub fn with_properties(properties: DeviceProperties) -> Self {
        Self { properties }
    }

    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    /// Turn a logical element count into a launch shape respecting the
    /// device maxima. The global size is rounded up to a multiple of the
    /// work-group size; kernels guard their own upper bound.
    pub fn calculate_nd_range(&self, size: usize) -> NdRange {
        let local = self.properties.max_work_item().max(1);
        let global = size.div_ceil(local).max(1) * local;
        NdRange { global, local }
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::host()
    }
}

/// One-dimensional launch shape: `global` work-items split into work-groups
/// of `local` work-items. `global` is always a multiple of `local`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdRange {
    pub global: usize,
    pub local: usize,
}

impl NdRange {
    pub fn num_groups(&self) -> usize {
        self.global / self.local
    }
}
