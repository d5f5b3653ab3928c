//! Tiling planner: maps a logical problem size onto the work-group /
//! work-item hierarchy of a device.
//!
//! The planner only consumes the device capability surface, so the same
//! algorithm code retiles itself for any device shape. When a single
//! accumulator does not fit the local-memory budget no parallel plan exists,
//! and the planner returns the sequential variant instead of a descriptor
//! full of zeros; engines branch on the variant once, at their entry.

use tessera_runtime::DeviceProperties;

/// The partition plan of one engine invocation.
///
/// Invariants, for `size > 0`:
/// - `size_per_work_group * nb_work_group >= size`
/// - `size_per_work_group * (nb_work_group - 1) < size` (all groups but the
///   last are full)
/// - `nb_work_item * size_per_work_item >= size_per_work_group`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingDescriptor {
    /// Total number of elements.
    pub size: usize,
    /// Elements handled by one work-group (the last group may see fewer).
    pub size_per_work_group: usize,
    /// Elements handled by one work-item.
    pub size_per_work_item: usize,
    /// Number of work-groups.
    pub nb_work_group: usize,
    /// Work-items per work-group.
    pub nb_work_item: usize,
}

/// Outcome of planning: either a parallel partition or the instruction to
/// run the reference sequential path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tiling {
    /// No parallel plan exists (empty input, or one element exceeds the
    /// local-memory budget). Engines run their left-to-right reference path.
    Sequential {
        /// Total number of elements.
        size: usize,
    },
    /// A valid partition across the work-group hierarchy.
    Parallel(TilingDescriptor),
}

/// Plan a map-reduce invocation of `size` elements whose accumulators weigh
/// `elem_size` bytes.
///
/// The plan guarantees fewer groups than compute units, fewer work-items per
/// group than the device maximum, accumulator storage within the
/// local-memory budget, and that every work-group has work to do.
pub fn compute_mapreduce_descriptor(
    properties: &DeviceProperties,
    size: usize,
    elem_size: usize,
) -> Tiling {
    if size == 0 {
        return Tiling::Sequential { size: 0 };
    }
    let max_work_group = properties.max_compute_units;
    let max_work_item = properties.max_work_item();

    let nb_work_item = max_work_item
        .min(properties.local_mem_size / elem_size.max(1))
        .min(size);
    // nb_work_item == 0 iff one accumulator exceeds the local-memory budget.
    if nb_work_item == 0 {
        return Tiling::Sequential { size };
    }

    let nb_work_group = max_work_group.min(size.div_ceil(nb_work_item));
    let size_per_work_item = size.div_ceil(nb_work_item * nb_work_group);
    let size_per_work_group = size_per_work_item * nb_work_item;
    // Re-derive the group count so that every group except the last is full.
    let nb_work_group = size.div_ceil(size_per_work_group).max(1);

    let descriptor = TilingDescriptor {
        size,
        size_per_work_group,
        size_per_work_item,
        nb_work_group,
        nb_work_item,
    };
    log::debug!("mapreduce tiling: {descriptor:?}");
    Tiling::Parallel(descriptor)
}

/// Plan a map-scan invocation. The scan keeps a full work-group's elements
/// in local scratch, so the group size is bounded by the local-memory
/// budget; half the budget is kept free for the kernel's own needs.
///
/// Unlike map-reduce, the group count is not bounded by the number of
/// compute units: every group must fit its slice in local memory.
pub fn compute_mapscan_descriptor(
    properties: &DeviceProperties,
    size: usize,
    elem_size: usize,
) -> Tiling {
    if size == 0 {
        return Tiling::Sequential { size: 0 };
    }
    let size_per_work_group = size.min(properties.local_mem_size / 2 / elem_size.max(1));
    if size_per_work_group == 0 {
        return Tiling::Sequential { size };
    }

    let nb_work_group = size.div_ceil(size_per_work_group);
    let nb_work_item = properties.max_work_item().min(size_per_work_group);
    let size_per_work_item = size_per_work_group.div_ceil(nb_work_item);

    let descriptor = TilingDescriptor {
        size,
        size_per_work_group,
        size_per_work_item,
        nb_work_group,
        nb_work_item,
    };
    log::debug!("mapscan tiling: {descriptor:?}");
    Tiling::Parallel(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_invariants(descriptor: &TilingDescriptor) {
        let d = descriptor;
        assert!(d.nb_work_group >= 1, "{d:?}");
        assert!(d.size_per_work_group * d.nb_work_group >= d.size, "{d:?}");
        assert!(d.size_per_work_group * (d.nb_work_group - 1) < d.size, "{d:?}");
        assert!(d.nb_work_item * d.size_per_work_item >= d.size_per_work_group, "{d:?}");
    }

    fn devices() -> Vec<DeviceProperties> {
        vec![
            DeviceProperties::host(),
            DeviceProperties::new(1, 1, 1, 64),
            DeviceProperties::new(2, 4, 4, 64),
            DeviceProperties::new(4, 256, 256, 32 * 1024),
            DeviceProperties::new(64, 1024, 1024, 48 * 1024),
        ]
    }

    #[test]
    fn mapreduce_invariants_hold_across_shapes() {
        for props in devices() {
            for size in [1, 2, 3, 7, 64, 100, 1023, 1024, 1 << 16] {
                match compute_mapreduce_descriptor(&props, size, 8) {
                    Tiling::Parallel(d) => {
                        assert_eq!(d.size, size);
                        assert!(d.nb_work_group <= props.max_compute_units);
                        assert!(d.nb_work_item <= props.max_work_item());
                        check_invariants(&d);
                    }
                    Tiling::Sequential { size: s } => assert_eq!(s, size),
                }
            }
        }
    }

    #[test]
    fn mapscan_invariants_hold_across_shapes() {
        for props in devices() {
            for size in [1, 2, 3, 7, 64, 100, 1023, 1024, 1 << 16] {
                match compute_mapscan_descriptor(&props, size, 8) {
                    Tiling::Parallel(d) => {
                        assert_eq!(d.size, size);
                        // Group slice fits in half the local-memory budget.
                        assert!(d.size_per_work_group * 8 <= props.local_mem_size / 2);
                        assert!(d.nb_work_item <= props.max_work_item());
                        check_invariants(&d);
                    }
                    Tiling::Sequential { size: s } => assert_eq!(s, size),
                }
            }
        }
    }

    #[test]
    fn empty_input_degenerates() {
        let props = DeviceProperties::host();
        assert_eq!(
            compute_mapreduce_descriptor(&props, 0, 8),
            Tiling::Sequential { size: 0 }
        );
        assert_eq!(
            compute_mapscan_descriptor(&props, 0, 8),
            Tiling::Sequential { size: 0 }
        );
    }

    #[test]
    fn oversized_element_degenerates() {
        let props = DeviceProperties::new(4, 256, 256, 16);
        assert_eq!(
            compute_mapreduce_descriptor(&props, 10, 64),
            Tiling::Sequential { size: 10 }
        );
        assert_eq!(
            compute_mapscan_descriptor(&props, 10, 64),
            Tiling::Sequential { size: 10 }
        );
    }

    #[test]
    fn all_groups_but_last_are_full() {
        let props = DeviceProperties::new(4, 8, 8, 1024);
        if let Tiling::Parallel(d) = compute_mapreduce_descriptor(&props, 100, 4) {
            let full = d.size_per_work_group * (d.nb_work_group - 1);
            assert!(full < d.size);
            assert!(d.size_per_work_group * d.nb_work_group >= d.size);
        } else {
            panic!("expected a parallel plan");
        }
    }
}
