//! Kernel queue: synchronous dispatch of work-groups onto host threads.
//!
//! Submission is blocking: every `dispatch_*` call returns only after all
//! work-groups of the launch have completed, which is the synchronization
//! point standing in for kernel-queue completion on a real device. There is
//! no inter-group synchronization inside one launch; multi-phase algorithms
//! split their phases into separate submissions.

use std::sync::Arc;

use rayon::prelude::*;

use crate::device::{Device, NdRange};
use crate::error::RuntimeError;

/// A synchronous kernel queue bound to one device. The thread pool holds one
/// worker per compute unit, so at most `max_compute_units` work-groups are
/// resident at a time.
pub struct Queue {
    device: Arc<Device>,
    pool: rayon::ThreadPool,
}

impl Queue {
    pub fn new(device: Arc<Device>) -> Result<Self, RuntimeError> {
        let units = device.properties().max_compute_units.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(units)
            .thread_name(|index| format!("tessera-wg-{index}"))
            .build()?;
        Ok(Self { device, pool })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Launch one work-group per element of `slots`. Each group receives
    /// exclusive access to its own output slot, the partial-result handoff
    /// used by the reduction engines.
    pub fn dispatch_groups<T, F>(&self, name: &str, slots: &mut [T], kernel: F)
    where
        T: Send,
        F: Fn(usize, &mut T) + Sync,
    {
        log::trace!("submit kernel={name} nb_work_group={}", slots.len());
        self.pool.install(|| {
            slots
                .par_iter_mut()
                .enumerate()
                .for_each(|(group_id, slot)| kernel(group_id, slot));
        });
    }

    /// Launch one work-group per contiguous chunk of `data`, each chunk
    /// holding `size_per_work_group` elements (the last one may be short).
    pub fn dispatch_chunks<T, F>(
        &self,
        name: &str,
        data: &mut [T],
        size_per_work_group: usize,
        kernel: F,
    ) where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync,
    {
        debug_assert!(size_per_work_group > 0);
        log::trace!(
            "submit kernel={name} size={} size_per_work_group={size_per_work_group}",
            data.len()
        );
        self.pool.install(|| {
            data.par_chunks_mut(size_per_work_group)
                .enumerate()
                .for_each(|(group_id, chunk)| kernel(group_id, chunk));
        });
    }

    /// Flat dispatch of `nd.global` work-items. The kernel sees its global
    /// id and guards its own upper bound, since the global size is rounded
    /// up to a work-group multiple.
    pub fn dispatch<F>(&self, name: &str, nd: NdRange, kernel: F)
    where
        F: Fn(usize) + Sync,
    {
        log::trace!(
            "submit kernel={name} global={} local={}",
            nd.global,
            nd.local
        );
        self.pool.install(|| {
            (0..nd.num_groups()).into_par_iter().for_each(|group_id| {
                let begin = group_id * nd.local;
                for global_id in begin..begin + nd.local {
                    kernel(global_id);
                }
            });
        });
    }

    /// Run a single sequential task, the cross-group phase of algorithms
    /// whose global step cannot be parallelized.
    pub fn single_task<F>(&self, name: &str, task: F)
    where
        F: FnOnce(),
    {
        log::trace!("submit kernel={name} single_task");
        task();
    }
}

impl core::fmt::Debug for Queue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Queue")
            .field("device", &self.device)
            .field("workers", &self.pool.current_num_threads())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceProperties;
    use rand::prelude::*;
    use rand::rngs::StdRng;

    fn queue() -> Queue {
        let device = Device::with_properties(DeviceProperties::new(2, 8, 8, 1024));
        Queue::new(Arc::new(device)).unwrap()
    }

    #[test]
    fn dispatch_groups_gives_each_group_its_slot() {
        let q = queue();
        let mut slots = vec![0usize; 5];
        q.dispatch_groups("test", &mut slots, |group_id, slot| *slot = group_id * 10);
        assert_eq!(slots, vec![0, 10, 20, 30, 40]);
    }

    #[test]
    fn dispatch_chunks_covers_the_whole_buffer() {
        let q = queue();
        let mut data = vec![0usize; 10];
        q.dispatch_chunks("test", &mut data, 4, |group_id, chunk| {
            for value in chunk.iter_mut() {
                *value = group_id;
            }
        });
        assert_eq!(data, vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2]);
    }

    #[test_log::test]
    fn chunked_dispatch_matches_a_sequential_transform() {
        let q = queue();
        let mut rng = StdRng::seed_from_u64(3);
        let input: Vec<i64> = (0..97).map(|_| rng.random_range(-100..100)).collect();
        let mut output = vec![0i64; 97];
        q.dispatch_chunks("test", &mut output, 8, |group_id, chunk| {
            let base = group_id * 8;
            for (i, out) in chunk.iter_mut().enumerate() {
                *out = input[base + i] * 3;
            }
        });
        let expected: Vec<i64> = input.iter().map(|x| x * 3).collect();
        assert_eq!(output, expected);
    }

    #[test]
    fn flat_dispatch_visits_every_id_below_bound() {
        let q = queue();
        let nd = q.device().calculate_nd_range(10);
        let hits: Vec<_> = (0..10).map(|_| std::sync::atomic::AtomicUsize::new(0)).collect();
        q.dispatch("test", nd, |id| {
            if id < 10 {
                hits[id].fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        });
        for hit in &hits {
            assert_eq!(hit.load(std::sync::atomic::Ordering::Relaxed), 1);
        }
    }
}
