//! Map-scan engine: hierarchical inclusive prefix-scan.
//!
//! Three kernel submissions, with queue completion as the inter-group
//! barrier between them:
//!
//! 1. Per-group scan. Inside one group, four phases separated by work-group
//!    barriers: copy mapped input into local scratch; each work-item scans
//!    its contiguous chunk in place; work-item 0 scans the chunk totals in
//!    place; every chunk but the first folds in its predecessor's total.
//! 2. A single sequential task turns the per-group totals into exclusive
//!    group prefixes, seeded by `init`.
//! 3. A parallel pass folds each group's prefix into all of its elements.
//!
//! The net effect is `output[i] = reduce(init, map(input[0]) ⊕ ... ⊕
//! map(input[i]))` for an associative `reduce`.

use tessera_runtime::Context;

use crate::descriptor::{Tiling, TilingDescriptor};
use crate::error::{Error, ensure_same_length};

pub(crate) const SCAN_SLOT: usize = 17;

/// Write the inclusive scan of `map(input)` under `reduce`, seeded by
/// `init`, into `output` (`map` is not applied to `init`).
pub fn buffer_mapscan<A, B, M, R>(
    ctx: &mut Context,
    input: &[A],
    output: &mut [B],
    init: B,
    tiling: &Tiling,
    map: M,
    reduce: R,
) -> Result<(), Error>
where
    A: Sync,
    B: Clone + Send + Sync + 'static,
    M: Fn(&A) -> B + Sync,
    R: Fn(B, B) -> B + Sync,
{
    ensure_same_length(input.len(), output.len())?;

    let d = match tiling {
        Tiling::Sequential { .. } => {
            // Reference semantics: plain left-to-right scan.
            let mut acc = init;
            for (pos, value) in input.iter().enumerate() {
                acc = reduce(acc, map(value));
                output[pos] = acc.clone();
            }
            return Ok(());
        }
        Tiling::Parallel(d) => d,
    };
    debug_assert_eq!(d.size, input.len());

    let (queue, arena) = ctx.launch_parts();

    // Kernel I: independent scan of every group's slice.
    queue.dispatch_chunks(
        "mapscan_local",
        output,
        d.size_per_work_group,
        |group_id, chunk| scan_group(d, input, group_id, chunk, &map, &reduce),
    );

    // Kernel II: exclusive prefix totals of the groups, sequential.
    let mut scan = arena.take(SCAN_SLOT, d.nb_work_group, init.clone())?;
    queue.single_task("mapscan_global", || {
        let mut acc = init;
        let mut global_pos = d.size_per_work_group - 1;
        for local_pos in 0..d.nb_work_group - 1 {
            scan[local_pos] = acc.clone();
            acc = reduce(acc, output[global_pos].clone());
            global_pos += d.size_per_work_group;
        }
        scan[d.nb_work_group - 1] = acc;
    });

    // Kernel III: fold each group's prefix into its elements.
    queue.dispatch_chunks(
        "mapscan_propagate",
        output,
        d.size_per_work_group,
        |group_id, chunk| {
            let acc = scan[group_id].clone();
            for value in chunk.iter_mut() {
                *value = reduce(acc.clone(), value.clone());
            }
        },
    );

    arena.recycle(scan);
    Ok(())
}

/// Kernel I body for one work-group: the four barrier-separated phases.
/// `chunk` is the group's slice of the output buffer.
fn scan_group<A, B, M, R>(
    d: &TilingDescriptor,
    input: &[A],
    group_id: usize,
    chunk: &mut [B],
    map: &M,
    reduce: &R,
) where
    B: Clone,
    M: Fn(&A) -> B,
    R: Fn(B, B) -> B,
{
    let group_begin = group_id * d.size_per_work_group;
    let local_size = chunk.len();

    // Phase 0: every work-item copies its strided share of the group's
    // slice into local scratch, applying `map` on the way.
    let mut scratch: Vec<B> = Vec::with_capacity(local_size);
    for local_pos in 0..local_size {
        scratch.push(map(&input[group_begin + local_pos]));
    }

    // -- work-group barrier --

    // Phase 1: every work-item scans its contiguous chunk in place.
    for local_id in 0..d.nb_work_item {
        let mut local_pos = local_id * d.size_per_work_item;
        let local_end = ((local_id + 1) * d.size_per_work_item).min(local_size);
        if local_pos < local_end {
            let mut acc = scratch[local_pos].clone();
            local_pos += 1;
            while local_pos < local_end {
                acc = reduce(acc, scratch[local_pos].clone());
                scratch[local_pos] = acc.clone();
                local_pos += 1;
            }
        }
    }

    // -- work-group barrier --

    // Phase 2: work-item 0 scans the last element of every chunk, leaving
    // chunk-prefix totals in place at those positions.
    let mut local_pos = d.size_per_work_item - 1;
    if local_pos < local_size {
        let mut acc = scratch[local_pos].clone();
        local_pos += d.size_per_work_item;
        while local_pos < local_size {
            acc = reduce(acc, scratch[local_pos].clone());
            scratch[local_pos] = acc.clone();
            local_pos += d.size_per_work_item;
        }
    }

    // -- work-group barrier --

    // Phase 3: every work-item except the first folds its predecessor
    // chunk's total into its own elements, sparing the last element which
    // already holds this chunk's prefix total. The carry is read once,
    // before any of the chunk's values are overwritten.
    for local_id in 1..d.nb_work_item {
        let mut local_pos = local_id * d.size_per_work_item;
        let local_end = ((local_id + 1) * d.size_per_work_item - 1).min(local_size);
        if local_pos < local_end {
            let carry = scratch[local_pos - 1].clone();
            while local_pos < local_end {
                scratch[local_pos] = reduce(carry.clone(), scratch[local_pos].clone());
                local_pos += 1;
            }
        }
    }

    // -- work-group barrier --

    // Phase 4: write back to the global output.
    for (out, value) in chunk.iter_mut().zip(scratch) {
        *out = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::compute_mapscan_descriptor;
    use tessera_runtime::{Device, DeviceProperties};

    fn ctx_with(props: DeviceProperties) -> Context {
        Context::with_device(Device::with_properties(props)).unwrap()
    }

    fn reference_scan(input: &[i64], init: i64) -> Vec<i64> {
        let mut acc = init;
        input
            .iter()
            .map(|x| {
                acc += x;
                acc
            })
            .collect()
    }

    #[test]
    fn matches_reference_scan_across_tilings() {
        let shapes = [
            DeviceProperties::new(2, 2, 2, 64),
            DeviceProperties::new(4, 4, 4, 256),
            DeviceProperties::host(),
        ];
        for props in shapes {
            for size in [1usize, 2, 3, 15, 16, 100, 1000] {
                let mut ctx = ctx_with(props);
                let input: Vec<i64> = (0..size as i64).map(|i| (i * 13) % 17 - 8).collect();
                let tiling = compute_mapscan_descriptor(ctx.properties(), size, 8);
                let mut output = vec![0i64; size];
                buffer_mapscan(&mut ctx, &input, &mut output, 0, &tiling, |x| *x, |a, b| {
                    a + b
                })
                .unwrap();
                assert_eq!(output, reference_scan(&input, 0), "size={size} props={props:?}");
            }
        }
    }

    #[test]
    fn init_seeds_every_element() {
        let mut ctx = ctx_with(DeviceProperties::new(2, 4, 4, 128));
        let input = vec![1i64; 10];
        let tiling = compute_mapscan_descriptor(ctx.properties(), input.len(), 8);
        let mut output = vec![0i64; 10];
        buffer_mapscan(&mut ctx, &input, &mut output, 100, &tiling, |x| *x, |a, b| a + b)
            .unwrap();
        assert_eq!(output, reference_scan(&input, 100));
    }

    #[test]
    fn map_is_applied_before_the_scan() {
        let mut ctx = ctx_with(DeviceProperties::new(2, 4, 4, 128));
        let input: Vec<i64> = (1..=20).collect();
        let tiling = compute_mapscan_descriptor(ctx.properties(), input.len(), 8);
        let mut output = vec![0i64; 20];
        buffer_mapscan(&mut ctx, &input, &mut output, 0, &tiling, |x| x * x, |a, b| a + b)
            .unwrap();
        let squares: Vec<i64> = input.iter().map(|x| x * x).collect();
        assert_eq!(output, reference_scan(&squares, 0));
    }

    #[test]
    fn length_mismatch_is_rejected_at_entry() {
        let mut ctx = ctx_with(DeviceProperties::host());
        let input = vec![1i64; 4];
        let mut output = vec![0i64; 3];
        let tiling = compute_mapscan_descriptor(ctx.properties(), input.len(), 8);
        let err = buffer_mapscan(&mut ctx, &input, &mut output, 0, &tiling, |x| *x, |a, b| {
            a + b
        })
        .unwrap_err();
        assert_eq!(err, Error::LengthMismatch { left: 4, right: 3 });
    }

    #[test]
    fn sequential_arm_matches_reference() {
        let mut ctx = ctx_with(DeviceProperties::host());
        let input: Vec<i64> = (0..50).collect();
        let mut output = vec![0i64; 50];
        let tiling = Tiling::Sequential { size: input.len() };
        buffer_mapscan(&mut ctx, &input, &mut output, 5, &tiling, |x| *x, |a, b| a + b)
            .unwrap();
        assert_eq!(output, reference_scan(&input, 5));
    }
}
