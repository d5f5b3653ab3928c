//! Map-reduce engine: two-phase parallel fold.
//!
//! Phase one runs on the device: every work-item folds its strided slice of
//! the group's range left-to-right into a local accumulator, then the group
//! folds its accumulators (index 0 first) into one partial. Phase two runs
//! on the host: the partials are folded left-to-right starting from `init`.
//!
//! `reduce` is assumed associative. The result is guaranteed to equal the
//! sequential left-to-right fold only when `reduce` is also commutative (or
//! evaluation order is otherwise irrelevant); the sequential arm defines the
//! reference semantics, including per-index evaluation order of `map`.

use tessera_runtime::Context;

use crate::descriptor::{Tiling, TilingDescriptor};
use crate::error::{Error, ensure_same_length};

pub(crate) const PARTIALS_SLOT: usize = 16;

/// Fold `map(index, input[index])` over the whole input with `reduce`,
/// seeded by `init` (`map` is not applied to `init`).
pub fn buffer_mapreduce<A, B, M, R>(
    ctx: &mut Context,
    input: &[A],
    init: B,
    tiling: &Tiling,
    map: M,
    reduce: R,
) -> Result<B, Error>
where
    A: Sync,
    B: Clone + Send + Sync + 'static,
    M: Fn(usize, &A) -> B + Sync,
    R: Fn(B, B) -> B + Sync,
{
    let d = match tiling {
        // Reference semantics: strict left-to-right fold.
        Tiling::Sequential { .. } => {
            let mut acc = init;
            for (pos, value) in input.iter().enumerate() {
                acc = reduce(acc, map(pos, value));
            }
            return Ok(acc);
        }
        Tiling::Parallel(d) => d,
    };
    debug_assert_eq!(d.size, input.len());

    let (queue, arena) = ctx.launch_parts();
    let mut partials = arena.take(PARTIALS_SLOT, d.nb_work_group, init.clone())?;

    queue.dispatch_groups("mapreduce_partials", &mut partials, |group_id, slot| {
        *slot = group_partial(d, input, group_id, &map, &reduce);
    });

    // Final pass: fold the per-group partials in group order.
    let mut acc = init;
    for partial in partials.iter() {
        acc = reduce(acc, partial.clone());
    }
    let (_, arena) = ctx.launch_parts();
    arena.recycle(partials);
    Ok(acc)
}

/// Two-source variant: fold `map(index, input1[index], input2[index])`.
///
/// Both inputs must cover the same range; the check happens before any
/// kernel is submitted.
pub fn buffer_map2reduce<A1, A2, B, M, R>(
    ctx: &mut Context,
    input1: &[A1],
    input2: &[A2],
    init: B,
    tiling: &Tiling,
    map: M,
    reduce: R,
) -> Result<B, Error>
where
    A1: Sync,
    A2: Sync,
    B: Clone + Send + Sync + 'static,
    M: Fn(usize, &A1, &A2) -> B + Sync,
    R: Fn(B, B) -> B + Sync,
{
    ensure_same_length(input1.len(), input2.len())?;
    buffer_mapreduce(
        ctx,
        input1,
        init,
        tiling,
        |pos, a1| map(pos, a1, &input2[pos]),
        reduce,
    )
}

/// One work-group's partial: strided per-item folds into the local
/// accumulator buffer, then an in-order fold of the accumulators.
fn group_partial<A, B, M, R>(
    d: &TilingDescriptor,
    input: &[A],
    group_id: usize,
    map: &M,
    reduce: &R,
) -> B
where
    B: Clone,
    M: Fn(usize, &A) -> B,
    R: Fn(B, B) -> B,
{
    let group_begin = group_id * d.size_per_work_group;
    let group_end = ((group_id + 1) * d.size_per_work_group).min(d.size);
    debug_assert!(group_begin < group_end);

    // Local accumulator buffer, one slot per active work-item.
    let mut sums: Vec<B> = Vec::with_capacity(d.nb_work_item);
    for local_id in 0..d.nb_work_item {
        let local_pos = group_begin + local_id;
        if local_pos >= group_end {
            break;
        }
        // Peel the first iteration so `reduce` only ever combines mapped
        // values, never an artificial identity.
        let mut acc = map(local_pos, &input[local_pos]);
        let mut read = local_pos + d.nb_work_item;
        while read < group_end {
            acc = reduce(acc, map(read, &input[read]));
            read += d.nb_work_item;
        }
        sums.push(acc);
    }

    // Work-group barrier, then work-item 0 folds the accumulators in order.
    let mut iter = sums.into_iter();
    let mut acc = iter.next().expect("group ranges are never empty");
    for sum in iter {
        acc = reduce(acc, sum);
    }
    acc
}
