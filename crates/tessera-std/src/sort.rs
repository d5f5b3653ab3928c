//! Sort engine: a bitonic network for power-of-two lengths and odd-even
//! block merge sort for everything else.
//!
//! Both variants express each round as one flat kernel launch; the queue
//! completing a launch is the barrier between rounds, since comparator
//! pairs and merge ranks cross work-group boundaries.

use tessera_runtime::{Context, NdRange, Queue, ScatterView};

use crate::elementwise::{transform, transform_binary};
use crate::error::{Error, ensure_same_length};

const TEMP_SLOT: usize = 18;
const PAIRS_SLOT: usize = 19;

/// Sort `data` in place so that `comp(&data[i], &data[j])` holds for every
/// `i < j` with distinguishable elements. `comp` must be a strict weak
/// ordering ("ordered before"). Lengths below 2 are a no-op.
pub fn sort_by<T, C>(ctx: &mut Context, data: &mut [T], comp: C) -> Result<(), Error>
where
    T: Clone + Send + Sync + 'static,
    C: Fn(&T, &T) -> bool + Sync,
{
    let n = data.len();
    if n < 2 {
        return Ok(());
    }
    if n.is_power_of_two() {
        bitonic_sort(ctx, data, &comp);
        Ok(())
    } else {
        merge_sort(ctx, data, &comp)
    }
}

/// [`sort_by`] with the natural `<` ordering.
pub fn sort<T>(ctx: &mut Context, data: &mut [T]) -> Result<(), Error>
where
    T: PartialOrd + Clone + Send + Sync + 'static,
{
    sort_by(ctx, data, |a, b| a < b)
}

/// Sort `keys` in place and apply the same permutation to `values`.
///
/// Keys and values are zipped into pairs, sorted by the key component only,
/// and unzipped again, so equal keys keep their values attached.
pub fn sort_by_key<K, V, C>(
    ctx: &mut Context,
    keys: &mut [K],
    values: &mut [V],
    comp: C,
) -> Result<(), Error>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    C: Fn(&K, &K) -> bool + Sync,
{
    ensure_same_length(keys.len(), values.len())?;
    let n = keys.len();
    if n < 2 {
        return Ok(());
    }
    let mut pairs = {
        let (_, arena) = ctx.launch_parts();
        arena.take::<(K, V)>(PAIRS_SLOT, n, (keys[0].clone(), values[0].clone()))?
    };
    transform_binary(ctx, keys, values, &mut pairs, |k, v| (k.clone(), v.clone()))?;
    sort_by(ctx, &mut pairs, |a, b| comp(&a.0, &b.0))?;
    transform(ctx, &pairs, keys, |p| p.0.clone())?;
    transform(ctx, &pairs, values, |p| p.1.clone())?;
    let (_, arena) = ctx.launch_parts();
    arena.recycle(pairs);
    Ok(())
}

/// In-place bitonic network. `data.len()` must be a power of two.
///
/// `log2(n)` stages of `stage + 1` passes each; every pass launches `n / 2`
/// comparators, so no pass needs synchronization finer than the launch.
fn bitonic_sort<T, C>(ctx: &mut Context, data: &mut [T], comp: &C)
where
    T: Clone + Send + Sync,
    C: Fn(&T, &T) -> bool + Sync,
{
    let n = data.len();
    let num_stages = n.trailing_zeros();
    let nd = ctx.nd_range(n / 2);
    let queue = ctx.queue();
    for stage in 0..num_stages {
        for pass in 0..=stage {
            bitonic_pass(queue, nd, data, comp, stage, pass);
        }
    }
}

/// One comparator pass. Each thread owns a disjoint element pair, so the
/// scatter writes never collide.
fn bitonic_pass<T, C>(
    queue: &Queue,
    nd: NdRange,
    data: &mut [T],
    comp: &C,
    stage: u32,
    pass: u32,
) where
    T: Clone + Send + Sync,
    C: Fn(&T, &T) -> bool + Sync,
{
    let nb_pairs = data.len() / 2;
    let pair_distance = 1usize << (stage - pass);
    let block_width = 2 * pair_distance;
    let same_direction_width = 1usize << stage;
    let view = ScatterView::new(data);
    queue.dispatch("bitonic_pass", nd, |thread_id| {
        if thread_id >= nb_pairs {
            return;
        }
        let left_id =
            (thread_id % pair_distance) + (thread_id / pair_distance) * block_width;
        let right_id = left_id + pair_distance;
        let left = view.read(left_id);
        let right = view.read(right_id);
        let ascending = (thread_id / same_direction_width) % 2 == 0;

        let (lesser, greater) = if comp(&left, &right) {
            (left, right)
        } else {
            (right, left)
        };
        if ascending {
            view.write(left_id, lesser);
            view.write(right_id, greater);
        } else {
            view.write(left_id, greater);
            view.write(right_id, lesser);
        }
    });
}

/// Odd-even block merge sort for arbitrary lengths. Sorted blocks double in
/// size every round; storage ping-pongs between `data` and an arena
/// temporary, with a final copy back when the last round lands in the
/// temporary.
fn merge_sort<T, C>(ctx: &mut Context, data: &mut [T], comp: &C) -> Result<(), Error>
where
    T: Clone + Send + Sync + 'static,
    C: Fn(&T, &T) -> bool + Sync,
{
    let n = data.len();
    let nd = ctx.nd_range(n);
    let (queue, arena) = ctx.launch_parts();
    let mut temp = arena.take::<T>(TEMP_SLOT, n, data[0].clone())?;

    let mut in_temp = false;
    let mut block_size = 1;
    while block_size < n {
        in_temp = !in_temp;
        if in_temp {
            merge_pass(queue, nd, data, &mut temp, comp, block_size);
        } else {
            merge_pass(queue, nd, &temp, data, comp, block_size);
        }
        block_size *= 2;
    }

    if in_temp {
        queue.dispatch_chunks("merge_sort_copy_back", data, nd.local, |group_id, chunk| {
            let base = group_id * nd.local;
            chunk.clone_from_slice(&temp[base..base + chunk.len()]);
        });
    }
    arena.recycle(temp);
    Ok(())
}

/// One merge round: every pair of adjacent `block_size` blocks is merged.
/// Each element binary-searches the paired block for its rank; elements of
/// the odd block additionally step past equal keys so duplicates land after
/// their even-block twins, which keeps equal-element runs stable across
/// rounds. Every thread computes a distinct output offset.
fn merge_pass<T, C>(
    queue: &Queue,
    nd: NdRange,
    input: &[T],
    output: &mut [T],
    comp: &C,
    block_size: usize,
) where
    T: Clone + Send + Sync,
    C: Fn(&T, &T) -> bool + Sync,
{
    let count = input.len();
    let view = ScatterView::new(output);
    queue.dispatch("merge_blocks", nd, |gid| {
        if gid >= count {
            return;
        }
        let my_key = input[gid].clone();
        let my_block_idx = gid / block_size;
        let my_block_is_odd = my_block_idx & 1 == 1;
        let other_block_idx = if my_block_is_odd {
            my_block_idx - 1
        } else {
            my_block_idx + 1
        };
        let my_block_start = (my_block_idx * block_size).min(count);
        let other_block_start = (other_block_idx * block_size).min(count);
        let other_block_end = ((other_block_idx + 1) * block_size).min(count);
        if other_block_start == count {
            // No partner block this round; the block passes through.
            view.write(gid, my_key);
            return;
        }

        // Rank of my_key within the partner block.
        let mut left_idx = other_block_start;
        let mut right_idx = other_block_end;
        while left_idx < right_idx {
            let mid_idx = (left_idx + right_idx) / 2;
            if comp(&input[mid_idx], &my_key) {
                left_idx = mid_idx + 1;
            } else {
                right_idx = mid_idx;
            }
        }

        // Odd-block elements step past keys equal to theirs, so that within
        // a merged run of equal keys the even block comes first.
        if my_block_is_odd {
            let mut right_idx = other_block_end;
            while left_idx < right_idx {
                let upper_key = &input[left_idx];
                if comp(upper_key, &my_key) || comp(&my_key, upper_key) {
                    break;
                }
                let mid_idx = (left_idx + right_idx) / 2;
                let mid_key = &input[mid_idx];
                if !comp(mid_key, &my_key) && !comp(&my_key, mid_key) {
                    left_idx = mid_idx + 1;
                } else {
                    left_idx += 1;
                    right_idx = mid_idx;
                }
            }
        }

        let offset = (gid - my_block_start)
            + (left_idx - other_block_start)
            + my_block_start.min(other_block_start);
        view.write(offset, my_key);
    });
}
