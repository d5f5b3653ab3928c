//! Reduce-by-key engine: segmented reduction by composition.
//!
//! Runs of consecutive equal keys are compressed to one key and the fold of
//! the run's values. Five stages, each one full pass over the input:
//! head-flag computation, tail-flag computation, a segmented inclusive scan
//! of the values (reset at segment heads), an exclusive plus-scan of the
//! tail flags giving every element its destination segment, and two masked
//! scatters compacting keys and folded values.

use tessera_runtime::{Context, ScatterView};

use crate::descriptor::compute_mapscan_descriptor;
use crate::elementwise::{scatter_if, transform_binary};
use crate::error::{Error, ensure_output_fits, ensure_same_length};
use crate::mapscan::buffer_mapscan;
use crate::scan::exclusive_scan;

const HEAD_SLOT: usize = 0;
const TAIL_SLOT: usize = 1;
const SCANNED_TAIL_SLOT: usize = 2;
const PAIRS_SLOT: usize = 0;
const SCANNED_PAIRS_SLOT: usize = 1;

/// Segmented reduction with explicit key equality and value fold.
///
/// Returns the number of segments `N`; `keys_output[..N]` holds one key per
/// run and `values_output[..N]` the fold of that run's values under
/// `binary_op`. Both outputs must hold at least `keys.len()` elements, the
/// worst case of all-distinct keys; this is checked before any kernel is
/// submitted. Empty input returns 0 with the outputs untouched.
pub fn reduce_by_key_by<K, V, P, Op>(
    ctx: &mut Context,
    keys: &[K],
    values: &[V],
    keys_output: &mut [K],
    values_output: &mut [V],
    binary_pred: P,
    binary_op: Op,
) -> Result<usize, Error>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    P: Fn(&K, &K) -> bool + Sync,
    Op: Fn(V, V) -> V + Sync,
{
    ensure_same_length(keys.len(), values.len())?;
    let n = keys.len();
    if n == 0 {
        return Ok(0);
    }
    ensure_output_fits(keys_output.len(), n)?;
    ensure_output_fits(values_output.len(), n)?;

    // Stage 1: head_flags[i] = 1 iff key i starts a new segment.
    let mut head_flags = {
        let (_, arena) = ctx.launch_parts();
        arena.take::<u32>(HEAD_SLOT, n, 0)?
    };
    transform_binary(ctx, &keys[..n - 1], &keys[1..], &mut head_flags[1..], |a, b| {
        !binary_pred(a, b) as u32
    })?;
    head_flags[0] = 1;

    // Stage 2: tail_flags[i] = 1 iff key i ends its segment.
    let mut tail_flags = {
        let (_, arena) = ctx.launch_parts();
        arena.take::<u32>(TAIL_SLOT, n, 0)?
    };
    transform_binary(ctx, &keys[..n - 1], &keys[1..], &mut tail_flags[..n - 1], |a, b| {
        !binary_pred(a, b) as u32
    })?;
    tail_flags[n - 1] = 1;

    // Stage 3: segmented inclusive scan of (value, head_flag) pairs. The
    // combinator restarts the fold at every flagged element and carries an
    // OR of the flags seen so far.
    let seed = (values[0].clone(), 0u32);
    let (mut pairs, mut scanned_pairs) = {
        let (_, arena) = ctx.launch_parts();
        let pairs = arena.take::<(V, u32)>(PAIRS_SLOT, n, seed.clone())?;
        let scanned = arena.take::<(V, u32)>(SCANNED_PAIRS_SLOT, n, seed.clone())?;
        (pairs, scanned)
    };
    transform_binary(ctx, values, &head_flags, &mut pairs, |v, h| (v.clone(), *h))?;
    let tiling = compute_mapscan_descriptor(ctx.properties(), n, size_of::<(V, u32)>());
    buffer_mapscan(
        ctx,
        &pairs,
        &mut scanned_pairs,
        seed,
        &tiling,
        |p: &(V, u32)| p.clone(),
        |(acc_v, acc_t), (cur_v, cur_t)| {
            let value = if cur_t != 0 {
                cur_v
            } else {
                binary_op(acc_v, cur_v)
            };
            (value, acc_t | cur_t)
        },
    )?;

    // Stage 4: destination segment index of every element.
    let mut scanned_tail_flags = {
        let (_, arena) = ctx.launch_parts();
        arena.take::<u32>(SCANNED_TAIL_SLOT, n, 0)?
    };
    exclusive_scan(ctx, &tail_flags, &mut scanned_tail_flags, 0u32, |a, b| a + b)?;
    let nb_segments = scanned_tail_flags[n - 1] as usize + 1;

    // Stage 5: masked scatters. Each segment has exactly one head and one
    // tail, so the flagged destinations are distinct.
    scatter_if(
        ctx,
        keys,
        &scanned_tail_flags,
        &head_flags,
        keys_output,
        |flag| *flag != 0,
    )?;
    let nd = ctx.nd_range(n);
    let view = ScatterView::new(values_output);
    ctx.queue()
        .dispatch("reduce_by_key_scatter_values", nd, |global_id| {
            if global_id >= n {
                return;
            }
            if tail_flags[global_id] != 0 {
                let dest = scanned_tail_flags[global_id] as usize;
                view.write(dest, scanned_pairs[global_id].0.clone());
            }
        });

    let (_, arena) = ctx.launch_parts();
    arena.recycle(head_flags);
    arena.recycle(tail_flags);
    arena.recycle(scanned_tail_flags);
    arena.recycle(pairs);
    arena.recycle(scanned_pairs);
    Ok(nb_segments)
}

/// [`reduce_by_key_by`] with key equality via `==` and addition as the
/// value fold.
pub fn reduce_by_key<K, V>(
    ctx: &mut Context,
    keys: &[K],
    values: &[V],
    keys_output: &mut [K],
    values_output: &mut [V],
) -> Result<usize, Error>
where
    K: PartialEq + Clone + Send + Sync + 'static,
    V: core::ops::Add<Output = V> + Clone + Send + Sync + 'static,
{
    reduce_by_key_by(
        ctx,
        keys,
        values,
        keys_output,
        values_output,
        |a, b| a == b,
        |a, b| a + b,
    )
}
