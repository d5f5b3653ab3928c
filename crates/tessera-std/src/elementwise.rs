//! Thin per-element algorithms. Most are a single flat kernel; the engines
//! compose with them (flag computation and compaction in reduce-by-key),
//! and `transform_if` itself composes a mask scan with a scatter.
//!
//! Empty input is always a defined no-op: the output is left untouched and
//! no kernel is submitted.

use num_traits::FromPrimitive;
use tessera_runtime::{Context, ScatterView};

use crate::error::{Error, ensure_output_fits, ensure_same_length};
use crate::scan::exclusive_scan;

const MASK_SLOT: usize = 20;
const OFFSETS_SLOT: usize = 21;
const ROTATE_SLOT: usize = 22;

/// Work-group size used to chunk contiguous element-wise kernels.
fn chunk_size(ctx: &Context, n: usize) -> usize {
    ctx.nd_range(n).local
}

/// Set every element of `output` to `value`.
pub fn fill<T>(ctx: &mut Context, output: &mut [T], value: T)
where
    T: Clone + Send + Sync,
{
    if output.is_empty() {
        return;
    }
    let size = chunk_size(ctx, output.len());
    ctx.queue().dispatch_chunks("fill", output, size, |_, chunk| {
        for out in chunk.iter_mut() {
            *out = value.clone();
        }
    });
}

/// Write `init + i` to `output[i]`.
///
/// # Panics
/// Panics if an index is not representable in `T`.
pub fn iota<T>(ctx: &mut Context, output: &mut [T], init: T)
where
    T: FromPrimitive + core::ops::Add<Output = T> + Clone + Send + Sync,
{
    if output.is_empty() {
        return;
    }
    let size = chunk_size(ctx, output.len());
    ctx.queue().dispatch_chunks("iota", output, size, |group_id, chunk| {
        let base = group_id * size;
        for (i, out) in chunk.iter_mut().enumerate() {
            let index = T::from_usize(base + i).expect("index must be representable in T");
            *out = init.clone() + index;
        }
    });
}

/// Copy `input` into `output`.
pub fn copy<T>(ctx: &mut Context, input: &[T], output: &mut [T]) -> Result<(), Error>
where
    T: Clone + Send + Sync,
{
    ensure_same_length(input.len(), output.len())?;
    if input.is_empty() {
        return Ok(());
    }
    let size = chunk_size(ctx, input.len());
    ctx.queue().dispatch_chunks("copy", output, size, |group_id, chunk| {
        let base = group_id * size;
        chunk.clone_from_slice(&input[base..base + chunk.len()]);
    });
    Ok(())
}

/// `output[i] = op(input[i])`.
pub fn transform<A, B, F>(
    ctx: &mut Context,
    input: &[A],
    output: &mut [B],
    op: F,
) -> Result<(), Error>
where
    A: Sync,
    B: Send,
    F: Fn(&A) -> B + Sync,
{
    ensure_same_length(input.len(), output.len())?;
    if input.is_empty() {
        return Ok(());
    }
    let size = chunk_size(ctx, input.len());
    ctx.queue()
        .dispatch_chunks("transform", output, size, |group_id, chunk| {
            let base = group_id * size;
            for (i, out) in chunk.iter_mut().enumerate() {
                *out = op(&input[base + i]);
            }
        });
    Ok(())
}

/// `output[i] = op(input1[i], input2[i])`.
pub fn transform_binary<A1, A2, B, F>(
    ctx: &mut Context,
    input1: &[A1],
    input2: &[A2],
    output: &mut [B],
    op: F,
) -> Result<(), Error>
where
    A1: Sync,
    A2: Sync,
    B: Send,
    F: Fn(&A1, &A2) -> B + Sync,
{
    ensure_same_length(input1.len(), input2.len())?;
    ensure_same_length(input1.len(), output.len())?;
    if input1.is_empty() {
        return Ok(());
    }
    let size = chunk_size(ctx, input1.len());
    ctx.queue()
        .dispatch_chunks("transform_binary", output, size, |group_id, chunk| {
            let base = group_id * size;
            for (i, out) in chunk.iter_mut().enumerate() {
                *out = op(&input1[base + i], &input2[base + i]);
            }
        });
    Ok(())
}

/// `output[i] = input[map[i]]`.
pub fn gather<T>(
    ctx: &mut Context,
    map: &[u32],
    input: &[T],
    output: &mut [T],
) -> Result<(), Error>
where
    T: Clone + Send + Sync,
{
    ensure_same_length(map.len(), output.len())?;
    if map.is_empty() {
        return Ok(());
    }
    let size = chunk_size(ctx, map.len());
    ctx.queue().dispatch_chunks("gather", output, size, |group_id, chunk| {
        let base = group_id * size;
        for (i, out) in chunk.iter_mut().enumerate() {
            *out = input[map[base + i] as usize].clone();
        }
    });
    Ok(())
}

/// `output[map[i]] = input[i]` for every `i` where `predicate(&stencil[i])`
/// holds.
///
/// Destinations of selected elements must be distinct within one call.
pub fn scatter_if<T, S, P>(
    ctx: &mut Context,
    input: &[T],
    map: &[u32],
    stencil: &[S],
    output: &mut [T],
    predicate: P,
) -> Result<(), Error>
where
    T: Clone + Send + Sync,
    S: Sync,
    P: Fn(&S) -> bool + Sync,
{
    ensure_same_length(input.len(), map.len())?;
    ensure_same_length(input.len(), stencil.len())?;
    let n = input.len();
    if n == 0 {
        return Ok(());
    }
    let nd = ctx.nd_range(n);
    let view = ScatterView::new(output);
    ctx.queue().dispatch("scatter_if", nd, |global_id| {
        if global_id >= n {
            return;
        }
        if predicate(&stencil[global_id]) {
            view.write(map[global_id] as usize, input[global_id].clone());
        }
    });
    Ok(())
}

/// Compact `function(input[i])` for every `i` where `predicate(&stencil[i])`
/// holds into the front of `output`, preserving input order. Returns the
/// number of elements written.
///
/// A mask of the stencil is exclusive-plus-scanned to give every selected
/// element its destination, then a scatter pass writes them. `output` must
/// hold the selected count, checked before the scatter.
pub fn transform_if<A, B, S, F, P>(
    ctx: &mut Context,
    input: &[A],
    stencil: &[S],
    output: &mut [B],
    function: F,
    predicate: P,
) -> Result<usize, Error>
where
    A: Sync,
    B: Send + Sync,
    S: Sync,
    F: Fn(&A) -> B + Sync,
    P: Fn(&S) -> bool + Sync,
{
    ensure_same_length(input.len(), stencil.len())?;
    let n = input.len();
    if n == 0 {
        return Ok(0);
    }
    let (mut mask, mut offsets) = {
        let (_, arena) = ctx.launch_parts();
        let mask = arena.take::<usize>(MASK_SLOT, n, 0)?;
        let offsets = arena.take::<usize>(OFFSETS_SLOT, n, 0)?;
        (mask, offsets)
    };
    transform(ctx, stencil, &mut mask, |s| predicate(s) as usize)?;
    exclusive_scan(ctx, &mask, &mut offsets, 0, |a, b| a + b)?;
    let copied = offsets[n - 1] + mask[n - 1];
    if copied > 0 {
        ensure_output_fits(output.len(), copied)?;
        let nd = ctx.nd_range(n);
        let view = ScatterView::new(output);
        ctx.queue().dispatch("transform_if", nd, |global_id| {
            if global_id >= n {
                return;
            }
            if predicate(&stencil[global_id]) {
                view.write(offsets[global_id], function(&input[global_id]));
            }
        });
    }
    let (_, arena) = ctx.launch_parts();
    arena.recycle(mask);
    arena.recycle(offsets);
    Ok(copied)
}

/// [`transform_if`] with the identity function: stream compaction.
pub fn copy_if<T, S, P>(
    ctx: &mut Context,
    input: &[T],
    stencil: &[S],
    output: &mut [T],
    predicate: P,
) -> Result<usize, Error>
where
    T: Clone + Send + Sync,
    S: Sync,
    P: Fn(&S) -> bool + Sync,
{
    transform_if(ctx, input, stencil, output, |x| x.clone(), predicate)
}

/// `output[i] = input[(i + middle) % n]`: the rotation that brings
/// `input[middle]` to the front.
///
/// # Panics
/// Panics if `middle > input.len()`.
pub fn rotate_copy<T>(
    ctx: &mut Context,
    input: &[T],
    middle: usize,
    output: &mut [T],
) -> Result<(), Error>
where
    T: Clone + Send + Sync,
{
    assert!(middle <= input.len(), "rotation point {middle} past the end");
    ensure_same_length(input.len(), output.len())?;
    let n = input.len();
    if n == 0 {
        return Ok(());
    }
    let size = chunk_size(ctx, n);
    ctx.queue()
        .dispatch_chunks("rotate_copy", output, size, |group_id, chunk| {
            let base = group_id * size;
            for (i, out) in chunk.iter_mut().enumerate() {
                let pos = base + i + middle;
                let rotated = if pos >= n { pos - n } else { pos };
                *out = input[rotated].clone();
            }
        });
    Ok(())
}

/// In-place rotation bringing `data[middle]` to the front, via an arena
/// temporary and a copy back.
///
/// # Panics
/// Panics if `middle > data.len()`.
pub fn rotate<T>(ctx: &mut Context, data: &mut [T], middle: usize) -> Result<(), Error>
where
    T: Clone + Send + Sync + 'static,
{
    assert!(middle <= data.len(), "rotation point {middle} past the end");
    if data.is_empty() || middle == 0 || middle == data.len() {
        return Ok(());
    }
    let mut temp = {
        let (_, arena) = ctx.launch_parts();
        arena.take::<T>(ROTATE_SLOT, data.len(), data[0].clone())?
    };
    rotate_copy(ctx, data, middle, &mut temp)?;
    copy(ctx, &temp, data)?;
    let (_, arena) = ctx.launch_parts();
    arena.recycle(temp);
    Ok(())
}

/// `output[0] = input[0]`, `output[i] = op(input[i], input[i-1])`.
pub fn adjacent_difference_by<T, F>(
    ctx: &mut Context,
    input: &[T],
    output: &mut [T],
    op: F,
) -> Result<(), Error>
where
    T: Clone + Send + Sync,
    F: Fn(&T, &T) -> T + Sync,
{
    ensure_same_length(input.len(), output.len())?;
    if input.is_empty() {
        return Ok(());
    }
    let size = chunk_size(ctx, input.len());
    ctx.queue()
        .dispatch_chunks("adjacent_difference", output, size, |group_id, chunk| {
            let base = group_id * size;
            for (i, out) in chunk.iter_mut().enumerate() {
                let pos = base + i;
                *out = if pos == 0 {
                    input[0].clone()
                } else {
                    op(&input[pos], &input[pos - 1])
                };
            }
        });
    Ok(())
}

/// [`adjacent_difference_by`] with subtraction.
pub fn adjacent_difference<T>(
    ctx: &mut Context,
    input: &[T],
    output: &mut [T],
) -> Result<(), Error>
where
    T: core::ops::Sub<Output = T> + Clone + Send + Sync,
{
    adjacent_difference_by(ctx, input, output, |a, b| a.clone() - b.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_runtime::{Device, DeviceProperties};

    fn tiny_ctx() -> Context {
        Context::with_device(Device::with_properties(DeviceProperties::new(2, 4, 4, 256)))
            .unwrap()
    }

    #[test]
    fn fill_and_iota_cover_the_range() {
        let mut ctx = tiny_ctx();
        let mut data = vec![0i32; 10];
        fill(&mut ctx, &mut data, 3);
        assert_eq!(data, vec![3; 10]);
        iota(&mut ctx, &mut data, 5);
        assert_eq!(data, (5..15).collect::<Vec<_>>());
    }

    #[test]
    fn transform_applies_per_element() {
        let mut ctx = tiny_ctx();
        let input: Vec<i32> = (0..11).collect();
        let mut output = vec![0i32; 11];
        transform(&mut ctx, &input, &mut output, |x| x * x).unwrap();
        assert_eq!(output, input.iter().map(|x| x * x).collect::<Vec<_>>());
    }

    #[test]
    fn gather_follows_the_index_map() {
        let mut ctx = tiny_ctx();
        let input = vec![10, 20, 30, 40];
        let map = vec![3u32, 0, 2, 1, 3];
        let mut output = vec![0; 5];
        gather(&mut ctx, &map, &input, &mut output).unwrap();
        assert_eq!(output, vec![40, 10, 30, 20, 40]);
    }

    #[test]
    fn scatter_if_writes_only_selected_elements() {
        let mut ctx = tiny_ctx();
        let input = vec![1, 2, 3, 4];
        let map = vec![2u32, 0, 1, 0];
        let stencil = vec![1u32, 0, 1, 0];
        let mut output = vec![-1; 3];
        scatter_if(&mut ctx, &input, &map, &stencil, &mut output, |s| *s != 0).unwrap();
        assert_eq!(output, vec![-1, 3, 1]);
    }

    #[test]
    fn transform_if_compacts_in_input_order() {
        let mut ctx = tiny_ctx();
        let input: Vec<i32> = (1..=10).collect();
        let stencil = input.clone();
        let mut output = vec![0i32; 10];
        let n = transform_if(&mut ctx, &input, &stencil, &mut output, |x| x * 10, |s| {
            s % 2 == 0
        })
        .unwrap();
        assert_eq!(n, 5);
        assert_eq!(&output[..n], &[20, 40, 60, 80, 100]);
    }

    #[test]
    fn transform_if_with_nothing_selected_writes_nothing() {
        let mut ctx = tiny_ctx();
        let input = vec![1, 2, 3];
        let mut output = vec![-1; 3];
        let n = transform_if(&mut ctx, &input, &input, &mut output, |x| *x, |_| false)
            .unwrap();
        assert_eq!(n, 0);
        assert_eq!(output, vec![-1, -1, -1]);
    }

    #[test]
    fn transform_if_rejects_an_undersized_output() {
        let mut ctx = tiny_ctx();
        let input = vec![1, 2, 3, 4];
        let mut output = vec![0; 2];
        let err = transform_if(&mut ctx, &input, &input, &mut output, |x| *x, |_| true)
            .unwrap_err();
        assert_eq!(err, Error::OutputTooSmall { provided: 2, required: 4 });
    }

    #[test]
    fn copy_if_filters_by_the_stencil() {
        let mut ctx = tiny_ctx();
        let input = vec![10, 20, 30, 40, 50];
        let stencil = vec![1u32, 0, 1, 0, 1];
        let mut output = vec![0; 5];
        let n = copy_if(&mut ctx, &input, &stencil, &mut output, |s| *s != 0).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&output[..n], &[10, 30, 50]);
    }

    #[test]
    fn rotate_copy_brings_middle_to_front() {
        let mut ctx = tiny_ctx();
        let input = vec![1, 2, 3, 4, 5];
        let mut output = vec![0; 5];
        rotate_copy(&mut ctx, &input, 2, &mut output).unwrap();
        assert_eq!(output, vec![3, 4, 5, 1, 2]);
    }

    #[test]
    fn rotate_matches_the_std_rotation() {
        let mut ctx = tiny_ctx();
        let mut data: Vec<i32> = (0..11).collect();
        let mut expected = data.clone();
        expected.rotate_left(4);
        rotate(&mut ctx, &mut data, 4).unwrap();
        assert_eq!(data, expected);
        // Degenerate rotation points are no-ops.
        rotate(&mut ctx, &mut data, 0).unwrap();
        let len = data.len();
        rotate(&mut ctx, &mut data, len).unwrap();
        assert_eq!(data, expected);
    }

    #[test]
    fn adjacent_difference_keeps_the_first_element() {
        let mut ctx = tiny_ctx();
        let input = vec![4i32, 7, 2, 9];
        let mut output = vec![0i32; 4];
        adjacent_difference(&mut ctx, &input, &mut output).unwrap();
        assert_eq!(output, vec![4, 3, -5, 7]);
    }

    #[test]
    fn empty_inputs_are_no_ops() {
        let mut ctx = tiny_ctx();
        let empty: Vec<i32> = Vec::new();
        let mut out: Vec<i32> = Vec::new();
        copy(&mut ctx, &empty, &mut out).unwrap();
        transform(&mut ctx, &empty, &mut out, |x| *x).unwrap();
        adjacent_difference(&mut ctx, &empty, &mut out).unwrap();
        fill(&mut ctx, &mut out, 1);
    }
}
