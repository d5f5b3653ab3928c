//! Inclusive and exclusive scan entry points over the map-scan engine.

use tessera_runtime::Context;

use crate::descriptor::compute_mapscan_descriptor;
use crate::error::{Error, ensure_same_length};
use crate::mapscan::buffer_mapscan;

/// `output[i] = op(init, input[0] ⊕ ... ⊕ input[i])`.
///
/// Empty input is a no-op; no kernel is submitted.
pub fn inclusive_scan<T, R>(
    ctx: &mut Context,
    input: &[T],
    output: &mut [T],
    init: T,
    op: R,
) -> Result<(), Error>
where
    T: Clone + Send + Sync + 'static,
    R: Fn(T, T) -> T + Sync,
{
    ensure_same_length(input.len(), output.len())?;
    if input.is_empty() {
        return Ok(());
    }
    let tiling = compute_mapscan_descriptor(ctx.properties(), input.len(), size_of::<T>());
    buffer_mapscan(ctx, input, output, init, &tiling, |x: &T| x.clone(), op)
}

/// `output[0] = init`, `output[i] = op(init, input[0] ⊕ ... ⊕ input[i-1])`:
/// the inclusive scan shifted right by one, which the engine realizes by
/// scanning all but the last element into `output[1..]`.
pub fn exclusive_scan<T, R>(
    ctx: &mut Context,
    input: &[T],
    output: &mut [T],
    init: T,
    op: R,
) -> Result<(), Error>
where
    T: Clone + Send + Sync + 'static,
    R: Fn(T, T) -> T + Sync,
{
    ensure_same_length(input.len(), output.len())?;
    if input.is_empty() {
        return Ok(());
    }
    let n = input.len();
    let tiling = compute_mapscan_descriptor(ctx.properties(), n - 1, size_of::<T>());
    buffer_mapscan(
        ctx,
        &input[..n - 1],
        &mut output[1..],
        init.clone(),
        &tiling,
        |x: &T| x.clone(),
        op,
    )?;
    output[0] = init;
    Ok(())
}
