//! Reduction entry points over the map-reduce engine. These mirror the
//! sequential standard-library signatures so call sites can swap the
//! parallel and sequential versions freely.

use tessera_runtime::Context;

use crate::descriptor::compute_mapreduce_descriptor;
use crate::error::Error;
use crate::mapreduce::{buffer_map2reduce, buffer_mapreduce};

/// Fold `input` with `op`, seeded by `init`.
pub fn reduce<T, R>(ctx: &mut Context, input: &[T], init: T, op: R) -> Result<T, Error>
where
    T: Clone + Send + Sync + 'static,
    R: Fn(T, T) -> T + Sync,
{
    let tiling = compute_mapreduce_descriptor(ctx.properties(), input.len(), size_of::<T>());
    buffer_mapreduce(ctx, input, init, &tiling, |_, x: &T| x.clone(), op)
}

/// Fold `unary(input[i])` with `binary`, seeded by `init`.
pub fn transform_reduce<A, B, U, R>(
    ctx: &mut Context,
    input: &[A],
    init: B,
    unary: U,
    binary: R,
) -> Result<B, Error>
where
    A: Sync,
    B: Clone + Send + Sync + 'static,
    U: Fn(&A) -> B + Sync,
    R: Fn(B, B) -> B + Sync,
{
    let tiling = compute_mapreduce_descriptor(ctx.properties(), input.len(), size_of::<B>());
    buffer_mapreduce(ctx, input, init, &tiling, |_, x| unary(x), binary)
}

/// Fold `op2(a[i], b[i])` with `op1`, seeded by `init`.
pub fn inner_product<A1, A2, B, R1, R2>(
    ctx: &mut Context,
    input1: &[A1],
    input2: &[A2],
    init: B,
    op1: R1,
    op2: R2,
) -> Result<B, Error>
where
    A1: Sync,
    A2: Sync,
    B: Clone + Send + Sync + 'static,
    R1: Fn(B, B) -> B + Sync,
    R2: Fn(&A1, &A2) -> B + Sync,
{
    let tiling = compute_mapreduce_descriptor(ctx.properties(), input1.len(), size_of::<B>());
    buffer_map2reduce(ctx, input1, input2, init, &tiling, |_, a, b| op2(a, b), op1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_runtime::{Device, DeviceProperties};

    fn tiny_ctx() -> Context {
        Context::with_device(Device::with_properties(DeviceProperties::new(2, 4, 4, 64)))
            .unwrap()
    }

    #[test]
    fn reduce_sums_like_the_std_fold() {
        let mut ctx = tiny_ctx();
        let input: Vec<u64> = (1..=500).collect();
        let result = reduce(&mut ctx, &input, 0, |a, b| a + b).unwrap();
        assert_eq!(result, input.iter().sum());
    }

    #[test]
    fn transform_reduce_applies_the_unary_op() {
        let mut ctx = tiny_ctx();
        let input: Vec<i64> = (-50..50).collect();
        let result = transform_reduce(&mut ctx, &input, 0i64, |x| x.abs(), |a, b| a + b).unwrap();
        assert_eq!(result, input.iter().map(|x| x.abs()).sum());
    }

    #[test]
    fn inner_product_matches_the_zip_fold() {
        let mut ctx = tiny_ctx();
        let a: Vec<i64> = (0..77).collect();
        let b: Vec<i64> = (0..77).map(|i| i + 1).collect();
        let result =
            inner_product(&mut ctx, &a, &b, 0i64, |x, y| x + y, |x, y| x * y).unwrap();
        let expected: i64 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        assert_eq!(result, expected);
    }
}
