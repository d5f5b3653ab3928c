//! Parallel standard-library algorithms over the tessera device model.
//!
//! Every algorithm takes a [`Context`] and plain slices, plans a tiling from
//! the context's device capabilities and submits the work as kernels on the
//! context's queue. Three engines carry the library:
//!
//! - map-reduce ([`mapreduce`]): hierarchical fold, partial result per
//!   work-group, final fold on the host;
//! - map-scan ([`mapscan`]): three-kernel hierarchical inclusive prefix-scan;
//! - sort ([`sort`]): bitonic network for power-of-two lengths, odd-even
//!   block merge sort otherwise.
//!
//! [`reduce_by_key`] is built entirely out of the other pieces: flag
//! kernels, a segmented scan and masked scatters. The thin per-element
//! algorithms in [`elementwise`] round out the surface.
//!
//! ```
//! use tessera_runtime::Context;
//! use tessera_std::{inclusive_scan, reduce};
//!
//! let mut ctx = Context::host()?;
//! let input: Vec<u32> = (1..=100).collect();
//! let sum = reduce(&mut ctx, &input, 0, |a, b| a + b)?;
//! assert_eq!(sum, 5050);
//!
//! let mut prefix = vec![0u32; input.len()];
//! inclusive_scan(&mut ctx, &input, &mut prefix, 0, |a, b| a + b)?;
//! assert_eq!(prefix[99], 5050);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod descriptor;
pub mod elementwise;
mod error;
pub mod mapreduce;
pub mod mapscan;
pub mod reduce;
pub mod reduce_by_key;
pub mod scan;
pub mod sort;

pub use descriptor::{Tiling, TilingDescriptor, compute_mapreduce_descriptor, compute_mapscan_descriptor};
pub use elementwise::{
    adjacent_difference, adjacent_difference_by, copy, copy_if, fill, gather, iota, rotate,
    rotate_copy, scatter_if, transform, transform_binary, transform_if,
};
pub use error::Error;
pub use mapreduce::{buffer_map2reduce, buffer_mapreduce};
pub use mapscan::buffer_mapscan;
pub use reduce::{inner_product, reduce, transform_reduce};
pub use reduce_by_key::{reduce_by_key, reduce_by_key_by};
pub use scan::{exclusive_scan, inclusive_scan};
pub use sort::{sort, sort_by, sort_by_key};
