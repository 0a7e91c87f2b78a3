//! Explicit work partitioning for the reduction benchmark.
//!
//! Each worker gets a contiguous range computed from (total, workers, index)
//! rather than anything derived from a thread handle's runtime identity.

use std::ops::Range;

/// Contiguous slice of `0..total` owned by worker `index` out of `workers`.
///
/// The first `total % workers` workers take one extra item, so the ranges
/// cover `0..total` exactly with no overlap. `index` must be below
/// `workers` and `workers` must be non-zero.
pub fn partition(total: usize, workers: usize, index: usize) -> Range<usize> {
    debug_assert!(workers > 0, "workers must be > 0");
    debug_assert!(index < workers, "index out of range");
    let base = total / workers;
    let extra = total % workers;
    // Workers below `extra` own base+1 items; the rest own base.
    let start = index * base + index.min(extra);
    let len = base + usize::from(index < extra);
    start..start + len
}
