//! Uniform selection of stored nonzeros.
//!
//! The randomized fill estimator works on a uniform sample of nonzero
//! *offsets* in `[0, nnz)`. Selection runs in `O(s)` expected time for
//! both modes, the chosen offsets are sorted ascending, and each one is
//! then located as a `(row, column)` pair with a single cursor walk over
//! the row-pointer array.

use std::collections::HashSet;

use rand::Rng;

use crate::csr::CsrPattern;
use crate::search::upper_bound;

/// Sampling strategy selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplingMode {
    /// Sample distinct offsets (default).
    WithoutReplacement,
    /// Sample independent offsets, repeats allowed.
    WithReplacement,
}

/// A stored nonzero located within the pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampledNonzero {
    /// Offset into the column-index array, in `[0, nnz)`.
    pub offset: usize,
    /// Row containing the offset.
    pub row: usize,
    /// Column index at the offset.
    pub column: usize,
}

/// Select `count` nonzeros of `pattern` uniformly at random, sorted by
/// offset.
///
/// `count` is clamped to `nnz`. When the clamped count equals `nnz` the
/// whole pattern is swept in order instead of drawing, for either mode.
/// Without replacement uses Floyd's algorithm, so no deduplication pass
/// is needed; with replacement draws independently and may repeat
/// offsets.
pub fn choose_nonzeros<R: Rng>(
    pattern: &CsrPattern<'_>,
    count: usize,
    mode: SamplingMode,
    rng: &mut R,
) -> Vec<SampledNonzero> {
    let nnz = pattern.nnz();
    let count = count.min(nnz);

    let mut offsets: Vec<usize> = if count == nnz {
        (0..nnz).collect()
    } else {
        match mode {
            SamplingMode::WithReplacement => {
                (0..count).map(|_| rng.gen_range(0..nnz)).collect()
            }
            SamplingMode::WithoutReplacement => {
                // Floyd: after the pass, `chosen` holds `count` distinct
                // values in [0, nnz).
                let mut chosen = HashSet::with_capacity(count);
                for j in nnz - count..nnz {
                    let t = rng.gen_range(0..=j);
                    if !chosen.insert(t) {
                        chosen.insert(j);
                    }
                }
                chosen.into_iter().collect()
            }
        }
    };
    offsets.sort_unstable();

    locate(pattern, &offsets)
}

/// Map sorted offsets to `(row, column)` pairs.
///
/// The row cursor only moves forward; it jumps via `upper_bound` on the
/// row-pointer array when the next offset leaves the current row, which
/// keeps total row-location work `O(s + rows)` amortized.
fn locate(pattern: &CsrPattern<'_>, offsets: &[usize]) -> Vec<SampledNonzero> {
    let ptr = pattern.ptr();
    let ind = pattern.ind();
    let rows = pattern.rows();

    let mut samples = Vec::with_capacity(offsets.len());
    let mut i = 0;
    for &k in offsets {
        if ptr[i + 1] <= k {
            i = upper_bound(ptr, i, rows, k) - 1;
        }
        samples.push(SampledNonzero { offset: k, row: i, column: ind[k] });
    }
    samples
}
