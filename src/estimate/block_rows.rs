use num_traits::{Float, FromPrimitive};
use rand::Rng;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::{FillError, FillEstimator, check_output, layout_index, layout_len};
use crate::csr::CsrPattern;

/// Deterministic per-block-row fill counter.
///
/// For each row block size `r` the matrix is split into `⌊rows/r⌋` full
/// block rows (a partial tail is ignored). One pass over a block row
/// marks, for every column block size `c` at once, which block columns
/// contain a nonzero in a `max_dim × cols` table; a second pass over the
/// same nonzeros resets the touched cells, keeping the work linear in
/// the nonzeros examined instead of the table size.
///
/// An examine probability `ρ < 1` turns the walk into a Bernoulli
/// subsample of block rows: each block row is examined with probability
/// `ρ`, and ratios are reported against the nonzeros actually examined.
/// `ρ` is a caller-supplied speed knob with no accuracy calibration
/// attached. With every block row skipped (or none eligible) a shape
/// reports `1.0`.
///
/// With the `rayon` feature the block-row loop runs in parallel; the
/// examine mask is drawn up front from the seeded generator and the
/// per-worker counts combine by summation, so the output is identical
/// to the sequential path.
#[derive(Clone)]
pub struct BlockRowCounts<R: Rng> {
    rng: R,
    examine_probability: f64,
}

impl<R: Rng> BlockRowCounts<R> {
    /// Counter that examines every full block row.
    pub fn new(rng: R) -> Self {
        Self { rng, examine_probability: 1.0 }
    }

    /// Examine each block row with probability `rho` instead of always.
    ///
    /// Validated at estimation time; values outside `(0, 1]` fail with
    /// [`FillError::InvalidExamineProbability`].
    #[must_use]
    pub fn with_examine_probability(mut self, rho: f64) -> Self {
        self.examine_probability = rho;
        self
    }
}

impl<F, R> FillEstimator<F> for BlockRowCounts<R>
where
    F: Float + FromPrimitive,
    R: Rng,
{
    fn estimate(
        &mut self,
        pattern: &CsrPattern<'_>,
        max_dim: usize,
        fill: &mut [F],
    ) -> Result<(), FillError> {
        let rho = self.examine_probability;
        if !(rho > 0.0 && rho <= 1.0) {
            return Err(FillError::InvalidExamineProbability(rho));
        }
        check_output(fill, layout_len(max_dim))?;
        if max_dim == 0 {
            return Ok(());
        }
        if pattern.is_empty() {
            fill.fill(F::one());
            return Ok(());
        }

        for r in 1..=max_dim {
            let full_blocks = pattern.rows() / r;
            // Drawn up front so the examined set is a function of the
            // seed alone, independent of loop scheduling.
            let mask: Option<Vec<bool>> = (rho < 1.0)
                .then(|| (0..full_blocks).map(|_| self.rng.gen_bool(rho)).collect());

            let (nb, nnz_est) =
                count_blocks(pattern, max_dim, r, full_blocks, mask.as_deref());

            for c in 1..=max_dim {
                let stored = nb[c - 1] * r as u64 * c as u64;
                fill[layout_index(max_dim, r, c)] = if nnz_est == 0 {
                    F::one()
                } else {
                    F::from_u64(stored).expect("stored count fits in a float")
                        / F::from_u64(nnz_est).expect("nonzero count fits in a float")
                };
            }
        }
        Ok(())
    }
}

/// Per-worker counting state: the block-column mark table for all `c`,
/// the running block counts, and the examined-nonzero tally.
struct Scratch {
    marks: Vec<bool>,
    nb: Vec<u64>,
    nnz: u64,
}

impl Scratch {
    fn new(max_dim: usize, cols: usize) -> Self {
        Self { marks: vec![false; max_dim * cols], nb: vec![0; max_dim], nnz: 0 }
    }
}

/// Count new blocks contributed by one full block row, then reset the
/// marks touched. `marks[(c - 1) * cols + J]` records block column `J`
/// of block size `c`.
fn scan_block_row(
    pattern: &CsrPattern<'_>,
    max_dim: usize,
    r: usize,
    block: usize,
    scratch: &mut Scratch,
) {
    let ptr = pattern.ptr();
    let ind = pattern.ind();
    let cols = pattern.cols();
    let top = block * r;
    let bottom = top + r;

    for i in top..bottom {
        for k in ptr[i]..ptr[i + 1] {
            let j = ind[k];
            for c in 1..=max_dim {
                let cell = (c - 1) * cols + j / c;
                if !scratch.marks[cell] {
                    scratch.marks[cell] = true;
                    scratch.nb[c - 1] += 1;
                }
            }
        }
    }
    scratch.nnz += (ptr[bottom] - ptr[top]) as u64;

    for i in top..bottom {
        for k in ptr[i]..ptr[i + 1] {
            let j = ind[k];
            for c in 1..=max_dim {
                scratch.marks[(c - 1) * cols + j / c] = false;
            }
        }
    }
}

#[cfg(not(feature = "rayon"))]
fn count_blocks(
    pattern: &CsrPattern<'_>,
    max_dim: usize,
    r: usize,
    full_blocks: usize,
    mask: Option<&[bool]>,
) -> (Vec<u64>, u64) {
    let mut scratch = Scratch::new(max_dim, pattern.cols());
    for block in 0..full_blocks {
        if mask.is_some_and(|m| !m[block]) {
            continue;
        }
        scan_block_row(pattern, max_dim, r, block, &mut scratch);
    }
    (scratch.nb, scratch.nnz)
}

#[cfg(feature = "rayon")]
fn count_blocks(
    pattern: &CsrPattern<'_>,
    max_dim: usize,
    r: usize,
    full_blocks: usize,
    mask: Option<&[bool]>,
) -> (Vec<u64>, u64) {
    (0..full_blocks)
        .into_par_iter()
        .filter(|&block| mask.is_none_or(|m| m[block]))
        .fold(
            || Scratch::new(max_dim, pattern.cols()),
            |mut scratch, block| {
                scan_block_row(pattern, max_dim, r, block, &mut scratch);
                scratch
            },
        )
        .map(|scratch| (scratch.nb, scratch.nnz))
        .reduce(
            || (vec![0; max_dim], 0),
            |(mut nb, nnz), (nb_other, nnz_other)| {
                for (a, b) in nb.iter_mut().zip(nb_other) {
                    *a += b;
                }
                (nb, nnz + nnz_other)
            },
        )
}

#[cfg(test)]
mod tests {
    use super::super::Exact;
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn rng(seed: u64) -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(seed)
    }

    /// 12×12 pattern with three nonzeros per row; 12 is divisible by
    /// every block size up to 4, so no partial tails exist.
    fn twelve() -> (Vec<usize>, Vec<usize>) {
        let mut ptr = vec![0];
        let mut ind = Vec::new();
        for i in 0..12 {
            let mut cols = [i, (i + 4) % 12, (i + 8) % 12];
            cols.sort_unstable();
            ind.extend_from_slice(&cols);
            ptr.push(ind.len());
        }
        (ptr, ind)
    }

    #[test]
    fn matches_exact_when_everything_is_examined() {
        let (ptr, ind) = twelve();
        let a = CsrPattern::new(12, 12, &ptr, &ind).unwrap();
        let exact: Vec<f64> = Exact.profile(&a, 4).unwrap().values().to_vec();
        let counted: Vec<f64> =
            BlockRowCounts::new(rng(1)).profile(&a, 4).unwrap().values().to_vec();
        assert_eq!(exact, counted);
    }

    #[test]
    fn unit_shape_is_one_under_subsampling() {
        let (ptr, ind) = twelve();
        let a = CsrPattern::new(12, 12, &ptr, &ind).unwrap();
        for seed in 0..5 {
            let fill: Vec<f64> = BlockRowCounts::new(rng(seed))
                .with_examine_probability(0.5)
                .profile(&a, 3)
                .unwrap()
                .values()
                .to_vec();
            assert_relative_eq!(fill[0], 1.0);
            for v in fill {
                assert!(v >= 1.0 - 1e-12);
            }
        }
    }

    #[test]
    fn subsampling_is_reproducible() {
        let (ptr, ind) = twelve();
        let a = CsrPattern::new(12, 12, &ptr, &ind).unwrap();
        let run = |seed| -> Vec<f64> {
            BlockRowCounts::new(rng(seed))
                .with_examine_probability(0.4)
                .profile(&a, 4)
                .unwrap()
                .values()
                .to_vec()
        };
        assert_eq!(run(9), run(9));
    }

    #[test]
    fn partial_tail_block_rows_are_skipped() {
        // Only row 4 has a nonzero; with r = 2 both full block rows are
        // empty, so (2, c) sees nothing and reports 1.0.
        let ptr = [0, 0, 0, 0, 0, 1];
        let ind = [0];
        let a = CsrPattern::new(5, 2, &ptr, &ind).unwrap();
        let fill: Vec<f64> = BlockRowCounts::new(rng(2)).profile(&a, 2).unwrap().values().to_vec();
        assert_relative_eq!(fill[0], 1.0);
        assert_relative_eq!(fill[1], 2.0);
        assert_relative_eq!(fill[2], 1.0);
        assert_relative_eq!(fill[3], 1.0);
    }

    #[test]
    fn empty_matrix_reports_identity() {
        let a = CsrPattern::new(3, 3, &[0, 0, 0, 0], &[]).unwrap();
        let fill: Vec<f64> = BlockRowCounts::new(rng(3)).profile(&a, 2).unwrap().values().to_vec();
        assert_eq!(fill, vec![1.0; 4]);
    }

    #[test]
    fn invalid_probability_is_rejected_without_writing() {
        let a = CsrPattern::new(2, 2, &[0, 1, 2], &[0, 1]).unwrap();
        let mut fill = [3.0f64; 4];
        let err = BlockRowCounts::new(rng(4))
            .with_examine_probability(0.0)
            .estimate(&a, 2, &mut fill);
        assert_eq!(err, Err(FillError::InvalidExamineProbability(0.0)));
        assert_eq!(fill, [3.0; 4]);

        let err = BlockRowCounts::new(rng(4))
            .with_examine_probability(1.5)
            .estimate(&a, 2, &mut fill);
        assert_eq!(err, Err(FillError::InvalidExamineProbability(1.5)));
        assert_eq!(fill, [3.0; 4]);
    }
}
