use num_traits::{Float, FromPrimitive};
use rand::Rng;

use super::{
    FillError, FillEstimator, OffsetFillProfile, check_output, layout_index, layout_len,
    offset_layout_len,
};
use crate::csr::CsrPattern;
use crate::sample::{SampledNonzero, SamplingMode, choose_nonzeros};
use crate::search::lower_bound;

/// Randomized fill estimator driven by uniform nonzero sampling.
///
/// For a uniformly sampled nonzero, `1/y` — with `y` the population of
/// the block containing it — is an unbiased estimate of that block's
/// contribution to the block count, so averaging `1/y` over samples and
/// scaling by `r·c` estimates the fill ratio. Each sample reads every
/// `y` it needs off a `(2B−1)²` neighborhood indicator reduced to its
/// 2-D prefix sum, making one sample cost `O(B²)` for all shapes at
/// once.
///
/// The sample count is derived from an accuracy target: with
/// probability at least `1 − delta`, every returned ratio has relative
/// error at most `epsilon`. Fewer samples are drawn without replacement
/// for the same target; when the budget reaches `nnz` the sweep is
/// exhaustive and the estimate coincides with the exact fill.
///
/// [`estimate`](FillEstimator::estimate) reports ratios for the block
/// grid anchored at the top-left corner;
/// [`estimate_with_offsets`](Self::estimate_with_offsets) additionally
/// enumerates every grid origin shift.
pub struct NeighborhoodSampling<R: Rng> {
    rng: R,
    epsilon: f64,
    delta: f64,
    mode: SamplingMode,
    verbose: bool,
}

impl<R: Rng> NeighborhoodSampling<R> {
    /// Estimator with relative error `epsilon` at confidence
    /// `1 - delta`, sampling without replacement.
    ///
    /// Both parameters must lie in `(0, 1]`; they are validated when an
    /// estimate is requested.
    pub fn new(rng: R, epsilon: f64, delta: f64) -> Self {
        Self {
            rng,
            epsilon,
            delta,
            mode: SamplingMode::WithoutReplacement,
            verbose: false,
        }
    }

    /// Switch the sampling mode.
    #[must_use]
    pub fn with_mode(mut self, mode: SamplingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Print the chosen sample size to stderr on each run. Diagnostic
    /// only; never changes the numeric output.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn check_params(&self) -> Result<(), FillError> {
        if !(self.epsilon > 0.0 && self.epsilon <= 1.0) {
            return Err(FillError::InvalidAccuracy(self.epsilon));
        }
        if !(self.delta > 0.0 && self.delta <= 1.0) {
            return Err(FillError::InvalidConfidence(self.delta));
        }
        Ok(())
    }

    /// Closed-form sample budget for the `(epsilon, delta)` target,
    /// clamped to `[1, nnz]`.
    ///
    /// Without replacement solves for the count whose variance matches
    /// the with-replacement target, which is what permits the smaller
    /// budget.
    fn sample_count(&self, max_dim: usize, nnz: usize) -> usize {
        let b = max_dim as f64;
        let n = nnz as f64;
        let t = 2.0 * (b / self.delta).ln() * b * b / (self.epsilon * self.epsilon);
        let s = match self.mode {
            SamplingMode::WithReplacement => t.ceil(),
            SamplingMode::WithoutReplacement => {
                ((t - t / n + (t * (t + (2.0 * t + t / n) / n + 4.0)).sqrt())
                    / (2.0 + 2.0 * t / n))
                    .ceil()
            }
        };
        if s.is_finite() && s < n { (s as usize).max(1) } else { nnz }
    }

    /// Estimate fill ratios for every shape and every grid origin
    /// offset `(o_r, o_c)`, `0 ≤ o_r < r`, `0 ≤ o_c < c`.
    ///
    /// An offset grid places block boundaries at rows congruent to
    /// `o_r` and columns congruent to `o_c` modulo the block shape.
    /// `fill` uses the layout of [`offset_layout_index`]: entries
    /// ordered by the nested iteration `r, c, o_r, o_c`, outermost to
    /// innermost.
    ///
    /// # Errors
    /// Same conditions as [`estimate`](FillEstimator::estimate), with
    /// the output length checked against [`offset_layout_len`].
    ///
    /// [`offset_layout_index`]: super::offset_layout_index
    pub fn estimate_with_offsets<F: Float + FromPrimitive>(
        &mut self,
        pattern: &CsrPattern<'_>,
        max_dim: usize,
        fill: &mut [F],
    ) -> Result<(), FillError> {
        self.check_params()?;
        check_output(fill, offset_layout_len(max_dim))?;
        if max_dim == 0 {
            return Ok(());
        }
        if pattern.is_empty() {
            fill.fill(F::one());
            return Ok(());
        }

        let budget = self.sample_count(max_dim, pattern.nnz());
        let samples = choose_nonzeros(pattern, budget, self.mode, &mut self.rng);
        let drawn = samples.len();
        if self.verbose {
            eprintln!(
                "neighborhood sampling (offsets): {drawn} of {} nonzeros",
                pattern.nnz()
            );
        }

        fill.fill(F::zero());
        let mut grid = Grid::new(max_dim);
        let mut strips = Strips::new(max_dim);
        for sample in &samples {
            grid.load(pattern, sample);
            grid.accumulate_offsets(sample, &mut strips, fill);
        }

        let drawn = F::from_usize(drawn).expect("sample count fits in a float");
        let mut idx = 0;
        for r in 1..=max_dim {
            for c in 1..=max_dim {
                let area = F::from_usize(r * c).expect("block area fits in a float");
                for _ in 0..r * c {
                    fill[idx] = fill[idx] * area / drawn;
                    idx += 1;
                }
            }
        }
        Ok(())
    }

    /// Allocate a buffer, run
    /// [`estimate_with_offsets`](Self::estimate_with_offsets), and wrap
    /// the result.
    ///
    /// # Errors
    /// Propagates the errors of
    /// [`estimate_with_offsets`](Self::estimate_with_offsets).
    pub fn offset_profile<F: Float + FromPrimitive>(
        &mut self,
        pattern: &CsrPattern<'_>,
        max_dim: usize,
    ) -> Result<OffsetFillProfile<F>, FillError> {
        let mut values = vec![F::zero(); offset_layout_len(max_dim)];
        self.estimate_with_offsets(pattern, max_dim, &mut values)?;
        Ok(OffsetFillProfile { max_dim, values })
    }
}

impl<F, R> FillEstimator<F> for NeighborhoodSampling<R>
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
        self.check_params()?;
        check_output(fill, layout_len(max_dim))?;
        if max_dim == 0 {
            return Ok(());
        }
        if pattern.is_empty() {
            fill.fill(F::one());
            return Ok(());
        }

        let budget = self.sample_count(max_dim, pattern.nnz());
        let samples = choose_nonzeros(pattern, budget, self.mode, &mut self.rng);
        let drawn = samples.len();
        if self.verbose {
            eprintln!("neighborhood sampling: {drawn} of {} nonzeros", pattern.nnz());
        }

        fill.fill(F::zero());
        let mut grid = Grid::new(max_dim);
        for sample in &samples {
            grid.load(pattern, sample);
            grid.accumulate_aligned(sample, fill);
        }

        let drawn = F::from_usize(drawn).expect("sample count fits in a float");
        for r in 1..=max_dim {
            for c in 1..=max_dim {
                let area = F::from_usize(r * c).expect("block area fits in a float");
                let idx = layout_index(max_dim, r, c);
                fill[idx] = fill[idx] * area / drawn;
            }
        }
        Ok(())
    }
}

/// Neighborhood indicator around one sample, reduced in place to its
/// 2-D prefix sum. Stored as a `2B × 2B` row-major grid whose row 0 and
/// column 0 stay zero, so any sub-rectangle population is one
/// inclusion-exclusion query.
struct Grid {
    b: usize,
    w: usize,
    z: Vec<u32>,
}

impl Grid {
    fn new(b: usize) -> Self {
        let w = 2 * b;
        Self { b, w, z: vec![0; w * w] }
    }

    #[inline]
    fn at(&self, r: usize, c: usize) -> u32 {
        self.z[r * self.w + c]
    }

    /// Mark the nonzeros of the `(2B−1)²` window centered on the
    /// sample, clipping at the matrix boundary, then prefix-sum. Cells
    /// outside the clipped scan stay zero, which keeps the queries
    /// below correct at the boundary without padding.
    fn load(&mut self, pattern: &CsrPattern<'_>, sample: &SampledNonzero) {
        self.z.fill(0);
        let b = self.b;
        let w = self.w;
        let (i, j) = (sample.row, sample.column);
        let ptr = pattern.ptr();
        let ind = pattern.ind();

        let row_lo = i.saturating_sub(b - 1);
        let row_hi = (i + b - 1).min(pattern.rows() - 1);
        let col_lo = j.saturating_sub(b - 1);
        let col_hi = (j + b - 1).min(pattern.cols() - 1);

        for ii in row_lo..=row_hi {
            let r = b + ii - i;
            let mut scan = lower_bound(ind, ptr[ii], ptr[ii + 1], col_lo);
            while scan < ptr[ii + 1] {
                let jj = ind[scan];
                if jj > col_hi {
                    break;
                }
                self.z[r * w + (b + jj - j)] = 1;
                scan += 1;
            }
        }

        for r in 1..w {
            for c in 1..w {
                self.z[r * w + c] += self.z[r * w + c - 1];
            }
        }
        for c in 1..w {
            for r in 1..w {
                self.z[r * w + c] += self.z[(r - 1) * w + c];
            }
        }
    }

    /// Add `1/y` for the aligned block of every shape containing the
    /// sample.
    fn accumulate_aligned<F: Float + FromPrimitive>(
        &self,
        sample: &SampledNonzero,
        fill: &mut [F],
    ) {
        let b = self.b;
        let (i, j) = (sample.row, sample.column);
        for r in 1..=b {
            let r_hi = b + r - 1 - i % r;
            let r_lo = r_hi - r;
            for c in 1..=b {
                let c_hi = b + c - 1 - j % c;
                let c_lo = c_hi - c;
                let y = (self.at(r_hi, c_hi) - self.at(r_hi, c_lo))
                    - (self.at(r_lo, c_hi) - self.at(r_lo, c_lo));
                debug_assert!(y >= 1, "a block containing the sample cannot be empty");
                let idx = layout_index(b, r, c);
                fill[idx] = fill[idx] + F::one() / F::from_u32(y).expect("block population fits in a float");
            }
        }
    }

    /// Add `1/y` for every `(r, c, o_r, o_c)` block containing the
    /// sample, writing in offset-layout order.
    ///
    /// Row strips difference the prefix grid once per offset residue
    /// (`y1`), column differences then finish each block population
    /// (`y2`); the residue `(i + row + 1 − B) mod r` of a strip's lower
    /// boundary identifies which offset grid it belongs to.
    fn accumulate_offsets<F: Float + FromPrimitive>(
        &self,
        sample: &SampledNonzero,
        strips: &mut Strips,
        fill: &mut [F],
    ) {
        let b = self.b;
        let w = self.w;
        let (i, j) = (sample.row, sample.column);
        let mut idx = 0;
        for r in 1..=b {
            for row in b..b + r {
                let o_r = (i + row + 1 - b) % r;
                for c in 0..w {
                    strips.y1[o_r * w + c] = self.at(row, c) - self.at(row - r, c);
                }
            }
            for cdim in 1..=b {
                for col in b..b + cdim {
                    let o_c = (j + col + 1 - b) % cdim;
                    for o_r in 0..r {
                        strips.y2[o_r * b + o_c] =
                            strips.y1[o_r * w + col] - strips.y1[o_r * w + col - cdim];
                    }
                }
                for o_r in 0..r {
                    for o_c in 0..cdim {
                        let y = strips.y2[o_r * b + o_c];
                        debug_assert!(y >= 1, "a block containing the sample cannot be empty");
                        fill[idx] = fill[idx]
                            + F::one() / F::from_u32(y).expect("block population fits in a float");
                        idx += 1;
                    }
                }
            }
        }
    }
}

/// Reusable offset-enumeration scratch: `y1` holds one row strip per
/// offset residue (`B × 2B`), `y2` one block population per offset pair
/// (`B × B`).
struct Strips {
    y1: Vec<u32>,
    y2: Vec<u32>,
}

impl Strips {
    fn new(b: usize) -> Self {
        Self { y1: vec![0; b * 2 * b], y2: vec![0; b * b] }
    }
}
