//! Fill-ratio estimation for blocked sparse formats.
//!
//! Converting a CSR matrix into an aligned grid of `r × c` blocks (BCSR
//! and friends) stores every block that contains at least one explicit
//! nonzero densely. The **fill ratio** of a block shape is
//!
//! ```text
//! fill(r, c) = r · c · blocks(r, c) / nnz
//! ```
//!
//! where `blocks(r, c)` is the number of such nonempty blocks. An
//! autotuner wants this quantity for every candidate shape `1 ≤ r, c ≤ B`
//! without actually converting the matrix; the estimators in this module
//! produce exactly that, trading time for statistical accuracy:
//!
//! - [`Exact`] — walks the whole pattern per shape; the oracle.
//! - [`BlockRowCounts`] — one deterministic pass per row block size,
//!   optionally subsampling block rows.
//! - [`NeighborhoodSampling`] — samples nonzeros and reads block
//!   populations off a local prefix-sum grid, with `(ε, δ)` accuracy
//!   control and an optional grid-offset enumeration.
//!
//! All estimators write into a caller-owned slice using the layout fixed
//! by [`layout_index`] (and [`offset_layout_index`] for the offset
//! form); [`FillProfile`] is the owning convenience wrapper.

use std::ops::Index;

use num_traits::Float;
use thiserror::Error;

use crate::csr::CsrPattern;

mod block_rows;
mod exact;
mod neighborhood;

pub use block_rows::BlockRowCounts;
pub use exact::Exact;
pub use neighborhood::NeighborhoodSampling;

/// Why an estimation request was rejected. The output buffer is never
/// touched when one of these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FillError {
    /// The row-pointer array does not have `rows + 1` entries.
    #[error("row pointer array must have {expected} entries, found {found}")]
    PointerLength {
        /// `rows + 1`.
        expected: usize,
        /// Actual length supplied.
        found: usize,
    },
    /// The first row pointer is not zero.
    #[error("row pointer array must start at 0, found {found}")]
    PointerBase {
        /// Value of the first pointer.
        found: usize,
    },
    /// A row pointer decreases.
    #[error("row pointers decrease at row {row}")]
    NonMonotonePointers {
        /// First row whose pointer pair decreases.
        row: usize,
    },
    /// The final row pointer disagrees with the column array length.
    #[error("final row pointer declares {expected} nonzeros, column array holds {found}")]
    NonzeroCountMismatch {
        /// `ptr[rows]`.
        expected: usize,
        /// `ind.len()`.
        found: usize,
    },
    /// A column index falls outside the matrix.
    #[error("row {row} holds column {column}, outside a {cols}-column matrix")]
    ColumnOutOfBounds {
        /// Offending row.
        row: usize,
        /// Offending column index.
        column: usize,
        /// Logical column count.
        cols: usize,
    },
    /// A row's column indices are not strictly increasing.
    #[error("columns of row {row} are not strictly increasing")]
    UnsortedRow {
        /// Offending row.
        row: usize,
    },
    /// Accuracy `ε` outside `(0, 1]`.
    #[error("accuracy must lie in (0, 1], got {0}")]
    InvalidAccuracy(f64),
    /// Confidence parameter `δ` outside `(0, 1]`.
    #[error("confidence parameter must lie in (0, 1], got {0}")]
    InvalidConfidence(f64),
    /// Block-row examine probability outside `(0, 1]`.
    #[error("examine probability must lie in (0, 1], got {0}")]
    InvalidExamineProbability(f64),
    /// Output slice does not match the declared layout.
    #[error("output buffer must hold {expected} ratios, found {found}")]
    OutputLength {
        /// Required length for the layout.
        expected: usize,
        /// Actual slice length.
        found: usize,
    },
}

/// Length of the dense shape layout for a maximum block dimension.
#[inline]
pub fn layout_len(max_dim: usize) -> usize {
    max_dim * max_dim
}

/// Index of shape `(r, c)` in the dense layout, `1 ≤ r, c ≤ max_dim`.
#[inline]
pub fn layout_index(max_dim: usize, r: usize, c: usize) -> usize {
    debug_assert!(r >= 1 && r <= max_dim && c >= 1 && c <= max_dim);
    (r - 1) * max_dim + (c - 1)
}

/// Length of the offset-enumerating layout: `Σ r·c` over all shapes.
#[inline]
pub fn offset_layout_len(max_dim: usize) -> usize {
    let s = max_dim * (max_dim + 1) / 2;
    s * s
}

/// Index of `(r, c, o_r, o_c)` in the offset-enumerating layout.
///
/// Entries follow the nested iteration `r = 1..=max_dim`,
/// `c = 1..=max_dim`, `o_r = 0..r`, `o_c = 0..c`, outermost to
/// innermost.
#[inline]
pub fn offset_layout_index(max_dim: usize, r: usize, c: usize, o_r: usize, o_c: usize) -> usize {
    debug_assert!(r >= 1 && r <= max_dim && c >= 1 && c <= max_dim);
    debug_assert!(o_r < r && o_c < c);
    let s = max_dim * (max_dim + 1) / 2;
    (r - 1) * r / 2 * s + r * (c - 1) * c / 2 + o_r * c + o_c
}

/// Check an output slice against the expected layout length.
#[inline]
pub(crate) fn check_output<F>(fill: &[F], expected: usize) -> Result<(), FillError> {
    if fill.len() == expected {
        Ok(())
    } else {
        Err(FillError::OutputLength { expected, found: fill.len() })
    }
}

/// A fill-ratio estimator over all block shapes up to a maximum
/// dimension.
pub trait FillEstimator<F: Float> {
    /// Estimate `fill(r, c)` for every `1 ≤ r, c ≤ max_dim`, writing
    /// entry `(r, c)` at [`layout_index`]`(max_dim, r, c)` of `fill`.
    ///
    /// Every entry of `fill` is claimed: validation happens first and
    /// leaves the buffer untouched on error, after which the buffer is
    /// zeroed and overwritten. An empty pattern (no rows, no columns or
    /// no nonzeros) yields `1.0` everywhere; `max_dim == 0` expects an
    /// empty slice and writes nothing.
    ///
    /// # Errors
    /// [`FillError::OutputLength`] when `fill.len() != max_dim²`, plus
    /// any variant-specific parameter errors.
    fn estimate(
        &mut self,
        pattern: &CsrPattern<'_>,
        max_dim: usize,
        fill: &mut [F],
    ) -> Result<(), FillError>;

    /// Allocate a buffer, run [`estimate`](Self::estimate), and wrap the
    /// result.
    ///
    /// # Errors
    /// Propagates the errors of [`estimate`](Self::estimate).
    fn profile(
        &mut self,
        pattern: &CsrPattern<'_>,
        max_dim: usize,
    ) -> Result<FillProfile<F>, FillError>
    where
        Self: Sized,
    {
        let mut values = vec![F::zero(); layout_len(max_dim)];
        self.estimate(pattern, max_dim, &mut values)?;
        Ok(FillProfile { max_dim, values })
    }
}

/// Owned fill ratios for every shape `1 ≤ r, c ≤ max_dim`.
///
/// Indexable by `(r, c)`; renders as a table via
/// [`Display`](std::fmt::Display).
#[derive(Debug, Clone, PartialEq)]
pub struct FillProfile<F> {
    pub(crate) max_dim: usize,
    pub(crate) values: Vec<F>,
}

impl<F: Float> FillProfile<F> {
    /// Largest block dimension covered.
    #[inline]
    pub fn max_dim(&self) -> usize {
        self.max_dim
    }

    /// Fill ratio of shape `(r, c)`.
    #[inline]
    pub fn get(&self, r: usize, c: usize) -> F {
        self.values[layout_index(self.max_dim, r, c)]
    }

    /// Ratios in layout order.
    #[inline]
    pub fn values(&self) -> &[F] {
        &self.values
    }

    /// Iterate `((r, c), fill)` in layout order.
    pub fn shapes(&self) -> impl Iterator<Item = ((usize, usize), F)> + '_ {
        let b = self.max_dim;
        self.values
            .iter()
            .enumerate()
            .map(move |(idx, &v)| ((idx / b + 1, idx % b + 1), v))
    }

    /// Shape with the smallest fill ratio, if any; ties go to the
    /// earlier shape in layout order.
    pub fn best(&self) -> Option<((usize, usize), F)> {
        self.shapes().reduce(|best, cur| if cur.1 < best.1 { cur } else { best })
    }
}

impl<F: Float> Index<(usize, usize)> for FillProfile<F> {
    type Output = F;

    #[inline]
    fn index(&self, (r, c): (usize, usize)) -> &F {
        &self.values[layout_index(self.max_dim, r, c)]
    }
}

/// Owned fill ratios for every `(r, c, o_r, o_c)` in the
/// offset-enumerating layout.
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetFillProfile<F> {
    pub(crate) max_dim: usize,
    pub(crate) values: Vec<F>,
}

impl<F: Float> OffsetFillProfile<F> {
    /// Largest block dimension covered.
    #[inline]
    pub fn max_dim(&self) -> usize {
        self.max_dim
    }

    /// Fill ratio of shape `(r, c)` under grid offset `(o_r, o_c)`.
    #[inline]
    pub fn get(&self, r: usize, c: usize, o_r: usize, o_c: usize) -> F {
        self.values[offset_layout_index(self.max_dim, r, c, o_r, o_c)]
    }

    /// Ratios in layout order.
    #[inline]
    pub fn values(&self) -> &[F] {
        &self.values
    }
}

impl<F: Float> Index<(usize, usize, usize, usize)> for OffsetFillProfile<F> {
    type Output = F;

    #[inline]
    fn index(&self, (r, c, o_r, o_c): (usize, usize, usize, usize)) -> &F {
        &self.values[offset_layout_index(self.max_dim, r, c, o_r, o_c)]
    }
}
