//! Read-only CSR pattern view.
//!
//! Fill estimation only looks at *where* the nonzeros are, never at their
//! values, so the input is a borrowed pattern: the row-pointer array and
//! the column-index array of a matrix in Compressed Sparse Row form.
//! Validation happens once, at construction; the estimators then rely on
//! the invariants without re-checking.

use crate::estimate::FillError;

/// Borrowed CSR sparsity pattern of an `rows × cols` matrix.
///
/// Invariants established by [`CsrPattern::new`]:
/// - `ptr.len() == rows + 1`, `ptr[0] == 0`, `ptr` non-decreasing,
///   `ptr[rows] == ind.len()`;
/// - `ind[ptr[i]..ptr[i + 1]]` is strictly increasing for every row `i`;
/// - every column index is `< cols`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CsrPattern<'a> {
    rows: usize,
    cols: usize,
    ptr: &'a [usize],
    ind: &'a [usize],
}

impl<'a> CsrPattern<'a> {
    /// Wrap and validate a CSR pattern.
    ///
    /// # Errors
    /// Returns a [`FillError`] describing the first violated invariant.
    pub fn new(
        rows: usize,
        cols: usize,
        ptr: &'a [usize],
        ind: &'a [usize],
    ) -> Result<Self, FillError> {
        if ptr.len() != rows + 1 {
            return Err(FillError::PointerLength {
                expected: rows + 1,
                found: ptr.len(),
            });
        }
        if ptr[0] != 0 {
            return Err(FillError::PointerBase { found: ptr[0] });
        }
        for i in 0..rows {
            if ptr[i] > ptr[i + 1] {
                return Err(FillError::NonMonotonePointers { row: i });
            }
        }
        if ptr[rows] != ind.len() {
            return Err(FillError::NonzeroCountMismatch {
                expected: ptr[rows],
                found: ind.len(),
            });
        }
        for i in 0..rows {
            let row = &ind[ptr[i]..ptr[i + 1]];
            for (t, &j) in row.iter().enumerate() {
                if j >= cols {
                    return Err(FillError::ColumnOutOfBounds {
                        row: i,
                        column: j,
                        cols,
                    });
                }
                if t > 0 && row[t - 1] >= j {
                    return Err(FillError::UnsortedRow { row: i });
                }
            }
        }
        Ok(Self { rows, cols, ptr, ind })
    }

    /// Logical row count.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Logical column count.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of explicitly stored nonzeros.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.ind.len()
    }

    /// True when there is nothing to estimate (no nonzeros, or a
    /// degenerate shape).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0 || self.ind.is_empty()
    }

    /// Row-pointer array, `rows + 1` entries, base 0.
    #[inline]
    pub fn ptr(&self) -> &'a [usize] {
        self.ptr
    }

    /// Column-index array, `nnz` entries.
    #[inline]
    pub fn ind(&self) -> &'a [usize] {
        self.ind
    }

    /// Column indices of row `i`, strictly increasing.
    #[inline]
    pub fn row(&self, i: usize) -> &'a [usize] {
        &self.ind[self.ptr[i]..self.ptr[i + 1]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_pattern() {
        let ptr = [0, 1, 2, 2, 4];
        let ind = [0, 3, 1, 2];
        let a = CsrPattern::new(4, 4, &ptr, &ind).unwrap();
        assert_eq!(a.rows(), 4);
        assert_eq!(a.cols(), 4);
        assert_eq!(a.nnz(), 4);
        assert!(!a.is_empty());
        assert_eq!(a.row(0), &[0]);
        assert_eq!(a.row(2), &[] as &[usize]);
        assert_eq!(a.row(3), &[1, 2]);
    }

    #[test]
    fn accepts_empty_matrix() {
        let ptr = [0, 0, 0, 0];
        let a = CsrPattern::new(3, 3, &ptr, &[]).unwrap();
        assert!(a.is_empty());
        assert_eq!(a.nnz(), 0);
    }

    #[test]
    fn rejects_wrong_pointer_length() {
        let ptr = [0, 1];
        assert_eq!(
            CsrPattern::new(4, 4, &ptr, &[0]),
            Err(FillError::PointerLength { expected: 5, found: 2 })
        );
    }

    #[test]
    fn rejects_nonzero_base() {
        let ptr = [1, 2];
        let ind = [0, 0];
        assert_eq!(
            CsrPattern::new(1, 4, &ptr, &ind),
            Err(FillError::PointerBase { found: 1 })
        );
    }

    #[test]
    fn rejects_decreasing_pointers() {
        let ptr = [0, 2, 1];
        let ind = [0, 1];
        assert_eq!(
            CsrPattern::new(2, 4, &ptr, &ind),
            Err(FillError::NonMonotonePointers { row: 1 })
        );
    }

    #[test]
    fn rejects_nnz_mismatch() {
        let ptr = [0, 1, 3];
        let ind = [0, 1];
        assert_eq!(
            CsrPattern::new(2, 4, &ptr, &ind),
            Err(FillError::NonzeroCountMismatch { expected: 3, found: 2 })
        );
    }

    #[test]
    fn rejects_column_out_of_bounds() {
        let ptr = [0, 1];
        let ind = [4];
        assert_eq!(
            CsrPattern::new(1, 4, &ptr, &ind),
            Err(FillError::ColumnOutOfBounds { row: 0, column: 4, cols: 4 })
        );
    }

    #[test]
    fn rejects_unsorted_and_duplicate_columns() {
        let ptr = [0, 2];
        assert_eq!(
            CsrPattern::new(1, 4, &ptr, &[2, 1]),
            Err(FillError::UnsortedRow { row: 0 })
        );
        assert_eq!(
            CsrPattern::new(1, 4, &ptr, &[1, 1]),
            Err(FillError::UnsortedRow { row: 0 })
        );
    }
}
