use num_traits::{Float, FromPrimitive};

use super::{FillError, FillEstimator, check_output, layout_index, layout_len};
use crate::csr::CsrPattern;

/// Exhaustive fill computation; the correctness oracle for the other
/// variants.
///
/// For each shape `(r, c)` the whole pattern is walked once, one block
/// row at a time. Visited block columns are marked in a dense scratch
/// row and reset through a touched list, so the work per shape stays
/// linear in `nnz`: `O(max_dim² · nnz)` overall, `O(cols)` scratch.
/// Partial block rows at the bottom of the matrix count like any other.
#[derive(Debug, Clone, Copy, Default)]
pub struct Exact;

impl<F: Float + FromPrimitive> FillEstimator<F> for Exact {
    fn estimate(
        &mut self,
        pattern: &CsrPattern<'_>,
        max_dim: usize,
        fill: &mut [F],
    ) -> Result<(), FillError> {
        check_output(fill, layout_len(max_dim))?;
        if max_dim == 0 {
            return Ok(());
        }
        if pattern.is_empty() {
            fill.fill(F::one());
            return Ok(());
        }

        let rows = pattern.rows();
        let ptr = pattern.ptr();
        let ind = pattern.ind();
        let nnz = F::from_usize(pattern.nnz()).expect("nonzero count fits in a float");

        let mut seen = vec![false; pattern.cols()];
        let mut touched: Vec<usize> = Vec::new();

        for r in 1..=max_dim {
            for c in 1..=max_dim {
                let mut blocks: u64 = 0;
                let mut top = 0;
                while top < rows {
                    let bottom = (top + r).min(rows);
                    for i in top..bottom {
                        for k in ptr[i]..ptr[i + 1] {
                            let jb = ind[k] / c;
                            if !seen[jb] {
                                seen[jb] = true;
                                touched.push(jb);
                            }
                        }
                    }
                    blocks += touched.len() as u64;
                    for jb in touched.drain(..) {
                        seen[jb] = false;
                    }
                    top = bottom;
                }
                let stored = blocks * r as u64 * c as u64;
                fill[layout_index(max_dim, r, c)] =
                    F::from_u64(stored).expect("stored count fits in a float") / nnz;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use itertools::iproduct;

    fn exact(rows: usize, cols: usize, ptr: &[usize], ind: &[usize], b: usize) -> Vec<f64> {
        let a = CsrPattern::new(rows, cols, ptr, ind).unwrap();
        Exact.profile(&a, b).unwrap().values().to_vec()
    }

    #[test]
    fn identity_four() {
        // 4×4 identity: the aligned 2×2 block grid pairs up the
        // diagonal, so (2,2) stores two blocks of four for four
        // nonzeros.
        let fill = exact(4, 4, &[0, 1, 2, 3, 4], &[0, 1, 2, 3], 2);
        assert_relative_eq!(fill[0], 1.0);
        assert_relative_eq!(fill[1], 2.0);
        assert_relative_eq!(fill[2], 2.0);
        assert_relative_eq!(fill[3], 2.0);
    }

    #[test]
    fn dense_two_by_two() {
        let fill = exact(2, 2, &[0, 2, 4], &[0, 1, 0, 1], 2);
        for v in fill {
            assert_relative_eq!(v, 1.0);
        }
    }

    #[test]
    fn empty_three_by_three() {
        let fill = exact(3, 3, &[0, 0, 0, 0], &[], 2);
        assert_eq!(fill, vec![1.0; 4]);
    }

    #[test]
    fn single_dense_block_in_larger_matrix() {
        // One dense 2×2 block at the top-left of a 4×4 matrix.
        let fill = exact(4, 4, &[0, 2, 4, 4, 4], &[0, 1, 0, 1], 2);
        for v in fill {
            assert_relative_eq!(v, 1.0);
        }
    }

    #[test]
    fn two_scattered_nonzeros() {
        // Nonzeros at (0,0) and (1,3): every 2×2 block holds one of
        // them, so (2,2) pays the full four-fold overhead.
        let fill = exact(4, 4, &[0, 1, 2, 2, 2], &[0, 3], 2);
        assert_relative_eq!(fill[0], 1.0);
        assert_relative_eq!(fill[1], 2.0);
        assert_relative_eq!(fill[2], 2.0);
        assert_relative_eq!(fill[3], 4.0);
    }

    #[test]
    fn unit_shape_is_always_one() {
        let ptr = [0, 2, 3, 3, 7];
        let ind = [1, 4, 0, 0, 2, 3, 6];
        let fill = exact(4, 7, &ptr, &ind, 3);
        assert_relative_eq!(fill[0], 1.0);
    }

    #[test]
    fn dense_matrix_with_dividing_shapes() {
        // 6×6 dense: every shape whose dimensions divide 6 tiles the
        // matrix with full blocks.
        let ptr: Vec<usize> = (0..=6).map(|i| i * 6).collect();
        let ind: Vec<usize> = (0..6).flat_map(|_| 0..6).collect();
        let fill = exact(6, 6, &ptr, &ind, 3);
        for (r, c) in iproduct!(1..=3usize, 1..=3usize) {
            assert_relative_eq!(fill[(r - 1) * 3 + (c - 1)], 1.0);
        }
    }

    #[test]
    fn identity_square_shapes_scale_linearly() {
        // 12×12 identity: each aligned r×r diagonal block holds r
        // nonzeros, so fill(r, r) = r when r divides the dimension.
        let ptr: Vec<usize> = (0..=12).collect();
        let ind: Vec<usize> = (0..12).collect();
        let a = CsrPattern::new(12, 12, &ptr, &ind).unwrap();
        let profile: crate::FillProfile<f64> = Exact.profile(&a, 4).unwrap();
        for r in 1..=4 {
            assert_relative_eq!(profile.get(r, r), r as f64);
        }
    }

    #[test]
    fn ratios_never_drop_below_one() {
        let ptr = [0, 3, 4, 6, 6, 9];
        let ind = [0, 2, 7, 4, 1, 5, 0, 3, 6];
        let fill = exact(5, 8, &ptr, &ind, 4);
        for v in fill {
            assert!(v >= 1.0 - 1e-12);
        }
    }

    #[test]
    fn partial_tail_block_rows_are_counted() {
        // 3×2 column of nonzeros; r = 2 leaves a one-row tail whose
        // block still counts.
        let fill = exact(3, 2, &[0, 1, 2, 3], &[0, 0, 0], 2);
        // (2,1): blocks rows {0,1} and {2} -> 2 blocks of 2 for 3 nnz
        assert_relative_eq!(fill[2], 4.0 / 3.0);
    }

    #[test]
    fn zero_max_dim_writes_nothing() {
        let a = CsrPattern::new(2, 2, &[0, 1, 2], &[0, 1]).unwrap();
        let mut fill: [f64; 0] = [];
        assert!(Exact.estimate(&a, 0, &mut fill).is_ok());
    }

    #[test]
    fn wrong_output_length_leaves_buffer_untouched() {
        let a = CsrPattern::new(2, 2, &[0, 1, 2], &[0, 1]).unwrap();
        let mut fill = [7.0f64; 3];
        assert_eq!(
            Exact.estimate(&a, 2, &mut fill),
            Err(FillError::OutputLength { expected: 4, found: 3 })
        );
        assert_eq!(fill, [7.0; 3]);
    }
}
