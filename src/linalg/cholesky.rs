use nalgebra::DMatrix;

use crate::error::{FieldError, Result, Stage};

/// Lower-triangular factorization `A * A^T = M` of a symmetric positive-definite matrix.
pub struct CholeskyFactorizer;

impl CholeskyFactorizer {
    /// Only the lower triangle of `matrix` is read. Entries of the returned
    /// factor above the diagonal are exactly zero.
    pub fn factor(matrix: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        if matrix.nrows() != matrix.ncols() {
            return Err(FieldError::dimension_mismatch(
                Stage::Cholesky,
                format!(
                    "expected a square matrix, got {}x{}",
                    matrix.nrows(),
                    matrix.ncols()
                ),
            ));
        }

        let n = matrix.nrows();
        let mut factor = DMatrix::zeros(n, n);

        for i in 0..n {
            for j in 0..=i {
                let mut sum = matrix[(i, j)];
                for k in 0..j {
                    sum -= factor[(i, k)] * factor[(j, k)];
                }

                if i == j {
                    if !sum.is_finite() || sum <= 0.0 {
                        return Err(FieldError::NonPositiveDefinite {
                            stage: Stage::Cholesky,
                            pivot: i,
                            value: sum,
                        });
                    }
                    factor[(i, i)] = sum.sqrt();
                } else {
                    factor[(i, j)] = sum / factor[(j, j)];
                }
            }
        }

        Ok(factor)
    }
}
