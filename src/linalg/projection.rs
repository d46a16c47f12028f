use nalgebra::{DMatrix, DVector};

use crate::error::{FieldError, Result, Stage};

/// Scalar linear constraint `c^T x = target`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    weights: DVector<f64>,
    pinned: Option<usize>,
    target: f64,
}

impl LinearConstraint {
    /// Fixes the field value at `index`.
    pub fn at_index(index: usize, len: usize, target: f64) -> Result<Self> {
        if index >= len {
            return Err(FieldError::dimension_mismatch(
                Stage::Projection,
                format!("constraint index {index} outside field of length {len}"),
            ));
        }
        check_target(target)?;
        let mut weights = DVector::zeros(len);
        weights[index] = 1.0;
        Ok(Self {
            weights,
            pinned: Some(index),
            target,
        })
    }

    /// Fixes the field value at the origin (index 0).
    pub fn origin(len: usize, target: f64) -> Result<Self> {
        Self::at_index(0, len, target)
    }

    pub fn functional(weights: DVector<f64>, target: f64) -> Result<Self> {
        check_target(target)?;
        if weights.is_empty() || weights.iter().all(|w| *w == 0.0) {
            return Err(FieldError::invalid_argument(
                Stage::Projection,
                "constraint weights must not all be zero",
            ));
        }
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(FieldError::invalid_argument(
                Stage::Projection,
                "constraint weights must be finite",
            ));
        }
        Ok(Self {
            weights,
            pinned: None,
            target,
        })
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn weights(&self) -> &DVector<f64> {
        &self.weights
    }

    pub fn evaluate(&self, field: &DVector<f64>) -> f64 {
        self.weights.dot(field)
    }
}

fn check_target(target: f64) -> Result<()> {
    if target.is_finite() {
        Ok(())
    } else {
        Err(FieldError::invalid_argument(
            Stage::Projection,
            format!("constraint target must be finite, got {target}"),
        ))
    }
}

/// Affine map `y -> projection * y + offset` onto the constraint subspace.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintTransform {
    pub projection: DMatrix<f64>,
    pub offset: DVector<f64>,
}

impl ConstraintTransform {
    pub fn apply(&self, sample: &DVector<f64>) -> Result<DVector<f64>> {
        if sample.len() != self.offset.len() {
            return Err(FieldError::dimension_mismatch(
                Stage::Projection,
                format!(
                    "sample of length {} does not match transform of size {}",
                    sample.len(),
                    self.offset.len()
                ),
            ));
        }
        Ok(&self.projection * sample + &self.offset)
    }
}

/// Conditions a zero-mean Gaussian vector on a single linear constraint.
///
/// With `s = Σc` and `v = cᵀΣc`, the map is `Π = I - s cᵀ / v`, `b = target * s / v`.
/// For `y ~ N(0, Σ)` the result `Πy + b` is distributed as `y | cᵀy = target`,
/// with covariance `Σ - s sᵀ / v`.
pub struct ConstraintProjector;

impl ConstraintProjector {
    /// Constraint on the origin value.
    pub fn construct(covariance: &DMatrix<f64>, nu: f64) -> Result<ConstraintTransform> {
        let constraint = LinearConstraint::origin(covariance.nrows(), nu)?;
        Self::construct_for(covariance, &constraint)
    }

    pub fn construct_for(
        covariance: &DMatrix<f64>,
        constraint: &LinearConstraint,
    ) -> Result<ConstraintTransform> {
        let n = covariance.nrows();
        if covariance.ncols() != n {
            return Err(FieldError::dimension_mismatch(
                Stage::Projection,
                format!("covariance must be square, got {}x{}", n, covariance.ncols()),
            ));
        }
        if constraint.len() != n {
            return Err(FieldError::dimension_mismatch(
                Stage::Projection,
                format!(
                    "constraint of length {} does not match covariance of size {}",
                    constraint.len(),
                    n
                ),
            ));
        }

        let weights = constraint.weights();
        let regression = covariance * weights;
        let variance = weights.dot(&regression);
        if !variance.is_finite() || variance <= 0.0 {
            return Err(FieldError::DegenerateConstraint {
                stage: Stage::Projection,
                variance,
            });
        }

        let gain = &regression / variance;
        let mut projection = DMatrix::identity(n, n) - &gain * weights.transpose();
        let mut offset = gain * constraint.target();

        if let Some(index) = constraint.pinned {
            projection.row_mut(index).fill(0.0);
            offset[index] = constraint.target();
        }

        Ok(ConstraintTransform { projection, offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn sample_covariance() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            4,
            4,
            &[
                2.0, 0.8, 0.3, 0.1, //
                0.8, 1.5, 0.4, 0.2, //
                0.3, 0.4, 1.2, 0.5, //
                0.1, 0.2, 0.5, 1.0,
            ],
        )
    }

    #[test]
    fn origin_component_is_pinned_for_arbitrary_input() {
        let cov = sample_covariance();
        let transform = ConstraintProjector::construct(&cov, 2.0).expect("transform");
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        for _ in 0..50 {
            let y = DVector::from_fn(4, |_, _| rng.gen_range(-100.0..100.0));
            let projected = transform.apply(&y).expect("apply");
            assert_eq!(projected[0], 2.0);
        }
    }

    #[test]
    fn conditional_covariance_matches_gaussian_conditioning() {
        let cov = sample_covariance();
        let transform = ConstraintProjector::construct(&cov, 0.0).expect("transform");
        let pi = &transform.projection;
        let conditioned = pi * &cov * pi.transpose();

        let column = cov.column(0).into_owned();
        let expected = &cov - &column * column.transpose() / cov[(0, 0)];
        for i in 1..4 {
            for j in 1..4 {
                assert!(
                    (conditioned[(i, j)] - expected[(i, j)]).abs() < 1e-12,
                    "({i}, {j}): {} vs {}",
                    conditioned[(i, j)],
                    expected[(i, j)]
                );
            }
        }
        for k in 0..4 {
            assert_eq!(conditioned[(0, k)], 0.0);
        }
    }

    #[test]
    fn offset_is_the_conditional_mean() {
        let cov = sample_covariance();
        let nu = 3.0;
        let transform = ConstraintProjector::construct(&cov, nu).expect("transform");
        for i in 1..4 {
            let expected = cov[(i, 0)] / cov[(0, 0)] * nu;
            assert!((transform.offset[i] - expected).abs() < 1e-14);
        }
        // A zero draw lands on the conditional mean.
        let mean = transform.apply(&DVector::zeros(4)).expect("apply");
        assert_eq!(mean, transform.offset);
    }

    #[test]
    fn general_functional_is_satisfied() {
        let cov = sample_covariance();
        let weights = DVector::from_vec(vec![0.25, 0.25, 0.25, 0.25]);
        let constraint = LinearConstraint::functional(weights, -1.5).expect("constraint");
        let transform = ConstraintProjector::construct_for(&cov, &constraint).expect("transform");
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        for _ in 0..20 {
            let y = DVector::from_fn(4, |_, _| rng.gen_range(-10.0..10.0));
            let projected = transform.apply(&y).expect("apply");
            assert!((constraint.evaluate(&projected) + 1.5).abs() < 1e-12);
        }
    }

    #[test]
    fn zero_origin_variance_is_degenerate() {
        let mut cov = sample_covariance();
        cov.row_mut(0).fill(0.0);
        cov.column_mut(0).fill(0.0);
        let err = ConstraintProjector::construct(&cov, 2.0).unwrap_err();
        assert!(matches!(
            err,
            FieldError::DegenerateConstraint {
                stage: Stage::Projection,
                ..
            }
        ));
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let cov = DMatrix::from_element(3, 2, 1.0);
        let err = ConstraintProjector::construct(&cov, 1.0).unwrap_err();
        assert!(matches!(err, FieldError::DimensionMismatch { .. }));

        let cov = sample_covariance();
        let constraint = LinearConstraint::origin(3, 1.0).expect("constraint");
        let err = ConstraintProjector::construct_for(&cov, &constraint).unwrap_err();
        assert!(matches!(err, FieldError::DimensionMismatch { .. }));
    }
}
