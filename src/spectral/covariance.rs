use log::debug;
use nalgebra::DMatrix;

use crate::error::{FieldError, Result, Stage};
use crate::grid::RadiusGrid;
use crate::spectral::quadrature::{AdaptiveQuadrature, QuadratureConfig};
use crate::spectral::spectrum::{PowerSpectrum, RadialKernel};

/// Builds covariance matrices from a band-limited power spectrum.
#[derive(Debug, Clone)]
pub struct CovarianceModel<S> {
    spectrum: S,
    kernel: RadialKernel,
    k_cutoff: f64,
    quadrature: AdaptiveQuadrature,
}

impl<S: PowerSpectrum> CovarianceModel<S> {
    pub fn new(spectrum: S, kernel: RadialKernel, k_cutoff: f64) -> Result<Self> {
        if !k_cutoff.is_finite() || k_cutoff <= 0.0 {
            return Err(FieldError::invalid_argument(
                Stage::Covariance,
                format!("frequency cutoff must be finite and positive, got {k_cutoff}"),
            ));
        }
        Ok(Self {
            spectrum,
            kernel,
            k_cutoff,
            quadrature: AdaptiveQuadrature::default(),
        })
    }

    pub fn with_quadrature(mut self, config: QuadratureConfig) -> Self {
        self.quadrature = AdaptiveQuadrature::new(config);
        self
    }

    pub fn k_cutoff(&self) -> f64 {
        self.k_cutoff
    }

    pub fn kernel(&self) -> RadialKernel {
        self.kernel
    }

    /// Two-point correlation between two radii.
    pub fn correlation(&self, r1: f64, r2: f64) -> Result<f64> {
        self.integrate_pair(r1, r2).map(|(value, _)| value)
    }

    /// Fills the upper triangle by quadrature and mirrors it, so the result is
    /// exactly symmetric.
    pub fn build(&self, grid: &RadiusGrid) -> Result<DMatrix<f64>> {
        let radii = grid.as_slice();
        let n = radii.len();
        let mut covariance = DMatrix::zeros(n, n);
        let mut intervals = 0usize;

        for i in 0..n {
            for j in i..n {
                let (value, used) = self.integrate_pair(radii[i], radii[j]).map_err(|err| {
                    match err {
                        FieldError::IntegrationNonConvergence { stage, reason } => {
                            FieldError::IntegrationNonConvergence {
                                stage,
                                reason: format!("entry ({i}, {j}): {reason}"),
                            }
                        }
                        other => other,
                    }
                })?;
                intervals += used;
                covariance[(i, j)] = value;
                covariance[(j, i)] = value;
            }
        }

        debug!(
            "Covariance {}x{} built with {} quadrature intervals (k_cutoff {})",
            n, n, intervals, self.k_cutoff
        );
        Ok(covariance)
    }

    fn integrate_pair(&self, r1: f64, r2: f64) -> Result<(f64, usize)> {
        let kernel = self.kernel;
        let integrand = |k: f64| {
            let power = self.spectrum.power(k);
            if !power.is_finite() || power < 0.0 {
                return f64::NAN;
            }
            kernel.measure(k) * power * kernel.eval(k * r1) * kernel.eval(k * r2)
        };

        let estimate = self
            .quadrature
            .integrate(integrand, 0.0, self.k_cutoff)
            .map_err(|failure| FieldError::IntegrationNonConvergence {
                stage: Stage::Covariance,
                reason: format!("radii ({r1}, {r2}): {failure}"),
            })?;
        Ok((kernel.normalization() * estimate.value, estimate.intervals))
    }
}
