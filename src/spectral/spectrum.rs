use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Variance density of the field per spatial frequency.
pub trait PowerSpectrum {
    fn power(&self, k: f64) -> f64;
}

impl<F> PowerSpectrum for F
where
    F: Fn(f64) -> f64,
{
    fn power(&self, k: f64) -> f64 {
        self(k)
    }
}

/// Parametric spectra selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpectrumModel {
    /// `P(k) = amplitude * k^index`.
    PowerLaw { amplitude: f64, index: f64 },
    /// `P(k) = amplitude * exp(-(k * scale)^2 / 2)`.
    Gaussian { amplitude: f64, scale: f64 },
}

impl Default for SpectrumModel {
    fn default() -> Self {
        SpectrumModel::PowerLaw {
            amplitude: 1.0,
            index: 0.0,
        }
    }
}

impl PowerSpectrum for SpectrumModel {
    fn power(&self, k: f64) -> f64 {
        match *self {
            SpectrumModel::PowerLaw { amplitude, index } => {
                if index == 0.0 {
                    amplitude
                } else {
                    amplitude * k.powf(index)
                }
            }
            SpectrumModel::Gaussian { amplitude, scale } => {
                let x = k * scale;
                amplitude * (-0.5 * x * x).exp()
            }
        }
    }
}

/// Radial kernel used to project the spectrum onto a pair of radii.
///
/// The two-point function is
/// \( \xi(r_1, r_2) = C_d \int_0^{k_c} k^{d-1} P(k) K_d(k r_1) K_d(k r_2)\,dk \).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadialKernel {
    /// Three-dimensional isotropic field, spherical Bessel `j0`.
    #[default]
    Spherical,
    /// One-dimensional even field, `cos`.
    Planar,
}

impl RadialKernel {
    pub fn dimension(&self) -> u32 {
        match self {
            RadialKernel::Spherical => 3,
            RadialKernel::Planar => 1,
        }
    }

    pub fn normalization(&self) -> f64 {
        match self {
            RadialKernel::Spherical => 1.0 / (2.0 * PI * PI),
            RadialKernel::Planar => 1.0 / PI,
        }
    }

    /// Volume element `k^(d-1)`.
    pub fn measure(&self, k: f64) -> f64 {
        match self {
            RadialKernel::Spherical => k * k,
            RadialKernel::Planar => 1.0,
        }
    }

    pub fn eval(&self, x: f64) -> f64 {
        match self {
            RadialKernel::Spherical => spherical_j0(x),
            RadialKernel::Planar => x.cos(),
        }
    }
}

fn spherical_j0(x: f64) -> f64 {
    if x.abs() < 1e-4 {
        let x2 = x * x;
        1.0 - x2 / 6.0 + x2 * x2 / 120.0
    } else {
        x.sin() / x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn j0_is_continuous_at_series_switch() {
        let below = spherical_j0(0.999_999e-4);
        let above = spherical_j0(1.000_001e-4);
        assert!((below - above).abs() < 1e-12);
        assert_eq!(spherical_j0(0.0), 1.0);
        assert!(spherical_j0(PI).abs() < 1e-15);
    }

    #[test]
    fn closures_act_as_spectra() {
        let spectrum = |k: f64| 2.0 * k;
        assert_eq!(spectrum.power(3.0), 6.0);
    }

    #[test]
    fn parametric_spectra_evaluate() {
        let white = SpectrumModel::default();
        assert_eq!(white.power(0.0), 1.0);
        assert_eq!(white.power(5.0), 1.0);

        let law = SpectrumModel::PowerLaw {
            amplitude: 3.0,
            index: -2.0,
        };
        assert!((law.power(2.0) - 0.75).abs() < 1e-15);

        let gauss = SpectrumModel::Gaussian {
            amplitude: 1.0,
            scale: 1.0,
        };
        assert!((gauss.power(1.0) - (-0.5f64).exp()).abs() < 1e-15);
    }

    #[test]
    fn spectrum_model_uses_tagged_json() {
        let json = r#"{"kind": "power_law", "amplitude": 2.0, "index": -1.5}"#;
        let model: SpectrumModel = serde_json::from_str(json).expect("parse spectrum");
        assert_eq!(
            model,
            SpectrumModel::PowerLaw {
                amplitude: 2.0,
                index: -1.5
            }
        );
    }
}
