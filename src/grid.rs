use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{FieldError, Result, Stage};

/// Ordered sample radii. Index 0 is always the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadiusGrid {
    radii: Vec<f64>,
}

impl RadiusGrid {
    /// Uniform ramp from 0 to `r_final` inclusive with `samples` points.
    pub fn linear_ramp(samples: usize, r_final: f64) -> Result<Self> {
        if samples == 0 {
            return Err(FieldError::invalid_argument(
                Stage::Grid,
                "sample count must be at least 1",
            ));
        }
        if !r_final.is_finite() || r_final < 0.0 {
            return Err(FieldError::invalid_argument(
                Stage::Grid,
                format!("final radius must be finite and non-negative, got {r_final}"),
            ));
        }

        if samples == 1 {
            return Ok(Self { radii: vec![0.0] });
        }

        let last = (samples - 1) as f64;
        let radii = (0..samples)
            .map(|i| r_final * (i as f64 / last))
            .collect();
        Ok(Self { radii })
    }

    /// Wraps explicit radii. The first radius must be the origin and the
    /// sequence must be non-decreasing.
    pub fn from_radii(radii: Vec<f64>) -> Result<Self> {
        match radii.first() {
            None => {
                return Err(FieldError::invalid_argument(
                    Stage::Grid,
                    "radius grid must not be empty",
                ));
            }
            Some(&first) if first != 0.0 => {
                return Err(FieldError::invalid_argument(
                    Stage::Grid,
                    format!("first radius must be the origin, got {first}"),
                ));
            }
            Some(_) => {}
        }
        if radii.iter().any(|r| !r.is_finite() || *r < 0.0) {
            return Err(FieldError::invalid_argument(
                Stage::Grid,
                "radii must be finite and non-negative",
            ));
        }
        if radii.windows(2).any(|pair| pair[1] < pair[0]) {
            return Err(FieldError::invalid_argument(
                Stage::Grid,
                "radii must be non-decreasing",
            ));
        }
        Ok(Self { radii })
    }

    pub fn len(&self) -> usize {
        self.radii.len()
    }

    pub fn is_empty(&self) -> bool {
        self.radii.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.radii
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.radii.iter().copied()
    }

    pub fn to_vector(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.radii)
    }
}
