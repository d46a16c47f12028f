use serde::{Deserialize, Serialize};
use thiserror::Error;

// 15-point Kronrod abscissae; odd entries are the 7-point Gauss abscissae.
const XGK: [f64; 8] = [
    0.991_455_371_120_812_639_206_854_697_526_329,
    0.949_107_912_342_758_524_526_189_684_047_851,
    0.864_864_423_359_769_072_789_712_788_640_926,
    0.741_531_185_599_394_439_863_864_773_280_788,
    0.586_087_235_467_691_130_294_144_845_693_013,
    0.405_845_151_377_397_166_906_606_412_076_961,
    0.207_784_955_007_898_467_600_689_403_773_245,
    0.0,
];

const WGK: [f64; 8] = [
    0.022_935_322_010_529_224_963_732_008_058_970,
    0.063_092_092_629_978_553_290_700_663_189_204,
    0.104_790_010_322_250_183_839_876_322_541_518,
    0.140_653_259_715_525_918_745_189_590_510_238,
    0.169_004_726_639_267_902_826_583_426_598_550,
    0.190_350_578_064_785_409_913_256_402_421_014,
    0.204_432_940_075_298_892_414_161_999_234_649,
    0.209_482_141_084_727_828_012_999_174_891_714,
];

const WG: [f64; 4] = [
    0.129_484_966_168_869_693_270_611_432_679_082,
    0.279_705_391_489_276_667_901_467_771_423_780,
    0.381_830_050_505_118_944_950_369_775_488_975,
    0.417_959_183_673_469_387_755_102_040_816_327,
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadratureConfig {
    pub abs_tolerance: f64,
    pub rel_tolerance: f64,
    pub max_intervals: usize,
}

impl Default for QuadratureConfig {
    fn default() -> Self {
        Self {
            abs_tolerance: 1e-10,
            rel_tolerance: 1e-8,
            max_intervals: 512,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadratureEstimate {
    pub value: f64,
    pub error: f64,
    pub intervals: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuadratureFailure {
    #[error("integrand is not finite near k={at}")]
    NonFinite { at: f64 },

    #[error(
        "error estimate {error:e} above tolerance {tolerance:e} after {intervals} intervals (value {value})"
    )]
    Budget {
        value: f64,
        error: f64,
        tolerance: f64,
        intervals: usize,
    },

    #[error("interval around {at} cannot be bisected further")]
    Resolution { at: f64 },
}

/// Globally adaptive Gauss-Kronrod (G7/K15) integration.
///
/// The interval with the largest error estimate is bisected until the summed
/// estimate meets `max(abs_tolerance, rel_tolerance * |value|)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveQuadrature {
    config: QuadratureConfig,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    lower: f64,
    upper: f64,
    value: f64,
    error: f64,
}

impl AdaptiveQuadrature {
    pub fn new(config: QuadratureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QuadratureConfig {
        &self.config
    }

    pub fn integrate<F>(
        &self,
        f: F,
        lower: f64,
        upper: f64,
    ) -> Result<QuadratureEstimate, QuadratureFailure>
    where
        F: Fn(f64) -> f64,
    {
        let max_intervals = self.config.max_intervals.max(1);
        let mut segments = Vec::with_capacity(max_intervals.min(64));
        segments.push(kronrod_segment(&f, lower, upper)?);

        loop {
            let value: f64 = segments.iter().map(|s| s.value).sum();
            let error: f64 = segments.iter().map(|s| s.error).sum();
            let tolerance = self
                .config
                .abs_tolerance
                .max(self.config.rel_tolerance * value.abs());

            if error <= tolerance {
                return Ok(QuadratureEstimate {
                    value,
                    error,
                    intervals: segments.len(),
                });
            }
            if segments.len() >= max_intervals {
                return Err(QuadratureFailure::Budget {
                    value,
                    error,
                    tolerance,
                    intervals: segments.len(),
                });
            }

            let worst = segments
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.error.total_cmp(&b.error))
                .map(|(idx, _)| idx)
                .unwrap_or(0);
            let segment = segments.swap_remove(worst);
            let mid = 0.5 * (segment.lower + segment.upper);
            if mid <= segment.lower || mid >= segment.upper {
                return Err(QuadratureFailure::Resolution { at: mid });
            }
            segments.push(kronrod_segment(&f, segment.lower, mid)?);
            segments.push(kronrod_segment(&f, mid, segment.upper)?);
        }
    }
}

fn kronrod_segment<F>(f: &F, lower: f64, upper: f64) -> Result<Segment, QuadratureFailure>
where
    F: Fn(f64) -> f64,
{
    let center = 0.5 * (lower + upper);
    let half = 0.5 * (upper - lower);

    let f_center = f(center);
    let mut kronrod = f_center * WGK[7];
    let mut gauss = f_center * WG[3];

    for j in 0..3 {
        let node = 2 * j + 1;
        let offset = half * XGK[node];
        let pair = f(center - offset) + f(center + offset);
        gauss += WG[j] * pair;
        kronrod += WGK[node] * pair;
    }
    for j in 0..4 {
        let node = 2 * j;
        let offset = half * XGK[node];
        let pair = f(center - offset) + f(center + offset);
        kronrod += WGK[node] * pair;
    }

    let value = kronrod * half;
    let error = ((kronrod - gauss) * half).abs();
    if !value.is_finite() || !error.is_finite() {
        return Err(QuadratureFailure::NonFinite { at: center });
    }
    Ok(Segment {
        lower,
        upper,
        value,
        error,
    })
}
