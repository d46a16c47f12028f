use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, info};
use once_cell::sync::OnceCell;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::cache::{PlanCache, PlanKey};
use crate::error::{FieldError, Stage};
use crate::grid::RadiusGrid;
use crate::linalg::{CholeskyFactorizer, ConstraintProjector};
use crate::output::MatrixDisplay;
use crate::sampling::{Sample, SamplingPlan};
use crate::spectral::{CovarianceModel, QuadratureConfig, RadialKernel, SpectrumModel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    /// Number of radii, including the origin.
    pub samples: usize,
    pub r_final: f64,
    pub k_cutoff: f64,
    /// Field value at the origin.
    pub nu: f64,
    pub spectrum: SpectrumModel,
    pub kernel: RadialKernel,
    pub quadrature: QuadratureConfig,
    /// Independent realizations drawn from one plan.
    pub draws: usize,
    pub seed: Option<u64>,
    pub output: PathBuf,
    pub use_cache: bool,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            samples: 4,
            r_final: 10.0,
            k_cutoff: 10.0,
            nu: 2.0,
            spectrum: SpectrumModel::default(),
            kernel: RadialKernel::default(),
            quadrature: QuadratureConfig::default(),
            draws: 1,
            seed: None,
            output: PathBuf::from("fields.txt"),
            use_cache: false,
        }
    }
}

impl FieldConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open config file {:?}", path))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parse config file {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        let invalid = |reason: String| Err(FieldError::invalid_argument(Stage::Config, reason));
        if self.samples == 0 {
            return invalid("samples must be at least 1".to_string());
        }
        if self.draws == 0 {
            return invalid("draws must be at least 1".to_string());
        }
        if !self.r_final.is_finite() || self.r_final < 0.0 {
            return invalid(format!(
                "r_final must be finite and non-negative, got {}",
                self.r_final
            ));
        }
        if !self.k_cutoff.is_finite() || self.k_cutoff <= 0.0 {
            return invalid(format!(
                "k_cutoff must be finite and positive, got {}",
                self.k_cutoff
            ));
        }
        if !self.nu.is_finite() {
            return invalid(format!("nu must be finite, got {}", self.nu));
        }
        let tolerances = &self.quadrature;
        let positive = |value: f64| value.is_finite() && value > 0.0;
        if !positive(tolerances.abs_tolerance) || !positive(tolerances.rel_tolerance) {
            return invalid("quadrature tolerances must be positive".to_string());
        }
        if tolerances.max_intervals == 0 {
            return invalid("quadrature max_intervals must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Builds the sampling plan once and draws realizations from it.
pub struct SamplingWorkflow {
    config: FieldConfig,
    cache: Option<PlanCache>,
    plan: OnceCell<Arc<SamplingPlan>>,
}

#[derive(Debug, Clone)]
pub struct SamplingSummary {
    pub plan: Arc<SamplingPlan>,
    pub samples: Vec<Sample>,
    pub seed: u64,
    pub plan_duration: Duration,
    pub sampling_duration: Duration,
}

impl SamplingWorkflow {
    pub fn new(config: FieldConfig) -> Self {
        let cache = config.use_cache.then(PlanCache::default);
        Self {
            config,
            cache,
            plan: OnceCell::new(),
        }
    }

    pub fn with_cache(mut self, cache: PlanCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    /// The plan for this configuration, computed on first access.
    pub fn plan(&self) -> Result<Arc<SamplingPlan>> {
        self.plan
            .get_or_try_init(|| self.load_or_build().map(Arc::new))
            .map(Arc::clone)
    }

    pub fn execute(&self) -> Result<SamplingSummary> {
        let plan_start = Instant::now();
        let plan = self.plan()?;
        let plan_duration = plan_start.elapsed();

        let seed = self.config.seed.unwrap_or_else(random_seed);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

        let sampling_start = Instant::now();
        let samples = plan
            .draw_many(&mut rng, self.config.draws)
            .context("draw field samples")?;
        let sampling_duration = sampling_start.elapsed();

        Ok(SamplingSummary {
            plan,
            samples,
            seed,
            plan_duration,
            sampling_duration,
        })
    }

    fn load_or_build(&self) -> Result<SamplingPlan> {
        self.config.validate()?;
        let key = PlanKey::from(&self.config);

        if let Some(cache) = &self.cache {
            if let Some(plan) = cache.load(&key)? {
                info!("Loaded sampling plan from cache {:?}", cache.root());
                return Ok(plan);
            }
        }

        let plan = self.build_plan()?;
        if let Some(cache) = &self.cache {
            cache
                .store(&key, &plan)
                .with_context(|| format!("store sampling plan in {:?}", cache.root()))?;
        }
        Ok(plan)
    }

    fn build_plan(&self) -> Result<SamplingPlan> {
        let config = &self.config;
        let grid = RadiusGrid::linear_ramp(config.samples, config.r_final)?;
        let model = CovarianceModel::new(config.spectrum, config.kernel, config.k_cutoff)?
            .with_quadrature(config.quadrature);

        let covariance = model.build(&grid).context("build covariance matrix")?;
        debug!("Covariance matrix:\n{}", MatrixDisplay(&covariance));

        let constraint = ConstraintProjector::construct(&covariance, config.nu)
            .context("construct constraint projector")?;
        debug!("Projection matrix:\n{}", MatrixDisplay(&constraint.projection));

        let factor = CholeskyFactorizer::factor(&covariance).context("factor covariance")?;
        debug!("Cholesky factor:\n{}", MatrixDisplay(&factor));

        Ok(SamplingPlan::compose(grid, &factor, &constraint)?)
    }
}

fn random_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_reproduces_reference_run() {
        let config = FieldConfig::default();
        assert_eq!(config.samples, 4);
        assert_eq!(config.r_final, 10.0);
        assert_eq!(config.k_cutoff, 10.0);
        assert_eq!(config.nu, 2.0);
        assert_eq!(config.output, PathBuf::from("fields.txt"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: FieldConfig =
            serde_json::from_str(r#"{"samples": 16, "seed": 9}"#).expect("parse config");
        assert_eq!(config.samples, 16);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.nu, 2.0);
        assert_eq!(config.kernel, RadialKernel::Spherical);
    }

    #[test]
    fn validation_rejects_bad_parameters() {
        let bad = [
            FieldConfig {
                samples: 0,
                ..FieldConfig::default()
            },
            FieldConfig {
                r_final: -1.0,
                ..FieldConfig::default()
            },
            FieldConfig {
                k_cutoff: 0.0,
                ..FieldConfig::default()
            },
            FieldConfig {
                draws: 0,
                ..FieldConfig::default()
            },
        ];
        for config in bad {
            let err = config.validate().unwrap_err();
            assert!(matches!(
                err,
                FieldError::InvalidArgument {
                    stage: Stage::Config,
                    ..
                }
            ));
        }
    }

    #[test]
    fn plan_is_built_once_and_shared() {
        let workflow = SamplingWorkflow::new(FieldConfig::default());
        let first = workflow.plan().expect("plan");
        let second = workflow.plan().expect("plan");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn seeded_execution_is_reproducible() {
        let config = FieldConfig {
            draws: 3,
            seed: Some(1234),
            ..FieldConfig::default()
        };
        let first = SamplingWorkflow::new(config.clone()).execute().expect("run");
        let second = SamplingWorkflow::new(config).execute().expect("run");
        assert_eq!(first.samples, second.samples);
        assert_eq!(first.seed, 1234);
        assert_eq!(first.samples.len(), 3);
        for sample in &first.samples {
            assert_eq!(sample.field[0], 2.0);
        }
    }
}
