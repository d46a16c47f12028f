use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::grid::RadiusGrid;
use crate::pipeline::FieldConfig;
use crate::sampling::SamplingPlan;
use crate::spectral::{QuadratureConfig, RadialKernel, SpectrumModel};

const CACHE_DIR: &str = "cache";
const PLAN_SUBDIR: &str = "plans";
const METADATA_FILE: &str = "meta.json";
const PLAN_FILE: &str = "plan.json";
const CACHE_VERSION: u32 = 1;

/// Every input the sampling plan depends on. Draw count, seed and output
/// location are not part of the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanKey {
    pub samples: usize,
    pub r_final: f64,
    pub k_cutoff: f64,
    pub nu: f64,
    pub spectrum: SpectrumModel,
    pub kernel: RadialKernel,
    pub quadrature: QuadratureConfig,
}

impl From<&FieldConfig> for PlanKey {
    fn from(config: &FieldConfig) -> Self {
        Self {
            samples: config.samples,
            r_final: config.r_final,
            k_cutoff: config.k_cutoff,
            nu: config.nu,
            spectrum: config.spectrum,
            kernel: config.kernel,
            quadrature: config.quadrature,
        }
    }
}

impl PlanKey {
    fn digest(&self) -> Result<String> {
        let encoded = serde_json::to_vec(self).context("encode plan key")?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(&CACHE_VERSION.to_le_bytes());
        hasher.update(&encoded);
        Ok(hasher.finalize().to_hex().to_string())
    }
}

#[derive(Debug, Clone)]
pub struct PlanCache {
    root: PathBuf,
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new(CACHE_DIR)
    }
}

impl PlanCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load(&self, key: &PlanKey) -> Result<Option<SamplingPlan>> {
        let dir = self.plan_dir(key)?;
        let meta_path = dir.join(METADATA_FILE);
        let plan_path = dir.join(PLAN_FILE);
        if !meta_path.exists() || !plan_path.exists() {
            debug!("Plan cache miss at {:?}", dir);
            return Ok(None);
        }

        let meta: CachedMeta = read_json(&meta_path)
            .with_context(|| format!("deserialize plan metadata from {:?}", meta_path))?;
        if meta.version != CACHE_VERSION || &meta.key != key {
            debug!("Plan cache entry at {:?} is stale", dir);
            return Ok(None);
        }

        let record: PlanRecord = read_json(&plan_path)
            .with_context(|| format!("read cached plan from {:?}", plan_path))?;
        let plan = record.into_plan();
        if plan.as_ref().map(|p| p.len()) != Some(key.samples) {
            debug!("Plan cache entry at {:?} has unexpected shape", dir);
            return Ok(None);
        }
        debug!("Plan cache hit at {:?}", dir);
        Ok(plan)
    }

    pub fn store(&self, key: &PlanKey, plan: &SamplingPlan) -> Result<()> {
        let dir = self.plan_dir(key)?;
        fs::create_dir_all(&dir).with_context(|| format!("create cache directory {:?}", dir))?;

        let meta = CachedMeta {
            version: CACHE_VERSION,
            key: key.clone(),
        };
        write_json(&dir.join(METADATA_FILE), &meta)
            .with_context(|| format!("write plan metadata to {:?}", dir))?;
        write_json(&dir.join(PLAN_FILE), &PlanRecord::from_plan(plan))
            .with_context(|| format!("write cached plan to {:?}", dir))?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)
                .with_context(|| format!("remove cache directory {:?}", self.root))?;
        }
        Ok(())
    }

    fn plan_dir(&self, key: &PlanKey) -> Result<PathBuf> {
        Ok(self.root.join(PLAN_SUBDIR).join(key.digest()?))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedMeta {
    version: u32,
    key: PlanKey,
}

/// Row-major on-disk form of a [`SamplingPlan`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PlanRecord {
    radii: Vec<f64>,
    size: usize,
    transform: Vec<f64>,
    offset: Vec<f64>,
}

impl PlanRecord {
    fn from_plan(plan: &SamplingPlan) -> Self {
        let size = plan.len();
        let transform = plan.transform().transpose().iter().copied().collect();
        Self {
            radii: plan.radii().as_slice().to_vec(),
            size,
            transform,
            offset: plan.offset().iter().copied().collect(),
        }
    }

    fn into_plan(self) -> Option<SamplingPlan> {
        let size = self.size;
        if self.radii.len() != size
            || self.offset.len() != size
            || self.transform.len() != size * size
        {
            return None;
        }
        let radii = RadiusGrid::from_radii(self.radii).ok()?;
        let transform = DMatrix::from_row_slice(size, size, &self.transform);
        let offset = DVector::from_vec(self.offset);
        Some(SamplingPlan::from_parts(radii, transform, offset))
    }
}

fn read_json<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let file = File::open(path).with_context(|| format!("open cached json file {:?}", path))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .with_context(|| format!("deserialize cached json file {:?}", path))
}

fn write_json<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create cache parent directory {:?}", parent))?;
    }
    let file = File::create(path).with_context(|| format!("create cache json file {:?}", path))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer(writer, value)
        .with_context(|| format!("serialize cache json file {:?}", path))
}
