use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;

use radial_grf::{FieldConfig, FieldWriter, SamplingWorkflow};

fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

fn parse_args() -> Result<Option<PathBuf>> {
    let mut args = env::args().skip(1);
    let config = args.next().map(PathBuf::from);
    if let Some(extra) = args.next() {
        anyhow::bail!("Unexpected extra argument: {extra}");
    }
    Ok(config)
}

fn main() -> Result<()> {
    init_logging();
    let config = match parse_args()? {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            FieldConfig::from_path(&path)?
        }
        None => FieldConfig::default(),
    };
    info!(
        "Sampling {} radii up to r={} (k_cutoff {}, nu {}, draws {})",
        config.samples, config.r_final, config.k_cutoff, config.nu, config.draws
    );

    let output = config.output.clone();
    let workflow = SamplingWorkflow::new(config);
    let summary = workflow.execute().context("run sampling workflow")?;
    info!(
        "Plan ready in {:?}; {} draw(s) in {:?} (seed {})",
        summary.plan_duration,
        summary.samples.len(),
        summary.sampling_duration,
        summary.seed
    );

    FieldWriter::write_samples(&summary.samples, &output)
        .with_context(|| format!("write sampled fields to {:?}", output))?;
    info!("Wrote sampled fields to {:?}", output);
    Ok(())
}
