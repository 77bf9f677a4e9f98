//! CLI wiring for the configuration generator.

use crate::pipeline::{InputSource, PipelineConfig, RunSummary, TuningPipeline};
use crate::synth::DEFAULT_ITERATIONS;
use anyhow::Result;
use clap::{ArgGroup, Parser};
use gemmtune_autotune::RankKey;
use gemmtune_device::{
    ArchProfile, HardwareProbe, StaticProbe, SystemProbe, DEFAULT_OFFLOAD_ARCH,
    DEFAULT_PARTITION_FILE,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "gemmtune",
    about = "Generate per-device GEMM tuning configurations"
)]
#[command(group(ArgGroup::new("input").required(true).args(["log", "grid"])))]
pub struct Cli {
    /// Benchmark log to mine for GEMM invocations.
    #[arg(long, aliases = ["hipblaslt-log", "hipblaslt_log"])]
    pub log: Option<PathBuf>,

    /// YAML grid of problem size ranges.
    #[arg(long, aliases = ["gridbase-config", "gridbase_config"])]
    pub grid: Option<PathBuf>,

    /// Base tuning configuration to fill in.
    #[arg(long, aliases = ["tensile-config", "tensile_config"])]
    pub template: PathBuf,

    /// Number of devices to split the problems across.
    #[arg(long, default_value_t = 1)]
    pub gpus: usize,

    /// Keep only the k most frequent logged problems.
    #[arg(long)]
    pub topk: Option<usize>,

    /// Max tuning iterations per sync.
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    pub iters: usize,

    /// Keep only the first matrix instruction found per problem.
    #[arg(long, default_value_t = false)]
    pub fast: bool,

    #[arg(long, value_enum, default_value = "line")]
    pub rank_by: RankArg,

    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Skip probing and use this architecture (e.g. gfx942).
    #[arg(long)]
    pub arch: Option<String>,

    /// Compute partition mode (e.g. CPX) instead of reading sysfs.
    #[arg(long)]
    pub compute_partition: Option<String>,

    #[arg(long, default_value = DEFAULT_OFFLOAD_ARCH)]
    pub offload_arch: PathBuf,

    #[arg(long, default_value = DEFAULT_PARTITION_FILE)]
    pub partition_file: PathBuf,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum RankArg {
    Line,
    Problem,
}

impl From<RankArg> for RankKey {
    fn from(value: RankArg) -> RankKey {
        match value {
            RankArg::Line => RankKey::Line,
            RankArg::Problem => RankKey::Problem,
        }
    }
}

impl Cli {
    pub fn input(&self) -> Result<InputSource> {
        Ok(InputSource::from_paths(self.log.clone(), self.grid.clone())?)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            template: self.template.clone(),
            output_dir: self.output_dir.clone(),
            gpus: self.gpus,
            top_k: self.topk,
            iterations: self.iters,
            fast: self.fast,
            rank_key: self.rank_by.into(),
        }
    }

    /// Resolves the architecture profile, honoring command-line overrides.
    pub fn resolve_arch(&self) -> Result<ArchProfile> {
        let partition = self.compute_partition.clone();
        let profile = match &self.arch {
            Some(arch) => StaticProbe::new(arch.clone(), partition).resolve_profile()?,
            None => {
                let system = SystemProbe {
                    offload_arch: self.offload_arch.clone(),
                    partition_file: self.partition_file.clone(),
                };
                match partition {
                    Some(partition) => {
                        StaticProbe::new(system.architecture()?, Some(partition)).resolve_profile()?
                    }
                    None => system.resolve_profile()?,
                }
            }
        };
        Ok(profile)
    }
}

pub fn run_cli(cli: Cli) -> Result<()> {
    tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let summary = execute(&cli)?;
    info!(
        problems = summary.problems,
        files = summary.written.len(),
        "configuration generation finished"
    );
    for path in &summary.written {
        println!("wrote {}", path.display());
    }
    Ok(())
}

/// Validates inputs, resolves the architecture, then runs the pipeline.
pub fn execute(cli: &Cli) -> Result<RunSummary> {
    let input = cli.input()?;
    let arch = cli.resolve_arch()?;
    let pipeline = TuningPipeline::new(cli.pipeline_config(), arch)?;
    pipeline.run(&input)
}
