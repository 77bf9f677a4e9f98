//! End-to-end synthesis pipeline.

use crate::error::PipelineError;
use crate::synth::{ConfigBuilder, OutputConfiguration, TuningParameters, DEFAULT_ITERATIONS};
use crate::template::BaseTemplate;
use anyhow::{Context, Result};
use gemmtune_autotune::{BucketPlanner, GpuBucket, ProblemRanker, RankKey, RankedProblem};
use gemmtune_device::ArchProfile;
use gemmtune_problem::GridSpec;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Where problems come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// A benchmark log; every matching line is one invocation.
    Log(PathBuf),
    /// A YAML grid of problem ranges.
    Grid(PathBuf),
}

impl InputSource {
    /// Exactly one of the two inputs must be given.
    pub fn from_paths(log: Option<PathBuf>, grid: Option<PathBuf>) -> Result<Self, PipelineError> {
        match (log, grid) {
            (Some(log), None) => Ok(InputSource::Log(log)),
            (None, Some(grid)) => Ok(InputSource::Grid(grid)),
            (Some(_), Some(_)) => Err(PipelineError::ConflictingInputs),
            (None, None) => Err(PipelineError::MissingInput),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub template: PathBuf,
    pub output_dir: PathBuf,
    pub gpus: usize,
    /// Only applies to log input.
    pub top_k: Option<usize>,
    pub iterations: usize,
    pub fast: bool,
    pub rank_key: RankKey,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            template: PathBuf::new(),
            output_dir: PathBuf::from("."),
            gpus: 1,
            top_k: None,
            iterations: DEFAULT_ITERATIONS,
            fast: false,
            rank_key: RankKey::Line,
        }
    }
}

/// Files written by one run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub problems: usize,
    pub written: Vec<PathBuf>,
}

pub struct TuningPipeline {
    config: PipelineConfig,
    arch: ArchProfile,
}

impl TuningPipeline {
    pub fn new(config: PipelineConfig, arch: ArchProfile) -> Result<Self, PipelineError> {
        if config.gpus == 0 {
            return Err(PipelineError::NoDevices);
        }
        Ok(Self { config, arch })
    }

    pub fn parameters(&self) -> TuningParameters {
        TuningParameters::default().with_iterations(self.config.iterations)
    }

    /// Reads the input and returns deduplicated problems in distribution order.
    pub fn collect_problems(&self, input: &InputSource) -> Result<Vec<RankedProblem>> {
        match input {
            InputSource::Log(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("failed to read log {}", path.display()))?;
                let ranked = ProblemRanker::new(self.config.rank_key)
                    .with_top_k(self.config.top_k)
                    .rank_lines(text.lines());
                for problem in &ranked {
                    info!(
                        frequency = problem.frequency,
                        shape = %problem.record.shape,
                        line = problem.source.as_deref().unwrap_or(""),
                        "ranked problem"
                    );
                }
                Ok(ranked)
            }
            InputSource::Grid(path) => {
                let grid = GridSpec::load(path)?;
                Ok(grid
                    .problems()
                    .into_iter()
                    .map(RankedProblem::from_record)
                    .collect())
            }
        }
    }

    pub fn plan(&self, problems: Vec<RankedProblem>) -> Vec<GpuBucket> {
        BucketPlanner::new(self.arch.compute_units)
            .fast(self.config.fast)
            .plan(problems, self.config.gpus)
    }

    /// Builds one configuration per non-empty bucket, in bucket order.
    ///
    /// Buckets are independent, so they are built in parallel.
    pub fn synthesize(
        &self,
        template: &BaseTemplate,
        buckets: &[GpuBucket],
    ) -> Result<Vec<OutputConfiguration>> {
        let builder = ConfigBuilder::new(template, &self.arch, self.parameters());
        let configs = buckets
            .par_iter()
            .filter(|bucket| !bucket.is_empty())
            .map(|bucket| builder.build(bucket))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(configs)
    }

    pub fn write(&self, configs: &[OutputConfiguration]) -> Result<Vec<PathBuf>> {
        write_configs(&self.config.output_dir, configs)
    }

    /// Loads everything, synthesizes every configuration, then writes them.
    ///
    /// Nothing is written unless all buckets synthesize successfully.
    pub fn run(&self, input: &InputSource) -> Result<RunSummary> {
        let template = BaseTemplate::load(&self.config.template)?;
        let problems = self.collect_problems(input)?;
        let problem_count = problems.len();
        info!(
            problems = problem_count,
            gpus = self.config.gpus,
            arch = self.arch.architecture_name.as_str(),
            "distributing problems"
        );

        let buckets = self.plan(problems);
        let configs = self.synthesize(&template, &buckets)?;
        let written = self.write(&configs)?;
        Ok(RunSummary {
            problems: problem_count,
            written,
        })
    }
}

pub fn write_configs(dir: &Path, configs: &[OutputConfiguration]) -> Result<Vec<PathBuf>> {
    if !configs.is_empty() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    }

    let mut written = Vec::with_capacity(configs.len());
    for config in configs {
        let path = dir.join(&config.file_name);
        let yaml = config.to_yaml()?;
        fs::write(&path, yaml).with_context(|| format!("failed to write {}", path.display()))?;
        info!(bucket = config.bucket, path = %path.display(), "wrote configuration");
        written.push(path);
    }
    Ok(written)
}
