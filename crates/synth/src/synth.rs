//! Per-device configuration synthesis.

use crate::error::SynthError;
use crate::template::{
    mapping_mut, missing, sequence_mut, BaseTemplate, BENCHMARK_FINAL_PARAMETERS,
    BENCHMARK_PROBLEMS, FORK_PARAMETERS, GLOBAL_PARAMETERS, LIBRARY_LOGIC,
};
use gemmtune_autotune::GpuBucket;
use gemmtune_device::ArchProfile;
use gemmtune_problem::{DatatypeDescriptor, InstructionCandidate, ProblemShape};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use tracing::debug;

pub const NUM_WARMUPS: usize = 20;
pub const ENQUEUES_PER_SYNC: usize = 20;
pub const DEFAULT_ITERATIONS: usize = 100;

/// Benchmark loop settings written into `GlobalParameters`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuningParameters {
    pub num_warmups: usize,
    pub enqueues_per_sync: usize,
    pub iterations: usize,
}

impl Default for TuningParameters {
    fn default() -> Self {
        Self {
            num_warmups: NUM_WARMUPS,
            enqueues_per_sync: ENQUEUES_PER_SYNC,
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl TuningParameters {
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// `(E + I) * mean(M) * mean(N) * mean(Batch) * mean(K) / 2`, rounded half
    /// to even. Zero for no shapes.
    ///
    /// Evaluated as the exact fraction `(E + I) * ΣM * ΣN * ΣB * ΣK / (2 * count^4)`
    /// so ties are decided on the true value.
    pub fn min_flops_per_sync(&self, shapes: impl IntoIterator<Item = ProblemShape>) -> u64 {
        let mut count = 0u128;
        let mut sums = [0u128; 4];
        for shape in shapes {
            count += 1;
            for (sum, dim) in sums.iter_mut().zip(shape.exact()) {
                *sum += dim as u128;
            }
        }
        if count == 0 {
            return 0;
        }

        let syncs = (self.enqueues_per_sync + self.iterations) as u128;
        let numerator = sums
            .iter()
            .try_fold(syncs, |acc, sum| acc.checked_mul(*sum));
        let denominator = count
            .checked_pow(4)
            .and_then(|power| power.checked_mul(2));
        match (numerator, denominator) {
            (Some(numerator), Some(denominator)) => {
                let rounded = div_round_ties_even(numerator, denominator);
                u64::try_from(rounded).unwrap_or(u64::MAX)
            }
            _ => {
                let mean_product: f64 = sums
                    .iter()
                    .map(|sum| *sum as f64 / count as f64)
                    .product();
                (syncs as f64 * mean_product / 2.0).round_ties_even() as u64
            }
        }
    }
}

fn div_round_ties_even(numerator: u128, denominator: u128) -> u128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    match (remainder * 2).cmp(&denominator) {
        std::cmp::Ordering::Less => quotient,
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal => quotient + (quotient & 1),
    }
}

#[derive(Serialize)]
struct ExactSize {
    #[serde(rename = "Exact")]
    exact: [usize; 4],
}

/// A finished configuration for one device.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfiguration {
    pub bucket: usize,
    pub file_name: String,
    pub document: Value,
}

impl OutputConfiguration {
    pub fn to_yaml(&self) -> Result<String, SynthError> {
        serde_yaml::to_string(&self.document).map_err(|source| SynthError::Serialize {
            bucket: self.bucket,
            source,
        })
    }
}

/// Builds device configurations from an immutable base template.
pub struct ConfigBuilder<'a> {
    template: &'a BaseTemplate,
    arch: &'a ArchProfile,
    params: TuningParameters,
}

impl<'a> ConfigBuilder<'a> {
    pub fn new(template: &'a BaseTemplate, arch: &'a ArchProfile, params: TuningParameters) -> Self {
        Self {
            template,
            arch,
            params,
        }
    }

    pub fn build(&self, bucket: &GpuBucket) -> Result<OutputConfiguration, SynthError> {
        if bucket.is_empty() {
            return Err(SynthError::EmptyBucket(bucket.index));
        }
        let index = bucket.index;
        let mut document = self.template.document().clone();

        let min_flops = self.params.min_flops_per_sync(bucket.shapes());
        let globals = mapping_mut(&mut document, GLOBAL_PARAMETERS, index)?;
        insert(globals, "EnqueuesPerSync", self.params.enqueues_per_sync, index)?;
        insert(globals, "MaxEnqueuesPerSync", self.params.iterations, index)?;
        insert(globals, "NumWarmups", self.params.num_warmups, index)?;
        insert(globals, "MinFlopsPerSync", min_flops, index)?;

        let problems = sequence_mut(&mut document, BENCHMARK_PROBLEMS, index)?;
        let prototype = problems
            .first()
            .cloned()
            .ok_or_else(|| missing(index, format!("{BENCHMARK_PROBLEMS}[0]")))?;
        for (slot, (descriptor, shapes)) in bucket.descriptor_groups().iter().enumerate() {
            if slot >= problems.len() {
                problems.push(prototype.clone());
            }
            let candidates = bucket.candidates_for(descriptor);
            self.fill_problem_group(&mut problems[slot], slot, descriptor, shapes, &candidates, index)?;
            debug!(
                bucket = index,
                slot,
                shapes = shapes.len(),
                instructions = candidates.len(),
                "filled problem group"
            );
        }

        let logic = mapping_mut(&mut document, LIBRARY_LOGIC, index)?;
        insert(logic, "DeviceNames", &self.arch.device_names, index)?;
        insert(logic, "ScheduleName", &self.arch.schedule_name, index)?;
        insert(logic, "ArchitectureName", &self.arch.architecture_name, index)?;

        Ok(OutputConfiguration {
            bucket: index,
            file_name: self.template.output_file_name(index),
            document,
        })
    }

    fn fill_problem_group(
        &self,
        group: &mut Value,
        slot: usize,
        descriptor: &DatatypeDescriptor,
        shapes: &[ProblemShape],
        candidates: &[InstructionCandidate],
        bucket: usize,
    ) -> Result<(), SynthError> {
        let path = format!("{BENCHMARK_PROBLEMS}[{slot}]");
        let group = group
            .as_sequence_mut()
            .filter(|group| group.len() >= 2)
            .ok_or_else(|| missing(bucket, path.clone()))?;
        group[0] = to_value(descriptor, bucket)?;

        let body = group[1]
            .as_mapping_mut()
            .ok_or_else(|| missing(bucket, format!("{path}[1]")))?;

        let sizes: Vec<ExactSize> = shapes
            .iter()
            .map(|shape| ExactSize {
                exact: shape.exact(),
            })
            .collect();
        let finals = body
            .get_mut(BENCHMARK_FINAL_PARAMETERS)
            .and_then(Value::as_sequence_mut)
            .and_then(|params| params.first_mut())
            .and_then(Value::as_mapping_mut)
            .ok_or_else(|| missing(bucket, format!("{path}[1].{BENCHMARK_FINAL_PARAMETERS}[0]")))?;
        insert(finals, "ProblemSizes", &sizes, bucket)?;

        let forks = body
            .get_mut(FORK_PARAMETERS)
            .and_then(Value::as_sequence_mut)
            .ok_or_else(|| missing(bucket, format!("{path}[1].{FORK_PARAMETERS}")))?;
        for item in forks.iter_mut().filter_map(Value::as_mapping_mut) {
            if item.contains_key("MatrixInstruction") {
                insert(item, "MatrixInstruction", candidates, bucket)?;
            }
            if item.contains_key("WorkGroupMappingXCCGroup") {
                insert(item, "WorkGroupMappingXCCGroup", [self.arch.compute_units], bucket)?;
            }
            if item.contains_key("WorkGroupMappingXCC") {
                insert(item, "WorkGroupMappingXCC", [self.arch.xcc], bucket)?;
            }
            if item.contains_key("GlobalSplitU") {
                insert(item, "GlobalSplitU", &self.arch.global_split_u, bucket)?;
            }
        }
        Ok(())
    }
}

fn to_value<T: Serialize>(value: T, bucket: usize) -> Result<Value, SynthError> {
    serde_yaml::to_value(value).map_err(|source| SynthError::Serialize { bucket, source })
}

fn insert<T: Serialize>(
    mapping: &mut Mapping,
    key: &str,
    value: T,
    bucket: usize,
) -> Result<(), SynthError> {
    mapping.insert(Value::from(key), to_value(value, bucket)?);
    Ok(())
}
