//! Work distribution across tuning devices.

use crate::ranker::RankedProblem;
use crate::search::search_instructions;
use gemmtune_problem::{DatatypeDescriptor, InstructionCandidate, InstructionTemplate, ProblemShape};
use indexmap::{IndexMap, IndexSet};
use tracing::debug;

/// Deals `items` round-robin into `buckets` lists: item `i` lands in `i % buckets`.
pub fn round_robin<T>(items: impl IntoIterator<Item = T>, buckets: usize) -> Vec<Vec<T>> {
    let mut out: Vec<Vec<T>> = (0..buckets).map(|_| Vec::new()).collect();
    if buckets == 0 {
        return out;
    }
    for (i, item) in items.into_iter().enumerate() {
        out[i % buckets].push(item);
    }
    out
}

/// The problems assigned to one device and the instructions found for them.
#[derive(Debug, Clone, Default)]
pub struct GpuBucket {
    pub index: usize,
    pub problems: Vec<RankedProblem>,
    /// Candidates per descriptor, in discovery order.
    pub candidates: IndexMap<DatatypeDescriptor, IndexSet<InstructionCandidate>>,
}

impl GpuBucket {
    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn shapes(&self) -> impl Iterator<Item = ProblemShape> + '_ {
        self.problems.iter().map(|problem| problem.record.shape)
    }

    /// Shapes grouped by descriptor, descriptors in first-seen order.
    pub fn descriptor_groups(&self) -> IndexMap<DatatypeDescriptor, Vec<ProblemShape>> {
        let mut groups: IndexMap<DatatypeDescriptor, Vec<ProblemShape>> = IndexMap::new();
        for problem in &self.problems {
            groups
                .entry(problem.record.descriptor)
                .or_default()
                .push(problem.record.shape);
        }
        groups
    }

    /// Candidates for `descriptor`; empty when it has no instruction template.
    pub fn candidates_for(&self, descriptor: &DatatypeDescriptor) -> Vec<InstructionCandidate> {
        self.candidates
            .get(descriptor)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}

/// Splits ranked problems over devices and runs the instruction search.
#[derive(Debug, Clone, Copy)]
pub struct BucketPlanner {
    compute_units: usize,
    fast: bool,
}

impl BucketPlanner {
    pub fn new(compute_units: usize) -> Self {
        Self {
            compute_units,
            fast: false,
        }
    }

    /// Keep only the first candidate found for each shape.
    pub fn fast(mut self, fast: bool) -> Self {
        self.fast = fast;
        self
    }

    pub fn plan(&self, problems: Vec<RankedProblem>, gpus: usize) -> Vec<GpuBucket> {
        round_robin(problems, gpus)
            .into_iter()
            .enumerate()
            .map(|(index, problems)| self.populate(index, problems))
            .collect()
    }

    pub fn populate(&self, index: usize, problems: Vec<RankedProblem>) -> GpuBucket {
        let mut candidates: IndexMap<DatatypeDescriptor, IndexSet<InstructionCandidate>> =
            IndexMap::new();

        for problem in &problems {
            let descriptor = problem.record.descriptor;
            let Some(template) = InstructionTemplate::for_descriptor(&descriptor) else {
                debug!(
                    bucket = index,
                    shape = %problem.record.shape,
                    "no instruction template for datatype; skipping search"
                );
                continue;
            };

            let found = search_instructions(template, problem.record.shape, self.compute_units);
            let limit = if self.fast { 1 } else { usize::MAX };
            candidates
                .entry(descriptor)
                .or_default()
                .extend(found.take(limit));
        }

        debug!(
            bucket = index,
            problems = problems.len(),
            descriptors = candidates.len(),
            "populated bucket"
        );
        GpuBucket {
            index,
            problems,
            candidates,
        }
    }
}
