//! Problem deduplication and frequency ranking.

use gemmtune_problem::{Invocation, ProblemRecord};
use indexmap::IndexMap;
use tracing::{debug, trace};

/// What makes two logged invocations "the same problem".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RankKey {
    /// Identical raw log lines.
    #[default]
    Line,
    /// Identical shape and datatype descriptor, however the line was formatted.
    Problem,
}

/// A deduplicated problem together with how often it was seen.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedProblem {
    pub record: ProblemRecord,
    pub frequency: usize,
    /// First log line that produced this problem, when it came from a log.
    pub source: Option<String>,
}

impl RankedProblem {
    pub fn from_record(record: ProblemRecord) -> Self {
        Self {
            record,
            frequency: 1,
            source: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProblemRanker {
    key: RankKey,
    top_k: Option<usize>,
}

impl ProblemRanker {
    pub fn new(key: RankKey) -> Self {
        Self { key, top_k: None }
    }

    pub fn with_top_k(mut self, top_k: Option<usize>) -> Self {
        self.top_k = top_k;
        self
    }

    /// Counts invocations among `lines` and returns them most frequent first.
    ///
    /// Lines that are not invocations are dropped. Equal frequencies keep
    /// first-seen order.
    pub fn rank_lines<I, S>(&self, lines: I) -> Vec<RankedProblem>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut by_key: IndexMap<DedupKey, RankedProblem> = IndexMap::new();
        let mut skipped = 0usize;

        for line in lines {
            let line = line.as_ref().trim_end();
            let Some(invocation) = Invocation::parse(line) else {
                trace!(line, "not an invocation");
                skipped += 1;
                continue;
            };

            let key = match self.key {
                RankKey::Line => DedupKey::Line(line.to_string()),
                RankKey::Problem => DedupKey::Problem(invocation.record),
            };
            by_key
                .entry(key)
                .and_modify(|ranked| ranked.frequency += 1)
                .or_insert_with(|| {
                    let layout = &invocation.layout;
                    debug!(
                        command = invocation.command.as_str(),
                        shape = %invocation.record.shape,
                        lda = layout.lda,
                        ldb = layout.ldb,
                        ldc = layout.ldc,
                        ldd = layout.ldd,
                        stride_a = layout.stride_a,
                        stride_b = layout.stride_b,
                        stride_c = layout.stride_c,
                        stride_d = layout.stride_d,
                        alpha = invocation.alpha,
                        beta = invocation.beta,
                        "new invocation"
                    );
                    RankedProblem {
                        record: invocation.record,
                        frequency: 1,
                        source: Some(line.to_string()),
                    }
                });
        }

        let mut ranked: Vec<RankedProblem> = by_key.into_values().collect();
        ranked.sort_by(|a, b| b.frequency.cmp(&a.frequency));
        if let Some(top_k) = self.top_k {
            ranked.truncate(top_k);
        }

        debug!(
            key = ?self.key,
            unique = ranked.len(),
            skipped,
            "ranked logged problems"
        );
        ranked
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DedupKey {
    Line(String),
    Problem(ProblemRecord),
}
