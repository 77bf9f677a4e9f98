//! Declarative problem grids.
//!
//! A grid file is a YAML sequence of records; each record gives the M, N,
//! Batch and K values as an exact list and/or an evenly spaced range, plus the
//! type and transpose tokens shared by every problem it expands to.

use crate::config::{DatatypeDescriptor, ProblemRecord, ProblemShape};
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum GridError {
    #[error("failed to read grid file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse grid file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// `Exact` accepts the comma-separated string form as well as YAML numbers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ExactValues {
    Text(String),
    Single(usize),
    List(Vec<usize>),
}

impl ExactValues {
    fn values(&self) -> Vec<usize> {
        match self {
            ExactValues::Text(text) => text
                .split(',')
                .filter_map(|token| {
                    let token = token.trim();
                    match token.parse() {
                        Ok(value) => Some(value),
                        Err(_) => {
                            warn!(token, "skipping malformed exact value");
                            None
                        }
                    }
                })
                .collect(),
            ExactValues::Single(value) => vec![*value],
            ExactValues::List(values) => values.clone(),
        }
    }
}

/// One dimension of a grid record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RangeSpec {
    #[serde(default)]
    pub exact: Option<ExactValues>,
    /// `"low:high"`, both inclusive.
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub points: Option<usize>,
}

impl RangeSpec {
    pub fn exact(values: &str) -> Self {
        Self {
            exact: Some(ExactValues::Text(values.to_string())),
            ..Self::default()
        }
    }

    pub fn range(low: usize, high: usize, points: usize) -> Self {
        Self {
            range: Some(format!("{low}:{high}")),
            points: Some(points),
            ..Self::default()
        }
    }

    /// Expands the range into distinct values: exact values in written order,
    /// then range points ascending.
    pub fn expand(&self) -> Vec<usize> {
        let mut values = Vec::new();
        if let Some(exact) = &self.exact {
            values.extend(exact.values());
        }
        if let Some(range) = &self.range {
            match (parse_bounds(range), self.points) {
                (Some((low, high)), Some(points)) => {
                    values.extend(linspace_rounded(low, high, points));
                }
                (None, _) => warn!(range = range.as_str(), "skipping malformed range"),
                (_, None) => warn!(range = range.as_str(), "range without Points ignored"),
            }
        }

        let mut seen = HashSet::new();
        values.retain(|value| seen.insert(*value));
        values
    }
}

fn parse_bounds(range: &str) -> Option<(usize, usize)> {
    let (low, high) = range.split_once(':')?;
    Some((low.trim().parse().ok()?, high.trim().parse().ok()?))
}

/// `points` evenly spaced values in `[low, high]`, rounded half to even.
fn linspace_rounded(low: usize, high: usize, points: usize) -> BTreeSet<usize> {
    let (start, stop) = (low as f64, high as f64);
    match points {
        0 => BTreeSet::new(),
        1 => BTreeSet::from([low]),
        _ => {
            let step = (stop - start) / (points - 1) as f64;
            (0..points)
                .map(|i| {
                    if i == points - 1 {
                        stop
                    } else {
                        start + step * i as f64
                    }
                })
                .map(|value| value.round_ties_even().max(0.0) as usize)
                .collect()
        }
    }
}

/// A grid record as written in the grid file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GridEntry {
    pub m: RangeSpec,
    pub n: RangeSpec,
    pub batch: RangeSpec,
    pub k: RangeSpec,
    pub data_type: String,
    pub dest_data_type: String,
    pub compute_data_type: String,
    pub transpose_a: String,
    pub transpose_b: String,
}

impl GridEntry {
    pub fn descriptor(&self) -> DatatypeDescriptor {
        DatatypeDescriptor::from_tokens(
            &self.data_type,
            &self.dest_data_type,
            &self.compute_data_type,
            &self.transpose_a,
            &self.transpose_b,
        )
    }

    /// Cartesian product M x N x Batch x K, nested in that order.
    pub fn problems(&self) -> Vec<ProblemRecord> {
        let descriptor = self.descriptor();
        let (ms, ns, batches, ks) = (
            self.m.expand(),
            self.n.expand(),
            self.batch.expand(),
            self.k.expand(),
        );

        let mut problems = Vec::with_capacity(ms.len() * ns.len() * batches.len() * ks.len());
        for &m in &ms {
            for &n in &ns {
                for &batch in &batches {
                    for &k in &ks {
                        problems.push(ProblemRecord::new(
                            ProblemShape::new(m, n, batch, k),
                            descriptor,
                        ));
                    }
                }
            }
        }
        problems
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct GridSpec {
    pub entries: Vec<GridEntry>,
}

impl GridSpec {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, GridError> {
        let text = fs::read_to_string(path).map_err(|source| GridError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| GridError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// All problems of all records, first occurrence wins on duplicates.
    pub fn problems(&self) -> Vec<ProblemRecord> {
        let mut seen = HashSet::new();
        let mut problems = Vec::new();
        for entry in &self.entries {
            for problem in entry.problems() {
                if seen.insert(problem) {
                    problems.push(problem);
                }
            }
        }
        debug!(
            records = self.entries.len(),
            problems = problems.len(),
            "expanded grid"
        );
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_only_returns_parsed_set() {
        let spec = RangeSpec::exact("128, 256,128,512");
        assert_eq!(spec.expand(), vec![128, 256, 512]);
    }

    #[test]
    fn single_point_range_is_low_bound() {
        assert_eq!(RangeSpec::range(64, 4096, 1).expand(), vec![64]);
    }

    #[test]
    fn degenerate_range_yields_one_value() {
        assert_eq!(RangeSpec::range(256, 256, 5).expand(), vec![256]);
    }

    #[test]
    fn range_points_are_evenly_spaced_and_rounded() {
        assert_eq!(RangeSpec::range(0, 10, 3).expand(), vec![0, 5, 10]);
        // 1, 2.5, 4 -> 2.5 rounds to even.
        assert_eq!(RangeSpec::range(1, 4, 3).expand(), vec![1, 2, 4]);
        // More points than integers collapse to distinct values.
        assert_eq!(RangeSpec::range(1, 3, 5).expand(), vec![1, 2, 3]);
    }

    #[test]
    fn exact_and_range_are_unioned() {
        let spec = RangeSpec {
            exact: Some(ExactValues::Text("1,100".into())),
            range: Some("100:300".into()),
            points: Some(3),
        };
        assert_eq!(spec.expand(), vec![1, 100, 200, 300]);
    }

    #[test]
    fn malformed_pieces_are_filtered() {
        assert_eq!(RangeSpec::exact("8,x,16").expand(), vec![8, 16]);
        let no_points = RangeSpec {
            range: Some("1:8".into()),
            ..RangeSpec::default()
        };
        assert!(no_points.expand().is_empty());
    }

    #[test]
    fn grid_file_expands_in_nested_order() {
        let yaml = r#"
- M: {Exact: "128,256"}
  N: {Exact: 64}
  Batch: {Exact: "1"}
  K: {Range: "32:64", Points: 2}
  DataType: f16_r
  DestDataType: f16_r
  ComputeDataType: f32_r
  TransposeA: N
  TransposeB: T
- M: {Exact: "128"}
  N: {Exact: "64"}
  Batch: {Exact: "1"}
  K: {Exact: "32"}
  DataType: f16_r
  DestDataType: f16_r
  ComputeDataType: f32_r
  TransposeA: N
  TransposeB: T
"#;
        let grid = GridSpec::from_yaml(yaml).unwrap();
        let shapes: Vec<_> = grid.problems().iter().map(|p| p.shape.exact()).collect();
        assert_eq!(
            shapes,
            vec![
                [128, 64, 1, 32],
                [128, 64, 1, 64],
                [256, 64, 1, 32],
                [256, 64, 1, 64],
            ]
        );
        assert!(grid.entries[0].descriptor().high_precision_accumulate);
    }
}
