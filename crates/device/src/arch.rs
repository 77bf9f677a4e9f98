//! Architecture profiles for supported accelerators.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("unsupported architecture `{0}` (supported: gfx942, gfx90a)")]
    UnsupportedArchitecture(String),
    #[error("hardware probe failed: {0}")]
    Probe(String),
}

/// Compute partition mode reported for partitioned accelerators.
pub const CPX_PARTITION: &str = "CPX";

/// Hardware constants resolved once per run and shared by every bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchProfile {
    pub architecture_name: String,
    pub compute_units: usize,
    pub xcc: usize,
    pub global_split_u: Vec<usize>,
    pub device_names: Vec<String>,
    pub schedule_name: String,
}

impl ArchProfile {
    /// Resolves the profile for an architecture and optional compute partition.
    pub fn resolve(architecture: &str, partition: Option<&str>) -> Result<Self, DeviceError> {
        let architecture = architecture.trim();
        match architecture {
            "gfx942" => {
                let (compute_units, xcc, global_split_u) = match partition.map(str::trim) {
                    Some(CPX_PARTITION) => (20, 1, (1..=8).collect()),
                    _ => (80, 4, vec![1, 2, 3, 4]),
                };
                Ok(Self {
                    architecture_name: architecture.to_string(),
                    compute_units,
                    xcc,
                    global_split_u,
                    device_names: names(&["Device 0049", "Device 0050"]),
                    schedule_name: "aquavanjaram".to_string(),
                })
            }
            "gfx90a" => Ok(Self {
                architecture_name: architecture.to_string(),
                compute_units: 104,
                xcc: 1,
                global_split_u: vec![1, 2, 3, 4],
                device_names: names(&[
                    "Device 0050",
                    "Device 0051",
                    "Device 0052",
                    "Device 0054",
                    "Device 0062",
                    "Device 7400",
                    "Device 740c",
                ]),
                schedule_name: "aldebaran".to_string(),
            }),
            other => Err(DeviceError::UnsupportedArchitecture(other.to_string())),
        }
    }
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|name| name.to_string()).collect()
}
