//! Hardware discovery.

use crate::arch::{ArchProfile, DeviceError};
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, info};

pub const DEFAULT_OFFLOAD_ARCH: &str = "/opt/rocm/llvm/bin/offload-arch";
pub const DEFAULT_PARTITION_FILE: &str = "/sys/class/drm/card1/device/current_compute_partition";

/// Source of the architecture name and compute partition of the tuning host.
pub trait HardwareProbe {
    fn architecture(&self) -> Result<String, DeviceError>;

    /// Current compute partition mode, if the device reports one.
    fn compute_partition(&self) -> Result<Option<String>, DeviceError>;

    fn resolve_profile(&self) -> Result<ArchProfile, DeviceError> {
        let architecture = self.architecture()?;
        let partition = self.compute_partition()?;
        let profile = ArchProfile::resolve(&architecture, partition.as_deref())?;
        info!(
            arch = profile.architecture_name.as_str(),
            partition = partition.as_deref().unwrap_or("none"),
            compute_units = profile.compute_units,
            xcc = profile.xcc,
            "resolved architecture profile"
        );
        Ok(profile)
    }
}

/// Queries the ROCm toolchain and sysfs of the local machine.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    pub offload_arch: PathBuf,
    pub partition_file: PathBuf,
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self {
            offload_arch: PathBuf::from(DEFAULT_OFFLOAD_ARCH),
            partition_file: PathBuf::from(DEFAULT_PARTITION_FILE),
        }
    }
}

impl HardwareProbe for SystemProbe {
    fn architecture(&self) -> Result<String, DeviceError> {
        let output = Command::new(&self.offload_arch).output().map_err(|err| {
            DeviceError::Probe(format!("{}: {err}", self.offload_arch.display()))
        })?;
        if !output.status.success() {
            return Err(DeviceError::Probe(format!(
                "{} exited with {}",
                self.offload_arch.display(),
                output.status
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        // offload-arch prints one line per visible device; they share an arch.
        let arch = stdout.lines().next().unwrap_or("").trim().to_string();
        if arch.is_empty() {
            return Err(DeviceError::Probe(format!(
                "{} reported no device",
                self.offload_arch.display()
            )));
        }
        debug!(arch = arch.as_str(), "offload-arch reported");
        Ok(arch)
    }

    fn compute_partition(&self) -> Result<Option<String>, DeviceError> {
        match fs::read_to_string(&self.partition_file) {
            Ok(text) => Ok(Some(text.trim().to_string())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(DeviceError::Probe(format!(
                "{}: {err}",
                self.partition_file.display()
            ))),
        }
    }
}

/// Fixed answers, used for command-line overrides and offline generation.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    pub architecture: String,
    pub partition: Option<String>,
}

impl StaticProbe {
    pub fn new(architecture: impl Into<String>, partition: Option<String>) -> Self {
        Self {
            architecture: architecture.into(),
            partition,
        }
    }
}

impl HardwareProbe for StaticProbe {
    fn architecture(&self) -> Result<String, DeviceError> {
        Ok(self.architecture.clone())
    }

    fn compute_partition(&self) -> Result<Option<String>, DeviceError> {
        Ok(self.partition.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_probe_resolves_profile() {
        let probe = StaticProbe::new("gfx942", Some("CPX".into()));
        let profile = probe.resolve_profile().unwrap();
        assert_eq!(profile.compute_units, 20);
    }

    #[test]
    fn static_probe_propagates_unknown_arch() {
        let probe = StaticProbe::new("sm_90", None);
        assert!(matches!(
            probe.resolve_profile(),
            Err(DeviceError::UnsupportedArchitecture(_))
        ));
    }

    #[test]
    fn missing_partition_file_means_no_partition() {
        let probe = SystemProbe {
            offload_arch: PathBuf::from("/nonexistent/offload-arch"),
            partition_file: PathBuf::from("/nonexistent/current_compute_partition"),
        };
        assert_eq!(probe.compute_partition().unwrap(), None);
        assert!(matches!(probe.architecture(), Err(DeviceError::Probe(_))));
    }

    #[cfg(unix)]
    #[test]
    fn failing_or_silent_offload_arch_is_a_probe_error() {
        for tool in ["/bin/false", "/bin/true"] {
            let probe = SystemProbe {
                offload_arch: PathBuf::from(tool),
                partition_file: PathBuf::from("/nonexistent/current_compute_partition"),
            };
            assert!(matches!(probe.architecture(), Err(DeviceError::Probe(_))));
            assert!(matches!(
                probe.resolve_profile(),
                Err(DeviceError::Probe(_))
            ));
        }
    }
}
