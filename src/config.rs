//! Network configuration
//!
//! Hyperparameters and device placement for [`DualNetwork`](crate::DualNetwork).
//! Everything here is plain data so it can be loaded from a JSON file.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tch::{Device, Tensor};

use crate::neural::{BOARD_CELLS, INPUT_PLANES};
use crate::{DualResError, Result};

/// Serializable device descriptor, converted into [`tch::Device`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetDevice {
    Cpu,
    Cuda(usize),
    Mps,
    Vulkan,
}

impl FromStr for TargetDevice {
    type Err = String;

    /// Parses `cpu`, `cuda`, `cuda:N`, `mps` or `vulkan`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(TargetDevice::Cpu),
            "cuda" => Ok(TargetDevice::Cuda(0)),
            "mps" => Ok(TargetDevice::Mps),
            "vulkan" => Ok(TargetDevice::Vulkan),
            other => other
                .strip_prefix("cuda:")
                .and_then(|index| index.parse().ok())
                .map(TargetDevice::Cuda)
                .ok_or_else(|| format!("unknown device `{s}`")),
        }
    }
}

impl From<TargetDevice> for Device {
    fn from(target: TargetDevice) -> Self {
        match target {
            TargetDevice::Cpu => Device::Cpu,
            TargetDevice::Cuda(index) => Device::Cuda(index),
            TargetDevice::Mps => Device::Mps,
            TargetDevice::Vulkan => Device::Vulkan,
        }
    }
}

/// Non-linearity used by the gate and the residual blocks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Relu,
    LeakyRelu,
    Gelu,
}

impl Activation {
    pub fn apply(self, x: &Tensor) -> Tensor {
        match self {
            Activation::Relu => x.relu(),
            Activation::LeakyRelu => x.leaky_relu(),
            Activation::Gelu => x.gelu("none"),
        }
    }
}

/// Construction parameters for a dual network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Input feature planes
    pub in_channels: i64,
    /// Size of the action space
    pub n_classes: i64,
    /// Place the network on the first CUDA device
    pub cuda: bool,
    /// Place the network on the device named by `dev`
    pub tpu: bool,
    /// Explicit device, required when `tpu` is set
    pub dev: Option<TargetDevice>,
    /// Encoder widths, one per resolution level
    pub blocks_sizes: Vec<i64>,
    /// Encoder depths, one per resolution level
    #[serde(alias = "deepths")]
    pub depths: Vec<usize>,
    /// Channel multiplier applied by each residual block
    pub expansion: i64,
    pub activation: Activation,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            in_channels: INPUT_PLANES,
            n_classes: BOARD_CELLS,
            cuda: false,
            tpu: false,
            dev: None,
            blocks_sizes: vec![128],
            depths: vec![20],
            expansion: 1,
            activation: Activation::Relu,
        }
    }
}

impl NetworkConfig {
    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let config = serde_json::from_reader(reader)?;
        Ok(config)
    }

    /// Resolve the execution device from the `tpu`/`dev`/`cuda` flags
    ///
    /// Fails with `DeviceUnavailable` when this libtorch build or host has no
    /// such backend, before any parameter is allocated on it.
    pub fn device(&self) -> Result<Device> {
        let device = if self.tpu {
            self.dev.map(Device::from).ok_or(DualResError::MissingDevice)?
        } else if self.cuda {
            Device::Cuda(0)
        } else {
            Device::Cpu
        };

        if is_available(device) {
            Ok(device)
        } else {
            Err(DualResError::DeviceUnavailable(device))
        }
    }

    /// Check the hyperparameters before any layer is built
    pub fn validate(&self) -> Result<()> {
        if self.in_channels < 1 {
            return Err(DualResError::Config(format!(
                "in_channels must be positive, got {}",
                self.in_channels
            )));
        }
        if self.n_classes < 1 {
            return Err(DualResError::Config(format!(
                "n_classes must be positive, got {}",
                self.n_classes
            )));
        }
        if self.expansion < 1 {
            return Err(DualResError::Config(format!(
                "expansion must be positive, got {}",
                self.expansion
            )));
        }
        match (self.blocks_sizes.first(), self.depths.first()) {
            (Some(&width), Some(&depth)) => {
                if width < 1 {
                    return Err(DualResError::Config(format!(
                        "block width must be positive, got {width}"
                    )));
                }
                if depth < 1 {
                    return Err(DualResError::Config("stage depth must be at least 1".into()));
                }
            }
            _ => {
                return Err(DualResError::Config(
                    "blocks_sizes and depths must both be non-empty".into(),
                ))
            }
        }
        Ok(())
    }
}

fn is_available(device: Device) -> bool {
    match device {
        Device::Cpu => true,
        Device::Cuda(index) => {
            tch::Cuda::is_available() && index < tch::Cuda::device_count().max(0) as usize
        }
        Device::Mps => tch::utils::has_mps(),
        Device::Vulkan => tch::utils::has_vulkan(),
    }
}
