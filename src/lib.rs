//! # Dual Residual Network
//!
//! A residual-network encoder feeding a policy head and a value head, meant to
//! sit behind an AlphaZero-style search loop.
//!
//! ## Usage
//!
//! ```no_run
//! use dual_res::{DualNetwork, NetworkConfig};
//!
//! let mut net = DualNetwork::new(NetworkConfig { n_classes: 5, ..Default::default() })?;
//! let board = vec![0.0f32; dual_res::INPUT_LEN];
//! let prediction = net.predict(&board)?;
//! assert_eq!(prediction.policy.len(), 5);
//! # Ok::<(), dual_res::DualResError>(())
//! ```

// ============================================================================
// PUBLIC API MODULES
// ============================================================================

/// Network configuration (serde-backed)
pub mod config;

/// Logger initialization for binaries
pub mod logging;

/// Neural network components
pub mod neural;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use config::{Activation, NetworkConfig, TargetDevice};
pub use neural::*;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Main error type for the dual residual network
#[derive(Debug, thiserror::Error)]
pub enum DualResError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("`tpu` placement requested but no `dev` was given")]
    MissingDevice,

    #[error("Device {0:?} is not available in this libtorch build")]
    DeviceUnavailable(tch::Device),

    #[error("Input has {actual} values, expected {expected}")]
    InputShape { expected: usize, actual: usize },

    #[error("Torch error: {0}")]
    Torch(#[from] tch::TchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, DualResError>;

// ============================================================================
// LIBRARY VERSION INFO
// ============================================================================

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
