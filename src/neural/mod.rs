pub mod conv;
pub mod dual_network;
pub mod encoder;
pub mod policy_value_net;
pub mod res_net_block;
pub mod stage;

// Re-export key components for convenience
pub use conv::{conv3x3, AutoPaddedConv, ConvOptions};
pub use dual_network::{DualNetwork, Mode, NetworkSummary, PositionEvaluator, Prediction};
pub use encoder::Encoder;
pub use policy_value_net::{PolicyHead, ValueHead};
pub use res_net_block::{BlockConfig, ResidualBlock, Shortcut};
pub use stage::ResidualStage;

/// Side of the square board the heads are sized for
pub const BOARD_SIDE: i64 = 11;
/// Flattened width of a single feature plane
pub const BOARD_CELLS: i64 = BOARD_SIDE * BOARD_SIDE;
/// Feature planes expected by `predict`
pub const INPUT_PLANES: i64 = 10;
/// Number of values `predict` expects (10 × 11 × 11)
pub const INPUT_LEN: usize = (INPUT_PLANES * BOARD_CELLS) as usize;
