use tch::{nn, Tensor};

use crate::config::Activation;
use crate::neural::conv::{conv3x3, AutoPaddedConv, ConvBn, ConvOptions};

/// Per-block hyperparameters
#[derive(Debug, Clone, Copy)]
pub struct BlockConfig {
    /// Multiplier on the block's nominal output width
    pub expansion: i64,
    /// Stride of the first convolution (and of a projection shortcut)
    pub downsampling: i64,
    pub activation: Activation,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            expansion: 1,
            downsampling: 1,
            activation: Activation::Relu,
        }
    }
}

/// Skip path of a residual block, fixed at construction
#[derive(Debug)]
pub enum Shortcut {
    Identity,
    /// 1×1 convolution + batch norm matching the main path's output shape
    Projection(ConvBn),
}

impl Shortcut {
    pub fn is_identity(&self) -> bool {
        matches!(self, Shortcut::Identity)
    }
}

/// Basic residual block: `conv-bn-act-conv-bn` summed with the shortcut.
///
/// No activation is applied after the sum; the next block or head does that.
#[derive(Debug)]
pub struct ResidualBlock {
    in_channels: i64,
    out_channels: i64,
    config: BlockConfig,
    conv1: ConvBn,
    conv2: ConvBn,
    shortcut: Shortcut,
}

impl ResidualBlock {
    pub fn basic(path: &nn::Path, in_channels: i64, out_channels: i64, config: BlockConfig) -> Self {
        let expanded = out_channels * config.expansion;

        let conv1 = ConvBn::new(
            &(path / "conv1"),
            conv3x3(&(path / "conv1" / "conv"), in_channels, out_channels, config.downsampling),
            out_channels,
        );
        let conv2 = ConvBn::new(
            &(path / "conv2"),
            conv3x3(&(path / "conv2" / "conv"), out_channels, expanded, 1),
            expanded,
        );

        let shortcut = if in_channels != expanded {
            let projection = AutoPaddedConv::new(
                &(path / "shortcut" / "conv"),
                in_channels,
                expanded,
                (1, 1),
                ConvOptions {
                    stride: config.downsampling,
                    bias: false,
                },
            );
            Shortcut::Projection(ConvBn::new(&(path / "shortcut"), projection, expanded))
        } else {
            Shortcut::Identity
        };

        Self {
            in_channels,
            out_channels,
            config,
            conv1,
            conv2,
            shortcut,
        }
    }

    pub fn in_channels(&self) -> i64 {
        self.in_channels
    }

    pub fn out_channels(&self) -> i64 {
        self.out_channels
    }

    pub fn expanded_channels(&self) -> i64 {
        self.out_channels * self.config.expansion
    }

    pub fn downsampling(&self) -> i64 {
        self.config.downsampling
    }

    pub fn shortcut(&self) -> &Shortcut {
        &self.shortcut
    }

    pub(crate) fn forward_main(&self, x: &Tensor, train: bool) -> Tensor {
        let h = x.apply_t(&self.conv1, train);
        self.config
            .activation
            .apply(&h)
            .apply_t(&self.conv2, train)
    }

    pub(crate) fn forward_shortcut(&self, x: &Tensor, train: bool) -> Tensor {
        match &self.shortcut {
            Shortcut::Identity => x.shallow_clone(),
            Shortcut::Projection(projection) => x.apply_t(projection, train),
        }
    }
}

impl nn::ModuleT for ResidualBlock {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let residual = self.forward_shortcut(xs, train);
        self.forward_main(xs, train) + residual
    }
}
