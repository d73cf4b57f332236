use tch::{nn, Tensor};

use crate::neural::res_net_block::{BlockConfig, ResidualBlock};
use crate::{DualResError, Result};

/// `n` residual blocks run in sequence at one resolution level.
///
/// Only the first block changes width, and it downsamples with stride 2
/// whenever `in_channels != out_channels`.
#[derive(Debug)]
pub struct ResidualStage {
    blocks: Vec<ResidualBlock>,
}

impl ResidualStage {
    pub fn new(
        path: &nn::Path,
        in_channels: i64,
        out_channels: i64,
        n: usize,
        block: BlockConfig,
    ) -> Result<Self> {
        if n == 0 {
            return Err(DualResError::Config("a stage needs at least one block".into()));
        }

        let downsampling = if in_channels != out_channels { 2 } else { 1 };
        let expanded = out_channels * block.expansion;
        if downsampling != 1 && in_channels == expanded {
            // identity shortcut cannot follow a stride-2 main path
            return Err(DualResError::Config(format!(
                "stage {in_channels}->{out_channels} downsamples but expansion {} leaves no projection",
                block.expansion
            )));
        }

        let mut blocks = Vec::with_capacity(n);
        blocks.push(ResidualBlock::basic(
            &(path / "block_0"),
            in_channels,
            out_channels,
            BlockConfig { downsampling, ..block },
        ));
        for idx in 1..n {
            blocks.push(ResidualBlock::basic(
                &(path / format!("block_{idx}")),
                expanded,
                out_channels,
                BlockConfig { downsampling: 1, ..block },
            ));
        }

        log::debug!(
            "Built residual stage {}->{} with {} blocks (stride {})",
            in_channels,
            expanded,
            n,
            downsampling
        );

        Ok(Self { blocks })
    }

    pub fn blocks(&self) -> &[ResidualBlock] {
        &self.blocks
    }

    /// Channel count produced by the last block
    pub fn out_channels(&self) -> i64 {
        self.blocks
            .last()
            .map_or(0, ResidualBlock::expanded_channels)
    }
}

impl nn::ModuleT for ResidualStage {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let mut h = xs.shallow_clone();
        for block in &self.blocks {
            h = h.apply_t(block, train);
        }
        h
    }
}
