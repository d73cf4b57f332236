use tch::{nn, Tensor};

use crate::config::Activation;
use crate::neural::conv::{conv3x3, ConvBn};
use crate::neural::res_net_block::BlockConfig;
use crate::neural::stage::ResidualStage;
use crate::{DualResError, Result};

/// Gate convolution followed by residual stages of increasing width.
///
/// Only the first entry of `blocks_sizes`/`depths` is turned into a stage;
/// the encoder works at a single resolution level.
#[derive(Debug)]
pub struct Encoder {
    gate: ConvBn,
    activation: Activation,
    stages: Vec<ResidualStage>,
}

impl Encoder {
    pub fn new(
        path: &nn::Path,
        in_channels: i64,
        blocks_sizes: &[i64],
        depths: &[usize],
        block: BlockConfig,
    ) -> Result<Self> {
        let (width, depth) = match (blocks_sizes.first(), depths.first()) {
            (Some(&width), Some(&depth)) => (width, depth),
            _ => {
                return Err(DualResError::Config(
                    "encoder needs at least one block size and depth".into(),
                ))
            }
        };
        if blocks_sizes.len() > 1 || depths.len() > 1 {
            log::warn!(
                "Encoder builds a single stage; ignoring extra widths {:?} / depths {:?}",
                &blocks_sizes[1..],
                depths.get(1..).unwrap_or_default()
            );
        }

        let gate_path = path / "gate";
        let gate = ConvBn::new(
            &gate_path,
            conv3x3(&(&gate_path / "conv"), in_channels, width, 1),
            width,
        );

        let stages = vec![ResidualStage::new(
            &(path / "stage_0"),
            width,
            width,
            depth,
            block,
        )?];

        Ok(Self {
            gate,
            activation: block.activation,
            stages,
        })
    }

    pub fn stages(&self) -> &[ResidualStage] {
        &self.stages
    }

    /// Expanded channel count of the final block of the final stage
    pub fn out_channels(&self) -> i64 {
        self.stages
            .last()
            .map_or(0, ResidualStage::out_channels)
    }
}

impl nn::ModuleT for Encoder {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let mut h = self.activation.apply(&xs.apply_t(&self.gate, train));
        for stage in &self.stages {
            h = h.apply_t(stage, train);
        }
        h
    }
}
