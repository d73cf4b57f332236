use tch::{nn, Kind, Tensor};

use crate::neural::BOARD_CELLS;

const VALUE_HIDDEN: i64 = 256;

/// Collapse the feature map to one plane, normalize and rectify, then flatten.
///
/// The flattened width is `BOARD_CELLS`, so heads only accept an 11×11 map.
#[derive(Debug)]
struct HeadStem {
    conv: nn::Conv2D,
    bn: nn::BatchNorm,
}

impl HeadStem {
    fn new(path: &nn::Path, in_planes: i64) -> Self {
        let conv = nn::conv2d(path / "conv", in_planes, 1, 1, Default::default());
        let bn = nn::batch_norm2d(path / "bn", 1, Default::default());
        Self { conv, bn }
    }

    fn forward_t(&self, x: &Tensor, train: bool) -> Tensor {
        x.apply(&self.conv)
            .apply_t(&self.bn, train)
            .relu()
            .flatten(1, -1)
    }
}

/// Feature map → probability distribution over `outplanes` actions
#[derive(Debug)]
pub struct PolicyHead {
    stem: HeadStem,
    fc: nn::Linear,
    outplanes: i64,
}

impl PolicyHead {
    pub fn new(path: &nn::Path, in_planes: i64, outplanes: i64) -> Self {
        let stem = HeadStem::new(path, in_planes);
        let fc = nn::linear(path / "fc", BOARD_CELLS, outplanes, Default::default());
        Self { stem, fc, outplanes }
    }

    pub fn outplanes(&self) -> i64 {
        self.outplanes
    }
}

impl nn::ModuleT for PolicyHead {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        self.stem
            .forward_t(xs, train)
            .apply(&self.fc)
            .log_softmax(-1, Kind::Float)
            .exp()
    }
}

/// Feature map → position evaluation in (-1, 1)
#[derive(Debug)]
pub struct ValueHead {
    stem: HeadStem,
    fc1: nn::Linear,
    fc2: nn::Linear,
}

impl ValueHead {
    pub fn new(path: &nn::Path, in_planes: i64) -> Self {
        let stem = HeadStem::new(path, in_planes);
        let fc1 = nn::linear(path / "fc1", BOARD_CELLS, VALUE_HIDDEN, Default::default());
        let fc2 = nn::linear(path / "fc2", VALUE_HIDDEN, 1, Default::default());
        Self { stem, fc1, fc2 }
    }
}

impl nn::ModuleT for ValueHead {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        self.stem
            .forward_t(xs, train)
            .apply(&self.fc1)
            .relu()
            .apply(&self.fc2)
            .tanh()
    }
}
