use tch::{nn, Tensor};

/// Stride and bias for an [`AutoPaddedConv`]
#[derive(Debug, Clone, Copy)]
pub struct ConvOptions {
    pub stride: i64,
    pub bias: bool,
}

impl Default for ConvOptions {
    fn default() -> Self {
        Self { stride: 1, bias: true }
    }
}

/// 2D convolution whose padding is `kernel / 2` in each spatial dimension,
/// so a stride-1 convolution keeps the input height and width.
#[derive(Debug)]
pub struct AutoPaddedConv {
    conv: nn::Conv2D,
    kernel_size: (i64, i64),
    stride: i64,
}

impl AutoPaddedConv {
    pub fn new(
        path: &nn::Path,
        in_channels: i64,
        out_channels: i64,
        kernel_size: (i64, i64),
        options: ConvOptions,
    ) -> Self {
        let (kh, kw) = kernel_size;
        let conv = nn::conv(
            path,
            in_channels,
            out_channels,
            [kh, kw],
            nn::ConvConfigND::<[i64; 2]> {
                stride: [options.stride, options.stride],
                padding: [kh / 2, kw / 2],
                bias: options.bias,
                ..Default::default()
            },
        );

        Self {
            conv,
            kernel_size,
            stride: options.stride,
        }
    }

    pub fn kernel_size(&self) -> (i64, i64) {
        self.kernel_size
    }

    pub fn padding(&self) -> (i64, i64) {
        (self.kernel_size.0 / 2, self.kernel_size.1 / 2)
    }

    pub fn stride(&self) -> i64 {
        self.stride
    }
}

impl nn::Module for AutoPaddedConv {
    fn forward(&self, xs: &Tensor) -> Tensor {
        xs.apply(&self.conv)
    }
}

/// 3×3 auto-padded convolution without bias.
pub fn conv3x3(path: &nn::Path, in_channels: i64, out_channels: i64, stride: i64) -> AutoPaddedConv {
    AutoPaddedConv::new(
        path,
        in_channels,
        out_channels,
        (3, 3),
        ConvOptions { stride, bias: false },
    )
}

/// Convolution followed by batch normalization over its output channels
#[derive(Debug)]
pub struct ConvBn {
    conv: AutoPaddedConv,
    bn: nn::BatchNorm,
}

impl ConvBn {
    pub fn new(path: &nn::Path, conv: AutoPaddedConv, out_channels: i64) -> Self {
        let bn = nn::batch_norm2d(path / "bn", out_channels, Default::default());
        Self { conv, bn }
    }

    pub fn conv(&self) -> &AutoPaddedConv {
        &self.conv
    }
}

impl nn::ModuleT for ConvBn {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        xs.apply(&self.conv).apply_t(&self.bn, train)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::nn::Module;
    use tch::{kind, Device};

    #[test]
    fn test_padding_is_half_kernel() {
        let vs = nn::VarStore::new(Device::Cpu);
        for k in 1..=7 {
            let conv = AutoPaddedConv::new(
                &(vs.root() / format!("k{k}")),
                2,
                4,
                (k, k),
                ConvOptions::default(),
            );
            assert_eq!(conv.padding(), (k / 2, k / 2));
        }

        let rect = AutoPaddedConv::new(&(vs.root() / "rect"), 2, 4, (3, 5), ConvOptions::default());
        assert_eq!(rect.padding(), (1, 2));
    }

    #[test]
    fn test_stride_one_preserves_spatial_size() {
        let vs = nn::VarStore::new(Device::Cpu);
        let input = Tensor::randn([2, 3, 11, 11], kind::FLOAT_CPU);

        for k in [1, 3, 5, 7] {
            let conv = AutoPaddedConv::new(
                &(vs.root() / format!("k{k}")),
                3,
                8,
                (k, k),
                ConvOptions::default(),
            );
            assert_eq!(conv.forward(&input).size(), vec![2, 8, 11, 11]);
        }
    }

    #[test]
    fn test_conv3x3_has_no_bias() {
        let vs = nn::VarStore::new(Device::Cpu);
        let conv = conv3x3(&(vs.root() / "c"), 4, 4, 2);

        assert_eq!(conv.kernel_size(), (3, 3));
        assert_eq!(conv.stride(), 2);
        assert!(vs.variables().keys().all(|name| !name.ends_with("bias")));

        let out = conv.forward(&Tensor::randn([1, 4, 11, 11], kind::FLOAT_CPU));
        assert_eq!(out.size(), vec![1, 4, 6, 6]);
    }

    #[test]
    fn test_conv_bn_shape() {
        let vs = nn::VarStore::new(Device::Cpu);
        let p = vs.root() / "block";
        let conv_bn = ConvBn::new(&p, conv3x3(&(&p / "conv"), 3, 16, 1), 16);
        assert_eq!(conv_bn.conv().kernel_size(), (3, 3));
        assert_eq!(conv_bn.conv().stride(), 1);

        let out = Tensor::randn([4, 3, 11, 11], kind::FLOAT_CPU).apply_t(&conv_bn, true);
        assert_eq!(out.size(), vec![4, 16, 11, 11]);
    }
}
