//! Building blocks shared by the generator and discriminator

use tch::{nn, Tensor};

/// Negative slope of the leaky rectifiers
pub const LEAKY_SLOPE: f64 = 0.2;

/// Kernel size of every convolution in both networks
pub const KERNEL_SIZE: i64 = 4;

/// Batch norm with a running-average momentum of 0.2 per step
pub fn batch_norm_config() -> nn::BatchNormConfig {
    nn::BatchNormConfig {
        momentum: 0.2,
        eps: 1e-3,
        ..Default::default()
    }
}

/// Stride-2 convolution halving the spatial size
pub fn down_conv(vs: nn::Path, in_channels: i64, out_channels: i64) -> nn::Conv2D {
    let config = nn::ConvConfig {
        stride: 2,
        padding: 1,
        ..Default::default()
    };
    nn::conv2d(vs, in_channels, out_channels, KERNEL_SIZE, config)
}

/// Stride-1 convolution; pair with [`pad_same`] to keep the spatial size
pub fn same_conv(vs: nn::Path, in_channels: i64, out_channels: i64) -> nn::Conv2D {
    nn::conv2d(vs, in_channels, out_channels, KERNEL_SIZE, Default::default())
}

/// Pad so a stride-1 convolution with an even kernel keeps the input size.
///
/// The extra row and column go after the input.
pub fn pad_same(xs: &Tensor) -> Tensor {
    let before = (KERNEL_SIZE - 1) / 2;
    let after = KERNEL_SIZE - 1 - before;
    xs.constant_pad_nd([before, after, before, after])
}

/// Leaky rectifier with an explicit slope
pub fn leaky_relu(xs: &Tensor, slope: f64) -> Tensor {
    xs.maximum(&(xs * slope))
}

/// Nearest-neighbour upsampling by a factor of two
pub fn upsample2(xs: &Tensor) -> Tensor {
    let size = xs.size();
    let (height, width) = (size[2], size[3]);
    xs.upsample_nearest2d([height * 2, width * 2], None::<f64>, None::<f64>)
}
