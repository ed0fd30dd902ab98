use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

/// VGG-11 feature stack: (output channels, followed by a 2x2 max-pool).
const VGG11_LAYERS: [(usize, bool); 8] = [
    (64, true),
    (128, true),
    (256, false),
    (256, true),
    (512, false),
    (512, true),
    (512, false),
    (512, true),
];

#[derive(Config, Debug)]
pub struct Vgg11Config {
    pub in_channels: usize,
    pub num_classes: usize,
}

impl Vgg11Config {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Vgg11<B> {
        let mut blocks = Vec::with_capacity(VGG11_LAYERS.len());
        let mut channels = self.in_channels;
        for (out, pooled) in VGG11_LAYERS {
            blocks.push(VggBlock {
                conv: Conv2dConfig::new([channels, out], [3, 3])
                    .with_padding(PaddingConfig2d::Explicit(1, 1))
                    .init(device),
                norm: BatchNormConfig::new(out).init(device),
                pool: pooled.then(|| MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init()),
            });
            channels = out;
        }
        Vgg11 {
            blocks,
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            head:    LinearConfig::new(channels, self.num_classes).init(device),
        }
    }
}

/// conv 3x3 → batch norm → ReLU, optionally followed by max-pool.
#[derive(Module, Debug)]
pub struct VggBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub norm: BatchNorm<B, 2>,
    pub pool: Option<MaxPool2d>,
}

impl<B: Backend> VggBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.norm.forward(self.conv.forward(x)));
        match &self.pool {
            Some(pool) => pool.forward(x),
            None => x,
        }
    }
}

#[derive(Module, Debug)]
pub struct Vgg11<B: Backend> {
    pub blocks:  Vec<VggBlock<B>>,
    pub avgpool: AdaptiveAvgPool2d,
    pub head:    Linear<B>,
}

impl<B: Backend> Vgg11<B> {
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images;
        for block in &self.blocks {
            x = block.forward(x);
        }
        let x = self.avgpool.forward(x).flatten::<2>(1, 3);
        self.head.forward(x)
    }
}
