use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

/// (channels, stride of the first block) for each of the four stages.
const RESNET18_STAGES: [(usize, usize); 4] = [(64, 1), (128, 2), (256, 2), (512, 2)];
const BLOCKS_PER_STAGE: usize = 2;

#[derive(Config, Debug)]
pub struct ResNet18Config {
    pub in_channels: usize,
    pub num_classes: usize,
}

impl ResNet18Config {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNet18<B> {
        let mut blocks = Vec::with_capacity(RESNET18_STAGES.len() * BLOCKS_PER_STAGE);
        let mut channels = 64;
        for (out, first_stride) in RESNET18_STAGES {
            for i in 0..BLOCKS_PER_STAGE {
                let stride = if i == 0 { first_stride } else { 1 };
                blocks.push(BasicBlock::new(channels, out, stride, device));
                channels = out;
            }
        }
        ResNet18 {
            stem:      conv3x3(self.in_channels, 64, 1, device),
            stem_norm: BatchNormConfig::new(64).init(device),
            blocks,
            avgpool:   AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            head:      LinearConfig::new(channels, self.num_classes).init(device),
        }
    }
}

fn conv3x3<B: Backend>(input: usize, output: usize, stride: usize, device: &B::Device) -> Conv2d<B> {
    Conv2dConfig::new([input, output], [3, 3])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .with_bias(false)
        .init(device)
}

/// 1x1 projection used when a block changes width or resolution.
#[derive(Module, Debug)]
pub struct Shortcut<B: Backend> {
    pub conv: Conv2d<B>,
    pub norm: BatchNorm<B, 2>,
}

#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    pub conv1:    Conv2d<B>,
    pub bn1:      BatchNorm<B, 2>,
    pub conv2:    Conv2d<B>,
    pub bn2:      BatchNorm<B, 2>,
    pub shortcut: Option<Shortcut<B>>,
}

impl<B: Backend> BasicBlock<B> {
    fn new(input: usize, output: usize, stride: usize, device: &B::Device) -> Self {
        let shortcut = (stride != 1 || input != output).then(|| Shortcut {
            conv: Conv2dConfig::new([input, output], [1, 1])
                .with_stride([stride, stride])
                .with_bias(false)
                .init(device),
            norm: BatchNormConfig::new(output).init(device),
        });
        Self {
            conv1: conv3x3(input, output, stride, device),
            bn1:   BatchNormConfig::new(output).init(device),
            conv2: conv3x3(output, output, 1, device),
            bn2:   BatchNormConfig::new(output).init(device),
            shortcut,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.shortcut {
            Some(s) => s.norm.forward(s.conv.forward(x.clone())),
            None => x.clone(),
        };
        let out = relu(self.bn1.forward(self.conv1.forward(x)));
        let out = self.bn2.forward(self.conv2.forward(out));
        relu(out + identity)
    }
}

/// CIFAR-style ResNet-18 (3x3 stem, no initial max-pool).
#[derive(Module, Debug)]
pub struct ResNet18<B: Backend> {
    pub stem:      Conv2d<B>,
    pub stem_norm: BatchNorm<B, 2>,
    pub blocks:    Vec<BasicBlock<B>>,
    pub avgpool:   AdaptiveAvgPool2d,
    pub head:      Linear<B>,
}

impl<B: Backend> ResNet18<B> {
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = relu(self.stem_norm.forward(self.stem.forward(images)));
        for block in &self.blocks {
            x = block.forward(x);
        }
        let x = self.avgpool.forward(x).flatten::<2>(1, 3);
        self.head.forward(x)
    }
}
