use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

#[derive(Config, Debug)]
pub struct ConvSmallConfig {
    pub in_channels: usize,
    pub height:      usize,
    pub width:       usize,
    pub num_classes: usize,
    #[config(default = 128)]
    pub hidden:      usize,
}

impl ConvSmallConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ConvSmall<B> {
        // Two 2x2 pools with "same" convolutions divide each side by 4.
        let flat = 64 * (self.height / 4) * (self.width / 4);
        ConvSmall {
            conv1: Conv2dConfig::new([self.in_channels, 32], [5, 5])
                .with_padding(PaddingConfig2d::Explicit(2, 2))
                .init(device),
            conv2: Conv2dConfig::new([32, 64], [5, 5])
                .with_padding(PaddingConfig2d::Explicit(2, 2))
                .init(device),
            pool:  MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            fc1:   LinearConfig::new(flat, self.hidden).init(device),
            fc2:   LinearConfig::new(self.hidden, self.num_classes).init(device),
        }
    }
}

/// Small convnet for FashionMNIST-sized input.
#[derive(Module, Debug)]
pub struct ConvSmall<B: Backend> {
    pub conv1: Conv2d<B>,
    pub conv2: Conv2d<B>,
    pub pool:  MaxPool2d,
    pub fc1:   Linear<B>,
    pub fc2:   Linear<B>,
}

impl<B: Backend> ConvSmall<B> {
    /// images: [batch, C, H, W] → logits: [batch, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(relu(self.conv1.forward(images)));
        let x = self.pool.forward(relu(self.conv2.forward(x)));
        let x = x.flatten::<2>(1, 3);
        self.fc2.forward(relu(self.fc1.forward(x)))
    }
}
