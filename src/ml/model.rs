use burn::{
    nn::loss::CrossEntropyLossConfig,
    prelude::*,
};

use crate::data::batcher::ImageBatch;
use crate::domain::run_config::{ConfigError, ModelKind};
use crate::ml::{
    conv_small::{ConvSmall, ConvSmallConfig},
    resnet::{ResNet18, ResNet18Config},
    vgg::{Vgg11, Vgg11Config},
};

/// Every classifier a run can train, behind one module type.
///
/// Selected once at startup by [`Classifier::from_kind`]; the training
/// loop only ever sees `forward` and burn's parameter visiting.
#[derive(Module, Debug)]
pub enum Classifier<B: Backend> {
    ConvSmall(ConvSmall<B>),
    Vgg(Vgg11<B>),
    ResNet(ResNet18<B>),
}

impl<B: Backend> Classifier<B> {
    /// `image_shape` is `[C, H, W]`. Images too small for the
    /// architecture's pooling stages are rejected.
    pub fn from_kind(
        kind:        ModelKind,
        image_shape: [usize; 3],
        num_classes: usize,
        device:      &B::Device,
    ) -> Result<Self, ConfigError> {
        let [channels, height, width] = image_shape;
        let min = kind.min_image_side();
        if height < min || width < min {
            return Err(ConfigError::ImageTooSmall { model: kind, min, height, width });
        }
        Ok(match kind {
            ModelKind::ConvSmall => Classifier::ConvSmall(
                ConvSmallConfig::new(channels, height, width, num_classes).init(device),
            ),
            ModelKind::Vgg => Classifier::Vgg(Vgg11Config::new(channels, num_classes).init(device)),
            ModelKind::Resnet => {
                Classifier::ResNet(ResNet18Config::new(channels, num_classes).init(device))
            }
        })
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Classifier::ConvSmall(_) => ModelKind::ConvSmall,
            Classifier::Vgg(_)       => ModelKind::Vgg,
            Classifier::ResNet(_)    => ModelKind::Resnet,
        }
    }

    /// images: [batch, C, H, W] → logits: [batch, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        match self {
            Classifier::ConvSmall(m) => m.forward(images),
            Classifier::Vgg(m)       => m.forward(images),
            Classifier::ResNet(m)    => m.forward(images),
        }
    }

    /// Mean cross-entropy of one batch, plus the logits it came from.
    pub fn forward_loss(&self, batch: &ImageBatch<B>) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let logits = self.forward(batch.images.clone());
        let loss = cross_entropy(logits.clone(), batch.targets.clone());
        (loss, logits)
    }
}

pub fn cross_entropy<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    CrossEntropyLossConfig::new()
        .init(&logits.device())
        .forward(logits, targets)
}

/// Fraction of rows whose arg-max matches the target.
pub fn accuracy<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> f64 {
    let total = targets.dims()[0];
    if total == 0 {
        return 0.0;
    }
    // argmax(1) gives [batch, 1]; flatten before comparing
    let correct: i64 = logits
        .argmax(1)
        .flatten::<1>(0, 1)
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>();
    correct as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_conv_small_output_shape() {
        let device = Default::default();
        let model = Classifier::<TestBackend>::from_kind(ModelKind::ConvSmall, [1, 28, 28], 10, &device).unwrap();
        let images = Tensor::<TestBackend, 4>::zeros([3, 1, 28, 28], &device);
        assert_eq!(model.forward(images).dims(), [3, 10]);
        assert_eq!(model.kind(), ModelKind::ConvSmall);
    }

    #[test]
    fn test_vgg_output_shape() {
        let device = Default::default();
        let model = Classifier::<TestBackend>::from_kind(ModelKind::Vgg, [3, 32, 32], 10, &device).unwrap();
        let images = Tensor::<TestBackend, 4>::zeros([1, 3, 32, 32], &device);
        assert_eq!(model.forward(images).dims(), [1, 10]);
    }

    #[test]
    fn test_resnet_output_shape() {
        let device = Default::default();
        let model = Classifier::<TestBackend>::from_kind(ModelKind::Resnet, [3, 16, 16], 4, &device).unwrap();
        let images = Tensor::<TestBackend, 4>::zeros([2, 3, 16, 16], &device);
        assert_eq!(model.forward(images).dims(), [2, 4]);
        assert!(model.num_params() > 11_000_000);
    }

    #[test]
    fn test_vgg_rejects_28x28_images() {
        let device = Default::default();
        let err = Classifier::<TestBackend>::from_kind(ModelKind::Vgg, [1, 28, 28], 10, &device)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ImageTooSmall { model: ModelKind::Vgg, min: 32, height: 28, width: 28 }
        ));
    }

    #[test]
    fn test_conv_small_rejects_images_pooled_to_nothing() {
        let device = Default::default();
        let result = Classifier::<TestBackend>::from_kind(ModelKind::ConvSmall, [1, 3, 8], 10, &device);
        assert!(matches!(result, Err(ConfigError::ImageTooSmall { height: 3, .. })));

        let small = Classifier::<TestBackend>::from_kind(ModelKind::ConvSmall, [1, 4, 4], 3, &device)
            .unwrap();
        let images = Tensor::<TestBackend, 4>::zeros([2, 1, 4, 4], &device);
        assert_eq!(small.forward(images).dims(), [2, 3]);
    }

    #[test]
    fn test_accuracy_counts_argmax_matches() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_floats(
            [[0.1, 0.9], [0.8, 0.2], [0.3, 0.7], [0.6, 0.4]],
            &device,
        );
        let targets = Tensor::<TestBackend, 1, Int>::from_ints([1, 0, 0, 0], &device);
        assert_eq!(accuracy(logits, targets), 0.75);
    }
}
