// ============================================================
// Layer 4 — Image Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<ImageItem>
// into device tensors.
//
//   Input:  N items, each with C*H*W pixels and one label
//   Output: images [N, C, H, W] (float), targets [N] (int)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::ImageItem;

/// A batch ready for the classifier forward pass.
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// Shape: [batch_size, channels, height, width]
    pub images: Tensor<B, 4>,

    /// Class index per sample, shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> ImageBatch<B> {
    pub fn size(&self) -> usize {
        self.targets.dims()[0]
    }
}

/// Holds the target device and the per-image shape.
#[derive(Clone, Debug)]
pub struct ImageBatcher<B: Backend> {
    pub device: B::Device,
    shape:      [usize; 3],
}

impl<B: Backend> ImageBatcher<B> {
    pub fn new(device: B::Device, shape: [usize; 3]) -> Self {
        Self { device, shape }
    }
}

impl<B: Backend> Batcher<ImageItem, ImageBatch<B>> for ImageBatcher<B> {
    fn batch(&self, items: Vec<ImageItem>) -> ImageBatch<B> {
        let batch_size = items.len();
        let [channels, height, width] = self.shape;

        let pixels: Vec<f32> = items
            .iter()
            .flat_map(|item| item.pixels.iter().copied())
            .collect();

        let labels: Vec<i32> = items
            .iter()
            .map(|item| item.label as i32)
            .collect();

        let images = Tensor::<B, 1>::from_floats(pixels.as_slice(), &self.device)
            .reshape([batch_size, channels, height, width]);

        let targets = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        ImageBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_batch_shapes_and_values() {
        let device = Default::default();
        let batcher = ImageBatcher::<TestBackend>::new(device, [1, 2, 2]);
        let items = vec![
            ImageItem { pixels: vec![0.0, 0.25, 0.5, 0.75], label: 2 },
            ImageItem { pixels: vec![1.0, 1.0, 1.0, 1.0],  label: 0 },
        ];

        let batch = batcher.batch(items);

        assert_eq!(batch.images.dims(), [2, 1, 2, 2]);
        assert_eq!(batch.size(), 2);
        let targets: Vec<i64> = batch
            .targets
            .into_data()
            .iter::<i64>()
            .collect();
        assert_eq!(targets, vec![2, 0]);
        let first: f32 = batch
            .images
            .slice([0..1, 0..1, 1..2, 1..2])
            .into_scalar()
            .elem::<f32>();
        assert_eq!(first, 0.75);
    }
}
