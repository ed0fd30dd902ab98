use std::fmt;

use burn::data::dataset::Dataset;
use ndarray::{Array4, Axis};

use crate::data::DataError;

/// One image in channel-major layout plus its class label.
#[derive(Debug, Clone)]
pub struct ImageItem {
    /// `C * H * W` pixel values in `[0, 1]`
    pub pixels: Vec<f32>,
    pub label:  usize,
}

/// An in-memory split: images as `[N, C, H, W]` and one label per image.
pub struct ImageSplit {
    images: Array4<f32>,
    labels: Vec<usize>,
}

impl ImageSplit {
    pub fn new(images: Array4<f32>, labels: Vec<usize>) -> Result<Self, DataError> {
        let count = images.len_of(Axis(0));
        if count != labels.len() {
            return Err(DataError::CountMismatch { images: count, labels: labels.len() });
        }
        Ok(Self { images, labels })
    }

    /// `[C, H, W]` of every image in the split.
    pub fn image_shape(&self) -> [usize; 3] {
        let (_, c, h, w) = self.images.dim();
        [c, h, w]
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Collect the items at `indices`, in order.
    pub fn items(&self, indices: &[usize]) -> Vec<ImageItem> {
        indices.iter().filter_map(|&i| self.get(i)).collect()
    }
}

impl Dataset<ImageItem> for ImageSplit {
    fn get(&self, index: usize) -> Option<ImageItem> {
        let label = *self.labels.get(index)?;
        let pixels = self.images.index_axis(Axis(0), index).iter().copied().collect();
        Some(ImageItem { pixels, label })
    }

    fn len(&self) -> usize {
        self.labels.len()
    }
}

/// Train and test splits of one classification dataset.
pub struct ImageDataset {
    pub train:       ImageSplit,
    pub test:        ImageSplit,
    pub num_classes: usize,
}

impl ImageDataset {
    pub fn new(train: ImageSplit, test: ImageSplit) -> Result<Self, DataError> {
        if train.image_shape() != test.image_shape() {
            let [c, h, w] = test.image_shape();
            return Err(DataError::BadShape {
                what:  "test images (differs from train)".to_string(),
                shape: vec![c, h, w],
            });
        }
        let num_classes = train
            .labels()
            .iter()
            .chain(test.labels())
            .max()
            .map_or(0, |&m| m + 1);
        Ok(Self { train, test, num_classes })
    }

    pub fn image_shape(&self) -> [usize; 3] {
        self.train.image_shape()
    }
}

impl fmt::Display for ImageDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [c, h, w] = self.image_shape();
        write!(
            f,
            "ImageDataset(train={}, test={}, image={}x{}x{}, classes={})",
            self.train.len(),
            self.test.len(),
            c, h, w,
            self.num_classes,
        )
    }
}
