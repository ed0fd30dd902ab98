// ============================================================
// Layer 4 — Npz Loader
// ============================================================
// Loads `train.npz` and `test.npz` from a data directory.
// Each archive holds two arrays, written by numpy `savez` or by
// the SVHN converter:
//
//   image — uint8 [N, H, W] or [N, H, W, C]
//           (float32 of the same shapes is taken as pre-scaled)
//   label — int64 / int32 / uint8 [N], 0-based class indices
//
// Images come out as float [N, C, H, W] in [0, 1].

use std::{
    fs::File,
    path::{Path, PathBuf},
};

use ndarray::{Array4, ArrayD, Axis, Ix1, Ix4, IxDyn, OwnedRepr};
use ndarray_npy::NpzReader;

use crate::data::{
    dataset::{ImageDataset, ImageSplit},
    DataError,
};

pub const TRAIN_FILE:  &str = "train.npz";
pub const TEST_FILE:   &str = "test.npz";
/// Entry names; the writer adds ".npy" and the reader accepts either form.
pub const IMAGE_ENTRY: &str = "image";
pub const LABEL_ENTRY: &str = "label";

/// Loads both splits from one directory.
pub struct NpzLoader {
    dir: PathBuf,
}

impl NpzLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn load(&self) -> Result<ImageDataset, DataError> {
        let train = load_split(&self.dir.join(TRAIN_FILE))?;
        let test  = load_split(&self.dir.join(TEST_FILE))?;
        let dataset = ImageDataset::new(train, test)?;
        tracing::info!("Loaded {} from '{}'", dataset, self.dir.display());
        Ok(dataset)
    }
}

/// Read one npz archive into an [`ImageSplit`].
pub fn load_split(path: &Path) -> Result<ImageSplit, DataError> {
    if !path.exists() {
        return Err(DataError::MissingFile(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut npz = NpzReader::new(file).map_err(|e| npz_error(path, e))?;

    let images = read_images(&mut npz, path)?;
    let labels = read_labels(&mut npz, path)?;
    let labels = to_class_indices(&labels)?;

    tracing::debug!(
        "Read '{}': images {:?}, {} labels",
        path.display(),
        images.dim(),
        labels.len()
    );
    ImageSplit::new(images, labels)
}

fn npz_error(path: &Path, e: impl std::fmt::Display) -> DataError {
    DataError::NpzRead { path: path.to_path_buf(), message: e.to_string() }
}

fn read_images(npz: &mut NpzReader<File>, path: &Path) -> Result<Array4<f32>, DataError> {
    let pixels: ArrayD<f32> = match npz.by_name::<OwnedRepr<u8>, IxDyn>(IMAGE_ENTRY) {
        Ok(raw) => raw.mapv(|p| f32::from(p) / 255.0),
        Err(_) => npz
            .by_name::<OwnedRepr<f32>, IxDyn>(IMAGE_ENTRY)
            .map_err(|e| npz_error(path, e))?,
    };
    to_nchw(pixels)
}

fn read_labels(npz: &mut NpzReader<File>, path: &Path) -> Result<Vec<i64>, DataError> {
    if let Ok(labels) = npz.by_name::<OwnedRepr<i64>, Ix1>(LABEL_ENTRY) {
        return Ok(labels.to_vec());
    }
    if let Ok(labels) = npz.by_name::<OwnedRepr<i32>, Ix1>(LABEL_ENTRY) {
        return Ok(labels.iter().map(|&l| i64::from(l)).collect());
    }
    let labels = npz
        .by_name::<OwnedRepr<u8>, Ix1>(LABEL_ENTRY)
        .map_err(|e| npz_error(path, e))?;
    Ok(labels.iter().map(|&l| i64::from(l)).collect())
}

/// Rearrange sample-major image arrays into `[N, C, H, W]`.
///
/// `[N, H, W]` gains a unit channel axis. Four-dimensional input is
/// treated as channels-last unless axis 1 already looks like a channel
/// axis (1 or 3) while the last axis does not.
pub fn to_nchw(pixels: ArrayD<f32>) -> Result<Array4<f32>, DataError> {
    let shape = pixels.shape().to_vec();
    let bad_shape = || DataError::BadShape { what: "images".to_string(), shape: shape.clone() };

    let pixels = match shape.len() {
        3 => pixels.insert_axis(Axis(3)),
        4 => pixels,
        _ => return Err(bad_shape()),
    };
    let pixels = pixels.into_dimensionality::<Ix4>().map_err(|_| bad_shape())?;
    let (_, d1, _, d3) = pixels.dim();

    let is_channel = |d: usize| d == 1 || d == 3;
    if is_channel(d1) && !is_channel(d3) {
        return Ok(pixels);
    }
    Ok(pixels.permuted_axes([0, 3, 1, 2]).as_standard_layout().into_owned())
}

fn to_class_indices(labels: &[i64]) -> Result<Vec<usize>, DataError> {
    labels
        .iter()
        .enumerate()
        .map(|(index, &label)| {
            usize::try_from(label).map_err(|_| DataError::LabelOutOfRange { index, label })
        })
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::data::dataset::Dataset;
    use ndarray::{Array1, Array3};
    use ndarray_npy::NpzWriter;

    fn write_npz(path: &Path, images: &ArrayD<u8>, labels: &Array1<i64>) {
        let mut npz = NpzWriter::new(File::create(path).unwrap());
        npz.add_array(IMAGE_ENTRY, images).unwrap();
        npz.add_array(LABEL_ENTRY, labels).unwrap();
        npz.finish().unwrap();
    }

    #[test]
    fn test_greyscale_images_gain_channel_axis() {
        let images = Array3::<f32>::zeros((5, 28, 28)).into_dyn();
        assert_eq!(to_nchw(images).unwrap().dim(), (5, 1, 28, 28));
    }

    #[test]
    fn test_channels_last_is_permuted() {
        let images = ArrayD::from_shape_fn(vec![2, 4, 4, 3], |ix| ix[3] as f32);
        let nchw = to_nchw(images).unwrap();
        assert_eq!(nchw.dim(), (2, 3, 4, 4));
        assert_eq!(nchw[[1, 2, 3, 0]], 2.0);
    }

    #[test]
    fn test_channels_first_is_kept() {
        let images = ArrayD::<f32>::zeros(vec![2, 1, 28, 28]);
        assert_eq!(to_nchw(images).unwrap().dim(), (2, 1, 28, 28));
    }

    #[test]
    fn test_bad_rank_rejected() {
        let images = ArrayD::<f32>::zeros(vec![2, 28]);
        assert!(matches!(to_nchw(images), Err(DataError::BadShape { .. })));
    }

    #[test]
    fn test_negative_label_rejected() {
        let err = to_class_indices(&[0, 3, -1]).unwrap_err();
        assert!(matches!(err, DataError::LabelOutOfRange { index: 2, label: -1 }));
    }

    #[test]
    fn test_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        let images = ArrayD::from_shape_fn(vec![4, 2, 2, 3], |ix| (ix[0] * 50) as u8);
        write_npz(&dir.path().join(TRAIN_FILE), &images, &Array1::from(vec![0, 1, 2, 1]));
        write_npz(&dir.path().join(TEST_FILE), &images, &Array1::from(vec![4, 0, 0, 0]));

        let ds = NpzLoader::new(dir.path()).load().unwrap();

        assert_eq!(ds.train.len(), 4);
        assert_eq!(ds.image_shape(), [3, 2, 2]);
        assert_eq!(ds.num_classes, 5);
        let item = ds.train.get(2).unwrap();
        assert!((item.pixels[0] - 100.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = NpzLoader::new(dir.path()).load().err().unwrap();
        assert!(matches!(err, DataError::MissingFile(ref p) if p.ends_with(TRAIN_FILE)));
    }
}
