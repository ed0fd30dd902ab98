// ============================================================
// Layer 4 — SVHN Converter
// ============================================================
// One-shot conversion of the raw SVHN distribution
// (train_32x32.mat / test_32x32.mat, MATLAB v5) into the npz
// layout the NpzLoader reads.
//
//   X : uint8 [32, 32, 3, N], column-major → permuted to [N, 32, 32, 3]
//   y : [N, 1], labels 1..=10               → shifted to 0..=9
//
// Output splits (tails of the raw files):
//   test.npz  ← last `test_size`  samples of train_32x32.mat
//   train.npz ← last `train_size` samples of test_32x32.mat

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use matfile::{MatFile, NumericData};
use ndarray::{s, Array1, Array4, ArrayView1, ArrayView4, Axis, ShapeBuilder};
use ndarray_npy::NpzWriter;

use crate::data::{
    loader::{IMAGE_ENTRY, LABEL_ENTRY, TEST_FILE, TRAIN_FILE},
    DataError,
};

pub const RAW_TRAIN_FILE: &str = "train_32x32.mat";
pub const RAW_TEST_FILE:  &str = "test_32x32.mat";

/// Settings for one conversion run.
#[derive(Debug, Clone)]
pub struct SvhnConverter {
    pub raw_dir:    PathBuf,
    pub out_dir:    PathBuf,
    pub train_size: usize,
    pub test_size:  usize,
}

impl SvhnConverter {
    /// Convert both raw files and write `train.npz` and `test.npz`.
    /// Returns the paths written.
    pub fn run(&self) -> Result<Vec<PathBuf>, DataError> {
        fs::create_dir_all(&self.out_dir).map_err(|source| DataError::Io {
            path: self.out_dir.clone(),
            source,
        })?;

        let mut written = Vec::with_capacity(2);

        let (images, labels) = read_mat(&self.raw_dir.join(RAW_TRAIN_FILE))?;
        let (images, labels) = tail(images.view(), labels.view(), self.test_size);
        let out = self.out_dir.join(TEST_FILE);
        save_npz(images, labels, &out)?;
        written.push(out);

        let (images, labels) = read_mat(&self.raw_dir.join(RAW_TEST_FILE))?;
        let (images, labels) = tail(images.view(), labels.view(), self.train_size);
        let out = self.out_dir.join(TRAIN_FILE);
        save_npz(images, labels, &out)?;
        written.push(out);

        Ok(written)
    }
}

/// Read `X` and `y` from one raw SVHN file.
pub fn read_mat(path: &Path) -> Result<(Array4<u8>, Array1<i64>), DataError> {
    if !path.exists() {
        return Err(DataError::MissingFile(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mat = MatFile::parse(file).map_err(|e| DataError::Mat {
        path:    path.to_path_buf(),
        message: e.to_string(),
    })?;

    let missing = |name: &str| DataError::MissingVariable {
        path: path.to_path_buf(),
        name: name.to_string(),
    };
    let x = mat.find_by_name("X").ok_or_else(|| missing("X"))?;
    let y = mat.find_by_name("y").ok_or_else(|| missing("y"))?;

    let pixels = real_u8(x.data()).ok_or_else(|| DataError::BadShape {
        what:  "X (unsupported element type)".to_string(),
        shape: x.size().clone(),
    })?;
    let images = from_column_major(x.size(), pixels)?;

    let raw_labels = real_i64(y.data()).ok_or_else(|| DataError::BadShape {
        what:  "y (unsupported element type)".to_string(),
        shape: y.size().clone(),
    })?;
    let labels = to_zero_based(&raw_labels);
    check_counts(images.view(), labels.view())?;

    tracing::info!(
        "Read '{}': {} images, {} labels",
        path.display(),
        images.len_of(Axis(0)),
        labels.len()
    );
    Ok((images, labels))
}

/// Rebuild a MATLAB `[H, W, C, N]` column-major buffer as `[N, H, W, C]`.
pub fn from_column_major(size: &[usize], data: Vec<u8>) -> Result<Array4<u8>, DataError> {
    let bad_shape = || DataError::BadShape { what: "X".to_string(), shape: size.to_vec() };
    let &[h, w, c, n] = size else {
        return Err(bad_shape());
    };
    let hwcn = Array4::from_shape_vec((h, w, c, n).f(), data).map_err(|_| bad_shape())?;
    Ok(hwcn.permuted_axes([3, 0, 1, 2]).as_standard_layout().into_owned())
}

/// MATLAB labels are 1-based.
pub fn to_zero_based(labels: &[i64]) -> Array1<i64> {
    labels.iter().map(|&l| l - 1).collect()
}

/// `X` and `y` must describe the same number of samples.
pub fn check_counts(images: ArrayView4<'_, u8>, labels: ArrayView1<'_, i64>) -> Result<(), DataError> {
    let count = images.len_of(Axis(0));
    if count != labels.len() {
        return Err(DataError::CountMismatch { images: count, labels: labels.len() });
    }
    Ok(())
}

/// Keep the last `k` samples (all of them if there are fewer).
pub fn tail<'a>(
    images: ArrayView4<'a, u8>,
    labels: ArrayView1<'a, i64>,
    k:      usize,
) -> (ArrayView4<'a, u8>, ArrayView1<'a, i64>) {
    let start_images = images.len_of(Axis(0)).saturating_sub(k);
    let start_labels = labels.len().saturating_sub(k);
    (
        images.slice_move(s![start_images.., .., .., ..]),
        labels.slice_move(s![start_labels..]),
    )
}

/// Write an `image` / `label` pair as a compressed npz.
/// The count check happens before the file is created.
pub fn save_npz(
    images: ArrayView4<'_, u8>,
    labels: ArrayView1<'_, i64>,
    path:   &Path,
) -> Result<(), DataError> {
    check_counts(images, labels)?;

    let write_error = |e: &dyn std::fmt::Display| DataError::NpzWrite {
        path:    path.to_path_buf(),
        message: e.to_string(),
    };
    let file = File::create(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut npz = NpzWriter::new_compressed(file);
    npz.add_array(IMAGE_ENTRY, &images).map_err(|e| write_error(&e))?;
    npz.add_array(LABEL_ENTRY, &labels).map_err(|e| write_error(&e))?;
    npz.finish().map_err(|e| write_error(&e))?;

    tracing::info!("Save data to {}", path.display());
    Ok(())
}

fn real_u8(data: &NumericData) -> Option<Vec<u8>> {
    match data {
        NumericData::UInt8 { real, .. }  => Some(real.clone()),
        NumericData::Double { real, .. } => Some(real.iter().map(|&v| v as u8).collect()),
        NumericData::Single { real, .. } => Some(real.iter().map(|&v| v as u8).collect()),
        _ => None,
    }
}

fn real_i64(data: &NumericData) -> Option<Vec<i64>> {
    match data {
        NumericData::UInt8 { real, .. }  => Some(real.iter().map(|&v| i64::from(v)).collect()),
        NumericData::Int32 { real, .. }  => Some(real.iter().map(|&v| i64::from(v)).collect()),
        NumericData::Int64 { real, .. }  => Some(real.clone()),
        NumericData::Double { real, .. } => Some(real.iter().map(|&v| v as i64).collect()),
        NumericData::Single { real, .. } => Some(real.iter().map(|&v| v as i64).collect()),
        _ => None,
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::load_split;
    use burn::data::dataset::Dataset;

    #[test]
    fn test_column_major_permutation() {
        // [H=2, W=2, C=3, N=2]; value encodes its own coordinates.
        let (h, w, c, n) = (2usize, 2usize, 3usize, 2usize);
        let mut data = vec![0u8; h * w * c * n];
        for ni in 0..n {
            for ci in 0..c {
                for wi in 0..w {
                    for hi in 0..h {
                        let idx = hi + h * (wi + w * (ci + c * ni));
                        data[idx] = (ni * 100 + ci * 10 + wi * 2 + hi) as u8;
                    }
                }
            }
        }

        let nhwc = from_column_major(&[h, w, c, n], data).unwrap();

        assert_eq!(nhwc.dim(), (2, 2, 2, 3));
        assert_eq!(nhwc[[1, 0, 1, 2]], 122);
        assert_eq!(nhwc[[0, 1, 0, 0]], 1);
    }

    #[test]
    fn test_wrong_rank_rejected() {
        assert!(from_column_major(&[4, 4], vec![0; 16]).is_err());
    }

    #[test]
    fn test_labels_become_zero_based() {
        assert_eq!(to_zero_based(&[1, 10, 5]).to_vec(), vec![0, 9, 4]);
    }

    #[test]
    fn test_tail_takes_last_samples() {
        let images = Array4::from_shape_fn((5, 1, 1, 1), |(i, ..)| i as u8);
        let labels = Array1::from(vec![0i64, 1, 2, 3, 4]);
        let (imgs, lbls) = tail(images.view(), labels.view(), 2);
        assert_eq!(imgs.len_of(Axis(0)), 2);
        assert_eq!(imgs[[0, 0, 0, 0]], 3);
        assert_eq!(lbls.to_vec(), vec![3, 4]);

        let (imgs, _) = tail(images.view(), labels.view(), 50);
        assert_eq!(imgs.len_of(Axis(0)), 5);
    }

    #[test]
    fn test_count_mismatch_aborts_before_write() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("bad.npz");
        let images = Array4::<u8>::zeros((3, 2, 2, 3));
        let labels = Array1::from(vec![0i64, 1]);

        let err = save_npz(images.view(), labels.view(), &out).unwrap_err();

        assert!(matches!(err, DataError::CountMismatch { images: 3, labels: 2 }));
        assert!(!out.exists());
    }

    #[test]
    fn test_mismatched_raw_counts_caught_before_tail() {
        // 3 images, 2 labels: a tail of 2 would hide the mismatch
        let images = Array4::<u8>::zeros((3, 2, 2, 3));
        let labels = Array1::from(vec![0i64, 1]);

        let err = check_counts(images.view(), labels.view()).unwrap_err();
        assert!(matches!(err, DataError::CountMismatch { images: 3, labels: 2 }));

        let (imgs, lbls) = tail(images.view(), labels.view(), 2);
        assert!(check_counts(imgs, lbls).is_ok());
    }

    #[test]
    fn test_saved_npz_reloads_with_valid_labels() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join(TRAIN_FILE);
        let images = Array4::from_shape_fn((6, 4, 4, 3), |(n, h, w, c)| (n + h + w + c) as u8);
        let labels = to_zero_based(&[1, 2, 3, 10, 10, 4]);

        save_npz(images.view(), labels.view(), &out).unwrap();
        let split = load_split(&out).unwrap();

        assert_eq!(split.len(), split.labels().len());
        assert_eq!(split.len(), 6);
        assert!(split.labels().iter().all(|&l| l <= 9));
        assert_eq!(split.image_shape(), [3, 4, 4]);
    }

    #[test]
    fn test_missing_raw_file_reported() {
        let dir = tempfile::tempdir().unwrap();
        let converter = SvhnConverter {
            raw_dir:    dir.path().to_path_buf(),
            out_dir:    dir.path().join("out"),
            train_size: 5000,
            test_size:  5000,
        };
        assert!(matches!(converter.run(), Err(DataError::MissingFile(_))));
    }
}
