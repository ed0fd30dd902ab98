// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between array files on disk and tensor batches
// on the training device.
//
//   train.npz / test.npz
//       │
//       ▼
//   NpzLoader        → reads `image` / `label`, scales to [0,1], NCHW
//       │
//       ▼
//   ImageSplit       → implements Burn's Dataset trait
//       │
//       ▼
//   sampler          → shuffled batch lists and ghost batches (indices)
//       │
//       ▼
//   ImageBatcher     → stacks items into tensor batches
//
// The SVHN converter is the one-shot tool that produces the
// npz files for SVHN from the raw MATLAB distribution.

use std::path::PathBuf;

use thiserror::Error;

/// Reads train.npz / test.npz from a data directory
pub mod loader;

/// Implements Burn's Dataset trait for in-memory image splits
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Batch and ghost-batch index sampling
pub mod sampler;

/// Raw SVHN .mat → npz conversion
pub mod svhn;

/// Errors raised while reading, validating or writing array data.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("required file '{0}' does not exist")]
    MissingFile(PathBuf),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read npz '{path}': {message}")]
    NpzRead { path: PathBuf, message: String },

    #[error("cannot write npz '{path}': {message}")]
    NpzWrite { path: PathBuf, message: String },

    #[error("cannot parse MATLAB file '{path}': {message}")]
    Mat { path: PathBuf, message: String },

    #[error("MATLAB file '{path}' has no variable '{name}'")]
    MissingVariable { path: PathBuf, name: String },

    #[error("unsupported array shape {shape:?} for '{what}'")]
    BadShape { what: String, shape: Vec<usize> },

    #[error("{images} images but {labels} labels")]
    CountMismatch { images: usize, labels: usize },

    #[error("label {label} at index {index} is out of range")]
    LabelOutOfRange { index: usize, label: i64 },
}
