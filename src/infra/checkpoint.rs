// ============================================================
// Layer 6 — Checkpoint Store
// ============================================================
// One artifact per saved iteration:
//
//   <logdir>/
//     iter-0.mpk.gz
//     iter-100.mpk.gz
//     ...
//
// Each artifact holds four named fields: iteration, learning
// rate, model record and optimizer record (momentum buffers).
// Written with NamedMpkGzFileRecorder at full precision so a
// load reproduces the saved parameters bit for bit.
//
// The recorder appends ".mpk.gz" itself; paths handed to it
// are stems. `load` accepts either form.

use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    optim::Optimizer,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Record, Recorder},
    tensor::backend::AutodiffBackend,
};
use thiserror::Error;

use crate::ml::{
    model::{Classifier, ClassifierRecord},
    trainer::{ClassifierOptimizer, TrainingState},
};

pub const CHECKPOINT_EXTENSION: &str = "mpk.gz";

type CheckpointRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

pub type OptimizerRecord<B> = <ClassifierOptimizer<B> as Optimizer<Classifier<B>, B>>::Record;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("cannot save checkpoint '{path}': {reason}")]
    Save { path: PathBuf, reason: String },

    #[error("cannot load checkpoint '{path}': {reason}")]
    Load { path: PathBuf, reason: String },
}

#[derive(Record)]
pub struct CheckpointRecord<B: AutodiffBackend> {
    pub iteration:     usize,
    pub learning_rate: f64,
    pub model:         ClassifierRecord<B>,
    pub optimizer:     OptimizerRecord<B>,
}

impl<B: AutodiffBackend> CheckpointRecord<B> {
    /// Restore into freshly built templates; training continues at
    /// `iteration + 1`.
    pub fn into_state(
        self,
        model:     Classifier<B>,
        optimizer: ClassifierOptimizer<B>,
    ) -> TrainingState<B> {
        TrainingState {
            next_iter:     self.iteration + 1,
            learning_rate: self.learning_rate,
            model:         model.load_record(self.model),
            optimizer:     optimizer.load_record(self.optimizer),
        }
    }
}

pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Full artifact path for `iteration`, extension included.
    pub fn path_for(&self, iteration: usize) -> PathBuf {
        self.dir
            .join(format!("iter-{iteration}.{CHECKPOINT_EXTENSION}"))
    }

    /// Snapshot `state` as the checkpoint of the iteration just
    /// completed. Re-saving an iteration overwrites it.
    pub fn save<B: AutodiffBackend>(
        &self,
        iteration: usize,
        state:     &TrainingState<B>,
    ) -> Result<PathBuf, CheckpointError> {
        let path = self.path_for(iteration);
        let record = CheckpointRecord::<B> {
            iteration,
            learning_rate: state.learning_rate,
            model:         state.model.clone().into_record(),
            optimizer:     state.optimizer.to_record(),
        };

        Recorder::<B>::record(&CheckpointRecorder::new(), record, artifact_stem(&path))
            .map_err(|e| CheckpointError::Save { path: path.clone(), reason: e.to_string() })?;

        tracing::debug!("Saved checkpoint: '{}'", path.display());
        Ok(path)
    }

    /// Read a checkpoint back. A missing or malformed artifact is a
    /// `CheckpointError::Load`.
    pub fn load<B: AutodiffBackend>(
        path:   &Path,
        device: &B::Device,
    ) -> Result<CheckpointRecord<B>, CheckpointError> {
        let stem = artifact_stem(path);
        let file = stem.with_extension(CHECKPOINT_EXTENSION);
        if !file.is_file() {
            return Err(CheckpointError::Load {
                path:   file,
                reason: "no such file".to_string(),
            });
        }

        Recorder::<B>::load::<CheckpointRecord<B>>(&CheckpointRecorder::new(), stem, device)
            .map_err(|e| CheckpointError::Load { path: file, reason: e.to_string() })
    }
}

/// Strip a trailing ".mpk.gz" so the recorder can add it back.
fn artifact_stem(path: &Path) -> PathBuf {
    let suffix = format!(".{CHECKPOINT_EXTENSION}");
    match path.to_str().and_then(|s| s.strip_suffix(&suffix)) {
        Some(stem) => PathBuf::from(stem),
        None => path.to_path_buf(),
    }
}
