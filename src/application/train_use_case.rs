// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates one training run in order:
//
//   Step 1: Validate the config        (Layer 3 - domain)
//   Step 2: Prepare the log directory  (Layer 6 - infra)
//   Step 3: Load train / test splits   (Layer 4 - data)
//   Step 4: Seed and build the model   (Layer 5 - ml)
//   Step 5: Build the optimizer        (Layer 5 - ml)
//   Step 6: Resume from a checkpoint   (Layer 6 - infra)
//   Step 7: Run the training loop      (Layer 5 - ml)

use anyhow::{Context, Result};
use burn::{module::Module, tensor::backend::{AutodiffBackend, Backend}};
use std::fs;

use crate::data::loader::NpzLoader;
use crate::domain::{run_config::RunConfig, schedule::lr_at};
use crate::infra::{
    checkpoint::CheckpointStore,
    metrics::ScalarWriter,
    run_log::RunLog,
};
use crate::ml::{
    model::Classifier,
    trainer::{RunOutputs, Trainer, TrainingState},
};

pub const CONFIG_FILE: &str = "config.json";

#[cfg(not(feature = "wgpu"))]
pub type TrainBackend = burn::backend::Autodiff<burn::backend::NdArray>;

#[cfg(feature = "wgpu")]
pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: RunConfig,
}

impl TrainUseCase {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Train on the default backend for this build.
    pub fn execute(&self) -> Result<()> {
        let device = <TrainBackend as Backend>::Device::default();
        tracing::info!("Using device: {:?}", device);
        self.execute_on::<TrainBackend>(&device)?;
        Ok(())
    }

    /// Run the whole pipeline on backend `B` and return the final state.
    pub fn execute_on<B: AutodiffBackend>(&self, device: &B::Device) -> Result<TrainingState<B>> {
        let cfg = &self.config;

        // ── Step 1: Validate ──────────────────────────────────────────────────
        cfg.validate().context("Invalid run configuration")?;

        // ── Step 2: Log directory, config dump ────────────────────────────────
        fs::create_dir_all(&cfg.log_dir)
            .with_context(|| format!("Cannot create log directory '{}'", cfg.log_dir.display()))?;
        let log = RunLog::new(&cfg.log_dir)?;

        let config_json = serde_json::to_string_pretty(cfg)?;
        let config_path = cfg.log_dir.join(CONFIG_FILE);
        fs::write(&config_path, &config_json)
            .with_context(|| format!("Cannot write config to '{}'", config_path.display()))?;
        log.section("config", &config_json)?;

        // ── Step 3: Data ──────────────────────────────────────────────────────
        let dataset = NpzLoader::new(&cfg.data_dir)
            .load()
            .with_context(|| format!("Cannot load dataset from '{}'", cfg.data_dir.display()))?;
        log.note(format!("data: {dataset}"))?;

        // ── Step 4: Model ─────────────────────────────────────────────────────
        B::seed(cfg.seed);
        let model: Classifier<B> =
            Classifier::from_kind(cfg.model, dataset.image_shape(), dataset.num_classes, device)
                .with_context(|| format!("Cannot build model for '{}'", cfg.data_dir.display()))?;
        log.note(format!("model: {}, n_param: {}", model.kind(), model.num_params()))?;

        // ── Step 5: Optimizer ─────────────────────────────────────────────────
        let mut state = TrainingState::fresh(cfg, model);
        log.note(format!(
            "optimizer: SGD(lr={}, momentum={}, weight_decay={})",
            cfg.learning_rate, cfg.momentum, cfg.weight_decay
        ))?;

        // ── Step 6: Resume ────────────────────────────────────────────────────
        if let Some(path) = &cfg.resume {
            let record = CheckpointStore::load::<B>(path, device)
                .with_context(|| format!("Cannot resume from '{}'", path.display()))?;
            state = record.into_state(state.model, state.optimizer);
            log.note(format!("=> loaded checkpoint '{}'", path.display()))?;

            // The checkpoint stores the rate after its own iteration ran.
            if let Some(last) = state.next_iter.checked_sub(1) {
                let expected = lr_at(cfg.learning_rate, &cfg.schedule, last);
                if (state.learning_rate - expected).abs() > expected.abs() * 1e-9 {
                    tracing::warn!(
                        "Checkpoint learning rate {} differs from {} implied by the schedule",
                        state.learning_rate,
                        expected
                    );
                }
            }
        }
        cfg.check_range(state.next_iter)
            .context("Nothing left to train")?;

        // ── Step 7: Train ─────────────────────────────────────────────────────
        let scalars = ScalarWriter::new(&cfg.log_dir)?;
        tracing::info!(
            "Writing scalars to '{}' and status lines to '{}'",
            scalars.csv_path().display(),
            log.path().display()
        );
        let outputs = RunOutputs {
            scalars,
            log,
            checkpoints: CheckpointStore::new(&cfg.log_dir),
        };
        let mut trainer = Trainer::<B>::new(cfg, &dataset, device, state.next_iter, outputs);
        trainer.run(state)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::{IMAGE_ENTRY, LABEL_ENTRY, TEST_FILE, TRAIN_FILE};
    use crate::domain::run_config::{ModelKind, NoiseConfig};
    use burn::backend::{Autodiff, NdArray};
    use ndarray::{Array1, Array3};
    use ndarray_npy::NpzWriter;
    use std::{fs::File, path::Path};

    type TestBackend = Autodiff<NdArray>;

    /// 8x8 greyscale images whose brightness encodes one of 3 classes.
    fn write_split(path: &Path, n: usize) {
        let labels: Array1<i64> = (0..n).map(|i| (i % 3) as i64).collect();
        let images = Array3::from_shape_fn((n, 8, 8), |(i, y, x)| (labels[i] as u8) * 80 + ((x + y) % 4) as u8);
        let mut npz = NpzWriter::new(File::create(path).unwrap());
        npz.add_array(IMAGE_ENTRY, &images).unwrap();
        npz.add_array(LABEL_ENTRY, &labels).unwrap();
        npz.finish().unwrap();
    }

    fn setup(root: &Path, iters: usize) -> RunConfig {
        let data_dir = root.join("data");
        fs::create_dir_all(&data_dir).unwrap();
        write_split(&data_dir.join(TRAIN_FILE), 18);
        write_split(&data_dir.join(TEST_FILE), 9);
        RunConfig {
            seed:             3,
            iters,
            batch_size:       6,
            test_batch_size:  9,
            learning_rate:    0.05,
            model:            ModelKind::ConvSmall,
            checkpoint_every: 2,
            data_dir,
            log_dir:          root.join("logs"),
            ..RunConfig::default()
        }
    }

    fn run(config: RunConfig) -> Result<TrainingState<TestBackend>> {
        TrainUseCase::new(config).execute_on::<TestBackend>(&Default::default())
    }

    #[test]
    fn test_run_writes_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = setup(dir.path(), 3);
        let state = run(cfg.clone()).unwrap();
        assert_eq!(state.next_iter, 3);

        let dumped: RunConfig =
            serde_json::from_str(&fs::read_to_string(cfg.log_dir.join(CONFIG_FILE)).unwrap()).unwrap();
        assert_eq!(dumped, cfg);

        let log = fs::read_to_string(cfg.log_dir.join("log.txt")).unwrap();
        assert!(log.contains("model: conv-small, n_param: "));
        assert_eq!(log.lines().filter(|l| l.starts_with("Iter:")).count(), 3);
        assert!(cfg.log_dir.join("scalars.csv").is_file());
        assert!(cfg.log_dir.join("iter-0.mpk.gz").is_file());
        assert!(cfg.log_dir.join("iter-2.mpk.gz").is_file());
    }

    #[test]
    fn test_resume_continues_after_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = setup(dir.path(), 3);
        run(cfg.clone()).unwrap();

        let checkpoint = cfg.log_dir.join("iter-2.mpk.gz");
        let resumed = RunConfig {
            iters:  5,
            resume: Some(checkpoint.clone()),
            noise:  Some(NoiseConfig { ghost_size: 4, num_ghost: 2, update_interval: 10 }),
            ..cfg.clone()
        };
        let state = run(resumed).unwrap();
        assert_eq!(state.next_iter, 5);

        let log = fs::read_to_string(cfg.log_dir.join("log.txt")).unwrap();
        assert!(log.contains(&format!("=> loaded checkpoint '{}'", checkpoint.display())));
        let iters: Vec<&str> = log.lines().filter(|l| l.starts_with("Iter:")).collect();
        assert_eq!(iters.len(), 5);
        assert!(iters[3].starts_with("Iter:3,"));
    }

    #[test]
    fn test_resume_past_end_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = setup(dir.path(), 3);
        run(cfg.clone()).unwrap();

        let err = run(RunConfig { resume: Some(cfg.log_dir.join("iter-2.mpk.gz")), ..cfg })
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("iteration range is empty"));
    }

    #[test]
    fn test_missing_checkpoint_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = setup(dir.path(), 3);
        let err = run(RunConfig { resume: Some(dir.path().join("nope.mpk.gz")), ..cfg })
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("cannot load checkpoint"));
    }

    #[test]
    fn test_missing_data_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = RunConfig { data_dir: dir.path().join("empty"), ..setup(dir.path(), 3) };
        assert!(run(cfg).is_err());
    }

    #[test]
    fn test_vgg_on_small_images_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = RunConfig { model: ModelKind::Vgg, ..setup(dir.path(), 3) };
        let err = run(cfg.clone()).err().unwrap();
        assert!(format!("{err:#}").contains("vgg needs images of at least 32x32, got 8x8"));
        assert!(!cfg.log_dir.join("iter-0.mpk.gz").exists());
    }
}
