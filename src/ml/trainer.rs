// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Full-batch training with optional diagonal-Fisher noise.
//
// Per iteration i in [start, iters):
//   1. decay the learning rate if i is a schedule point
//   2. refresh the noise estimate (noise runs only)
//   3. accumulate gradients over the whole training list
//   4. divide by the number of batches, add noise
//   5. one SGD step
//   6. evaluate on the test set (dense early, then every 100)
//   7. checkpoint every `checkpoint_every` iterations
//
// Backends:
//   - training runs on B (an AutodiffBackend)
//   - model.valid() gives the same model on B::InnerBackend,
//     so test batches are built for the inner backend
//
// Randomness:
//   - the training list is shuffled once from `seed`, so a
//     resumed run sees the same batches
//   - ghost sampling and noise draws share a second RNG seeded
//     from `seed` and the start iteration

use anyhow::{Context, Result};
use burn::{
    data::dataloader::batcher::Batcher,
    data::dataset::Dataset,
    module::AutodiffModule,
    optim::{
        adaptor::OptimizerAdaptor,
        decay::WeightDecayConfig,
        momentum::MomentumConfig,
        GradientsAccumulator, GradientsParams, Optimizer, Sgd, SgdConfig,
    },
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, SeedableRng};

use crate::data::{
    batcher::{ImageBatch, ImageBatcher},
    dataset::{ImageDataset, ImageSplit},
    sampler::{batch_indices, ghost_indices},
};
use crate::domain::{
    eval_summary::{BatchStats, EvalSummary},
    run_config::{NoiseConfig, RunConfig},
    schedule::{decays_at, is_checkpoint_iteration, is_eval_iteration, LR_DECAY},
};
use crate::infra::{checkpoint::CheckpointStore, metrics::ScalarWriter, run_log::RunLog};
use crate::ml::{
    model::{accuracy, cross_entropy, Classifier},
    noise::{mean_and_perturb, NoiseEstimate},
};

pub type ClassifierOptimizer<B> =
    OptimizerAdaptor<Sgd<<B as AutodiffBackend>::InnerBackend>, Classifier<B>, B>;

/// Everything that changes from one iteration to the next.
pub struct TrainingState<B: AutodiffBackend> {
    /// First iteration still to run
    pub next_iter:     usize,
    pub learning_rate: f64,
    pub model:         Classifier<B>,
    pub optimizer:     ClassifierOptimizer<B>,
}

impl<B: AutodiffBackend> TrainingState<B> {
    pub fn fresh(config: &RunConfig, model: Classifier<B>) -> Self {
        Self {
            next_iter:     0,
            learning_rate: config.learning_rate,
            model,
            optimizer:     build_optimizer::<B>(config),
        }
    }
}

/// SGD with momentum and weight decay only when they are non-zero.
pub fn sgd_config(config: &RunConfig) -> SgdConfig {
    let momentum = (config.momentum > 0.0).then(|| {
        MomentumConfig::new()
            .with_momentum(config.momentum)
            .with_dampening(0.0)
            .with_nesterov(false)
    });
    let weight_decay =
        (config.weight_decay > 0.0).then(|| WeightDecayConfig::new(config.weight_decay as f32));
    SgdConfig::new()
        .with_momentum(momentum)
        .with_weight_decay(weight_decay)
}

pub fn build_optimizer<B: AutodiffBackend>(config: &RunConfig) -> ClassifierOptimizer<B> {
    sgd_config(config).init::<B, Classifier<B>>()
}

/// Where a run writes: scalars, status lines, checkpoints.
pub struct RunOutputs {
    pub scalars:     ScalarWriter,
    pub log:         RunLog,
    pub checkpoints: CheckpointStore,
}

pub struct Trainer<'a, B: AutodiffBackend> {
    config:        &'a RunConfig,
    train:         &'a ImageSplit,
    train_batches: Vec<ImageBatch<B>>,
    test_batches:  Vec<ImageBatch<B::InnerBackend>>,
    ghost_batcher: ImageBatcher<B>,
    noise_rng:     StdRng,
    outputs:       RunOutputs,
}

impl<'a, B: AutodiffBackend> Trainer<'a, B> {
    /// `start_iter` is where the loop will begin; it is non-zero
    /// exactly when resuming.
    pub fn new(
        config:     &'a RunConfig,
        dataset:    &'a ImageDataset,
        device:     &B::Device,
        start_iter: usize,
        outputs:    RunOutputs,
    ) -> Self {
        let shape = dataset.image_shape();
        let train_batcher = ImageBatcher::<B>::new(device.clone(), shape);
        let test_batcher = ImageBatcher::<B::InnerBackend>::new(device.clone(), shape);

        let mut data_rng = StdRng::seed_from_u64(config.seed);
        let train_batches = batch_indices(dataset.train.len(), config.batch_size, true, &mut data_rng)
            .iter()
            .map(|idx| train_batcher.batch(dataset.train.items(idx)))
            .collect::<Vec<_>>();
        let test_batches = batch_indices(dataset.test.len(), config.test_batch_size, false, &mut data_rng)
            .iter()
            .map(|idx| test_batcher.batch(dataset.test.items(idx)))
            .collect::<Vec<_>>();

        tracing::info!(
            "Prepared {} train batches ({} samples) and {} test batches ({} samples)",
            train_batches.len(),
            train_batches.iter().map(ImageBatch::size).sum::<usize>(),
            test_batches.len(),
            test_batches.iter().map(ImageBatch::size).sum::<usize>()
        );

        Self {
            config,
            train: &dataset.train,
            train_batches,
            test_batches,
            ghost_batcher: train_batcher,
            noise_rng: StdRng::seed_from_u64(config.seed.wrapping_add(start_iter as u64)),
            outputs,
        }
    }

    /// Run `[state.next_iter, config.iters)` and hand the final state back.
    pub fn run(&mut self, mut state: TrainingState<B>) -> Result<TrainingState<B>> {
        let config = self.config;
        let start = state.next_iter;
        let mut estimate: Option<NoiseEstimate> = None;

        for i in start..config.iters {

            // ── 1. Learning-rate schedule ─────────────────────────────────────
            if decays_at(&config.schedule, i) {
                state.learning_rate *= LR_DECAY;
                self.outputs.log.note(format!("update lr: {:.6}", state.learning_rate))?;
            }

            // ── 2. Noise refresh ──────────────────────────────────────────────
            // The first iteration of every run estimates, resumed or not.
            if let Some(noise) = &config.noise {
                if i % noise.update_interval == 0 || estimate.is_none() {
                    let fresh = self.estimate_noise(&state.model, noise);
                    tracing::debug!(
                        "Noise refreshed at iteration {i}: {} tensors, norm2={:.6e}",
                        fresh.tensor_count(),
                        fresh.norm2()
                    );
                    estimate = Some(fresh);
                }
            }

            // ── 3–4. Accumulate, average, perturb ────────────────────────────
            let (grads, train_stats) = self.accumulate(&state.model);
            let grads = mean_and_perturb(
                &state.model,
                grads,
                self.train_batches.len(),
                estimate.as_ref(),
                &mut self.noise_rng,
            );

            // ── 5. Optimizer step ─────────────────────────────────────────────
            state.model = state.optimizer.step(state.learning_rate, state.model, grads);
            state.next_iter = i + 1;

            // ── 6. Evaluation ─────────────────────────────────────────────────
            if is_eval_iteration(i) {
                let summary = EvalSummary {
                    iteration:     i,
                    learning_rate: state.learning_rate,
                    noise_norm2:   estimate.as_ref().map(NoiseEstimate::norm2),
                    train:         train_stats,
                    test:          self.evaluate(&state.model),
                };
                self.report(&summary)?;
            }

            // ── 7. Checkpoint ─────────────────────────────────────────────────
            if is_checkpoint_iteration(i, config.checkpoint_every) {
                self.outputs
                    .checkpoints
                    .save(i, &state)
                    .with_context(|| format!("Checkpoint at iteration {i} failed"))?;
            }
        }

        tracing::info!("Training complete at iteration {}", state.next_iter);
        Ok(state)
    }

    fn estimate_noise(&mut self, model: &Classifier<B>, noise: &NoiseConfig) -> NoiseEstimate {
        let ghosts = ghost_indices(self.train.len(), noise.ghost_size, noise.num_ghost, &mut self.noise_rng)
            .iter()
            .map(|idx| self.ghost_batcher.batch(self.train.items(idx)))
            .collect::<Vec<_>>();
        NoiseEstimate::fisher_diagonal(model, &ghosts)
    }

    /// Summed gradients over every training batch, plus mean loss and
    /// accuracy across batches.
    fn accumulate(&self, model: &Classifier<B>) -> (GradientsParams, BatchStats) {
        let mut accumulator = GradientsAccumulator::<Classifier<B>>::new();
        let mut loss_sum = 0.0f64;
        let mut acc_sum = 0.0f64;

        for batch in &self.train_batches {
            let (loss, logits) = model.forward_loss(batch);
            loss_sum += loss.clone().into_scalar().elem::<f64>();
            acc_sum += accuracy(logits, batch.targets.clone());

            let grads = GradientsParams::from_grads(loss.backward(), model);
            accumulator.accumulate(model, grads);
        }

        let stats = BatchStats::from_sums(loss_sum, acc_sum, self.train_batches.len());
        (accumulator.grads(), stats)
    }

    /// Mean test loss and accuracy in inference mode.
    fn evaluate(&self, model: &Classifier<B>) -> BatchStats {
        let model = model.valid();
        let mut loss_sum = 0.0f64;
        let mut acc_sum = 0.0f64;

        for batch in &self.test_batches {
            let logits = model.forward(batch.images.clone());
            loss_sum += cross_entropy(logits.clone(), batch.targets.clone())
                .into_scalar()
                .elem::<f64>();
            acc_sum += accuracy(logits, batch.targets.clone());
        }

        BatchStats::from_sums(loss_sum, acc_sum, self.test_batches.len())
    }

    fn report(&self, summary: &EvalSummary) -> Result<()> {
        for (tag, value) in summary.scalars() {
            self.outputs.scalars.add_scalar(tag, summary.iteration, value)?;
        }
        self.outputs.log.note(summary.status_line())
    }
}
