// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Burn models, the Fisher-diagonal noise estimator and the
// training loop.
//
//   conv_small.rs — two conv stages + MLP head (FashionMNIST)
//   vgg.rs        — VGG-11 with batch norm
//   resnet.rs     — CIFAR-style ResNet-18
//   model.rs      — `Classifier`: the closed set of the three,
//                   selected once by `ModelKind`; loss and accuracy
//   noise.rs      — ghost-batch Fisher diagonal, gradient averaging
//                   and noise injection over `GradientsParams`
//   trainer.rs    — the per-iteration loop, SGD construction and
//                   the `TrainingState` it owns
//
// Training runs on an AutodiffBackend; evaluation goes through
// `model.valid()` on its inner backend.

/// Closed model factory plus cross-entropy / accuracy
pub mod model;

pub mod conv_small;
pub mod vgg;
pub mod resnet;

/// Diagonal-Fisher noise estimate and injection
pub mod noise;

/// Iteration loop with schedule, evaluation and checkpointing
pub mod trainer;
