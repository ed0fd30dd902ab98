// ============================================================
// Layer 5 — Gradient Noise
// ============================================================
// Diagonal-Fisher noise estimation and injection.
//
//   estimate:  F_p = (1/K) Σ_k g_kp ⊙ g_kp
//              g_kp = gradient of the mean loss on ghost batch k
//              for parameter p
//   summary:   norm2 = Σ_p Σ_j F_pj²
//   injection: g_p ← g_p / n_batches + ε ⊙ sqrt(F_p),  ε ~ N(0, I)
//
// Gradients and estimates are keyed by ParamId and held in
// burn GradientsParams containers (inner-backend tensors).
// The estimate owns its own containers; the training step's
// accumulated gradients are never touched by it.

use std::marker::PhantomData;

use burn::{
    module::{ModuleVisitor, ParamId},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::data::batcher::ImageBatch;
use crate::ml::model::Classifier;

/// Per-parameter diagonal curvature, replaced wholesale on every refresh.
pub struct NoiseEstimate {
    diagonal: GradientsParams,
    norm2:    f64,
    tensors:  usize,
}

impl NoiseEstimate {
    /// Average the squared ghost-batch gradients of every trainable
    /// parameter of `model`.
    pub fn fisher_diagonal<B: AutodiffBackend>(
        model:  &Classifier<B>,
        ghosts: &[ImageBatch<B>],
    ) -> Self {
        let mut sum = GradientsParams::new();

        for batch in ghosts {
            let (loss, _) = model.forward_loss(batch);
            let grads = GradientsParams::from_grads(loss.backward(), model);
            model.visit(&mut SquareAccumulator::<B> {
                grads:   &grads,
                sum:     &mut sum,
                backend: PhantomData,
            });
            // `grads` is dropped here; nothing leaks into the next step.
        }

        let mut mean = MeanAndNorm::<B> {
            sum:     &mut sum,
            count:   ghosts.len(),
            norm2:   0.0,
            tensors: 0,
            backend: PhantomData,
        };
        model.visit(&mut mean);
        let (norm2, tensors) = (mean.norm2, mean.tensors);

        tracing::debug!(
            "Fisher diagonal over {} ghost batches: {} tensors, norm2={:.6e}",
            ghosts.len(),
            tensors,
            norm2
        );
        Self { diagonal: sum, norm2, tensors }
    }

    /// Σ over parameters of the sum of squared estimate entries.
    pub fn norm2(&self) -> f64 {
        self.norm2
    }

    /// Number of parameter tensors covered.
    pub fn tensor_count(&self) -> usize {
        self.tensors
    }

    pub fn get<B: Backend, const D: usize>(&self, id: ParamId) -> Option<Tensor<B, D>> {
        self.diagonal.get::<B, D>(id)
    }
}

struct SquareAccumulator<'a, B: AutodiffBackend> {
    grads:   &'a GradientsParams,
    sum:     &'a mut GradientsParams,
    backend: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SquareAccumulator<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) else {
            return;
        };
        let squared = grad.clone() * grad;
        let total = match self.sum.remove::<B::InnerBackend, D>(id) {
            Some(previous) => previous + squared,
            None => squared,
        };
        self.sum.register::<B::InnerBackend, D>(id, total);
    }
}

struct MeanAndNorm<'a, B: AutodiffBackend> {
    sum:     &'a mut GradientsParams,
    count:   usize,
    norm2:   f64,
    tensors: usize,
    backend: PhantomData<B>,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for MeanAndNorm<'_, B> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        let Some(total) = self.sum.remove::<B::InnerBackend, D>(id) else {
            return;
        };
        let mean = total.div_scalar(self.count as f64);
        self.norm2 += (mean.clone() * mean.clone())
            .sum()
            .into_scalar()
            .elem::<f64>();
        self.tensors += 1;
        self.sum.register::<B::InnerBackend, D>(id, mean);
    }
}

/// Turn summed gradients into a mean over `batches`, then add
/// `N(0, 1) * sqrt(F_p)` to every parameter the estimate covers.
pub fn mean_and_perturb<B: AutodiffBackend, R: Rng>(
    model:    &Classifier<B>,
    mut grads: GradientsParams,
    batches:  usize,
    estimate: Option<&NoiseEstimate>,
    rng:      &mut R,
) -> GradientsParams {
    let mut visitor = Perturbation::<B, R> {
        grads:   &mut grads,
        divisor: batches.max(1),
        estimate,
        rng,
        backend: PhantomData,
    };
    model.visit(&mut visitor);
    grads
}

struct Perturbation<'a, B: AutodiffBackend, R: Rng> {
    grads:    &'a mut GradientsParams,
    divisor:  usize,
    estimate: Option<&'a NoiseEstimate>,
    rng:      &'a mut R,
    backend:  PhantomData<B>,
}

impl<B: AutodiffBackend, R: Rng> ModuleVisitor<B> for Perturbation<'_, B, R> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) else {
            return;
        };
        let mut grad = grad.div_scalar(self.divisor as f64);

        let diagonal = self
            .estimate
            .and_then(|estimate| estimate.get::<B::InnerBackend, D>(id));
        if let Some(diagonal) = diagonal {
            let noise = standard_normal::<B::InnerBackend, D, R>(grad.dims(), &grad.device(), self.rng);
            grad = grad + noise * diagonal.sqrt();
        }

        self.grads.register::<B::InnerBackend, D>(id, grad);
    }
}

fn standard_normal<B: Backend, const D: usize, R: Rng>(
    shape:  [usize; D],
    device: &B::Device,
    rng:    &mut R,
) -> Tensor<B, D> {
    let count: usize = shape.iter().product();
    let values: Vec<f32> = (0..count).map(|_| rng.sample(StandardNormal)).collect();
    Tensor::<B, 1>::from_floats(values.as_slice(), device).reshape(shape)
}
