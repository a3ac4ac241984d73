use rand_chacha::ChaCha8Rng;

use crate::{
    error::Result,
    layer::{Layer, ParamBuffer},
    losses::ErrorBlock,
    matrix::Resettable,
};

use super::{
    accumulate_sample, apply_scaled, check_batch_size, check_decay, check_learning_rate,
    run_iterations, seeded_rng, sgd, MiniBatches, Optimizer, StoppingCriteria,
};

pub(crate) const DEFAULT_MOMENTUM: f64 = 0.9;

/// Mini-batch SGD with a momentum term.
///
/// Keeps one velocity per layer, `v = momentum * v + learning_rate * g`,
/// where `g` is the batch-averaged gradient, and shifts parameters by `-v`.
/// Velocities start at zero on every call to `train`.
#[derive(Debug, Clone)]
pub struct MomentumSgd {
    learning_rate: f64,
    batch_size: usize,
    momentum: f64,
    rng: ChaCha8Rng,
}

impl Default for MomentumSgd {
    fn default() -> Self {
        MomentumSgd {
            learning_rate: sgd::DEFAULT_LEARNING_RATE,
            batch_size: sgd::DEFAULT_BATCH_SIZE,
            momentum: DEFAULT_MOMENTUM,
            rng: seeded_rng(None),
        }
    }
}

impl MomentumSgd {
    pub fn new(learning_rate: f64, batch_size: usize, momentum: f64) -> Result<Self> {
        Ok(MomentumSgd {
            learning_rate: check_learning_rate(learning_rate)?,
            batch_size: check_batch_size(batch_size)?,
            momentum: check_decay("momentum", momentum)?,
            rng: seeded_rng(None),
        })
    }

    pub fn with_seed(self, seed: u64) -> Self {
        self.with_rng(seeded_rng(Some(seed)))
    }

    pub fn with_rng(mut self, rng: ChaCha8Rng) -> Self {
        self.rng = rng;
        self
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn momentum(&self) -> f64 {
        self.momentum
    }
}

impl Optimizer for MomentumSgd {
    fn name(&self) -> &'static str {
        "Stochastic Gradient Descent with Momentum"
    }

    fn train(
        &mut self,
        layers: &mut [Layer],
        error_block: &ErrorBlock,
        inputs: &[Vec<f64>],
        targets: &[Vec<f64>],
        criteria: &StoppingCriteria,
    ) -> Result<()> {
        let name = self.name();
        let mut grads = ParamBuffer::zeros_for(layers);
        let mut velocities = ParamBuffer::zeros_for(layers);
        let mut batches = MiniBatches::new(inputs.len(), self.batch_size);
        let (learning_rate, momentum) = (self.learning_rate, self.momentum);
        let rng = &mut self.rng;

        run_iterations(name, layers, error_block, inputs, targets, criteria, |layers, _| {
            grads.reset();
            let batch = batches.next_batch(rng);
            for &ix in batch {
                accumulate_sample(layers, error_block, &inputs[ix], &targets[ix], &mut grads)?;
            }

            let step = learning_rate / batch.len() as f64;
            for (v, g) in velocities.iter_mut().zip(&grads) {
                v.zip_apply_ip(g, |v, g| *v = momentum * *v + step * g);
            }

            apply_scaled(layers, &velocities, -1.0)
        })
    }
}
