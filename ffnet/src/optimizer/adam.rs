use rand_chacha::ChaCha8Rng;

use crate::{
    error::{Error, Result},
    layer::{Layer, ParamBuffer},
    losses::ErrorBlock,
    matrix::Resettable,
};

use super::{
    accumulate_sample, check_batch_size, check_decay, check_learning_rate, run_iterations,
    seeded_rng, MiniBatches, Optimizer, StoppingCriteria,
};

pub(crate) const DEFAULT_LEARNING_RATE: f64 = 0.001;
pub(crate) const DEFAULT_BETA1: f64 = 0.9;
pub(crate) const DEFAULT_BETA2: f64 = 0.999;
pub(crate) const DEFAULT_EPSILON: f64 = 1e-7;
pub(crate) const DEFAULT_BATCH_SIZE: usize = 2;

/// Adam: mini-batch gradients smoothed by bias-corrected first and second
/// moment estimates.
///
/// The denominator of the update is `sqrt(v) - epsilon`, floored at
/// `epsilon` so it can neither vanish nor change sign.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    batch_size: usize,
    rng: ChaCha8Rng,
}

impl Default for Adam {
    fn default() -> Self {
        Adam {
            learning_rate: DEFAULT_LEARNING_RATE,
            beta1: DEFAULT_BETA1,
            beta2: DEFAULT_BETA2,
            epsilon: DEFAULT_EPSILON,
            batch_size: DEFAULT_BATCH_SIZE,
            rng: seeded_rng(None),
        }
    }
}

impl Adam {
    pub fn new(
        learning_rate: f64,
        beta1: f64,
        beta2: f64,
        epsilon: f64,
        batch_size: usize,
    ) -> Result<Self> {
        if !(epsilon.is_finite() && epsilon >= 0.0) {
            return Err(Error::InvalidHyperparameter {
                name: "epsilon",
                value: epsilon,
                reason: "must be finite and non-negative",
            });
        }

        Ok(Adam {
            learning_rate: check_learning_rate(learning_rate)?,
            beta1: check_decay("beta1", beta1)?,
            beta2: check_decay("beta2", beta2)?,
            epsilon,
            batch_size: check_batch_size(batch_size)?,
            rng: seeded_rng(None),
        })
    }

    /// Adam with default moments and epsilon.
    pub fn with_learning_rate(learning_rate: f64) -> Result<Self> {
        Adam::new(
            learning_rate,
            DEFAULT_BETA1,
            DEFAULT_BETA2,
            DEFAULT_EPSILON,
            DEFAULT_BATCH_SIZE,
        )
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
}

/// Moment estimates for one layer.
#[derive(Debug, Clone)]
struct Moments {
    first: ParamBuffer,
    second: ParamBuffer,
}

impl Moments {
    fn zeros_for(layers: &[Layer]) -> Vec<Self> {
        layers
            .iter()
            .map(|layer| Moments {
                first: ParamBuffer::zeros_like(layer),
                second: ParamBuffer::zeros_like(layer),
            })
            .collect()
    }

    fn update(&mut self, grad: &ParamBuffer, beta1: f64, beta2: f64) {
        self.first
            .zip_apply_ip(grad, |m, g| *m = beta1 * *m + (1.0 - beta1) * g);
        self.second
            .zip_apply_ip(grad, |v, g| *v = beta2 * *v + (1.0 - beta2) * g * g);
    }

    fn shift(&self, step_size: f64, epsilon: f64) -> ParamBuffer {
        self.first.zip_map(&self.second, |m, v| {
            let denom = (v.sqrt() - epsilon).max(epsilon);
            if denom > 0.0 {
                -step_size * m / denom
            } else {
                0.0
            }
        })
    }
}

/// `learning_rate * sqrt(1 - beta2^t) / (1 - beta1^t)` given `beta1^t` and
/// `beta2^t`.
fn corrected_step_size(learning_rate: f64, beta1_pow: f64, beta2_pow: f64) -> f64 {
    learning_rate * (1.0 - beta2_pow).sqrt() / (1.0 - beta1_pow)
}

impl Optimizer for Adam {
    fn name(&self) -> &'static str {
        "Adam"
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
        let mut moments = Moments::zeros_for(layers);
        let mut batches = MiniBatches::new(inputs.len(), self.batch_size);
        let (learning_rate, beta1, beta2, epsilon) =
            (self.learning_rate, self.beta1, self.beta2, self.epsilon);
        let (mut beta1_pow, mut beta2_pow) = (1.0, 1.0);
        let rng = &mut self.rng;

        run_iterations(name, layers, error_block, inputs, targets, criteria, |layers, _| {
            grads.reset();
            let batch = batches.next_batch(rng);
            for &ix in batch {
                accumulate_sample(layers, error_block, &inputs[ix], &targets[ix], &mut grads)?;
            }
            let batch_len = batch.len() as f64;

            beta1_pow *= beta1;
            beta2_pow *= beta2;
            let step_size = corrected_step_size(learning_rate, beta1_pow, beta2_pow);

            for ((layer, layer_moments), grad) in
                layers.iter_mut().zip(moments.iter_mut()).zip(grads.iter_mut())
            {
                grad.scalar_mul_ip(1.0 / batch_len);
                layer_moments.update(grad, beta1, beta2);
                layer.apply_shift(&layer_moments.shift(step_size, epsilon))?;
            }

            Ok(())
        })
    }
}
