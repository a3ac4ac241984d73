use crate::{
    error::Result,
    layer::{Layer, ParamBuffer},
    losses::ErrorBlock,
    matrix::Resettable,
};

use super::{
    accumulate_sample, apply_scaled, check_learning_rate, run_iterations, Optimizer,
    StoppingCriteria,
};

pub(crate) const DEFAULT_LEARNING_RATE: f64 = 0.1;

/// Full-batch gradient descent: every iteration uses the exact gradient of
/// the average error over the whole training set.
#[derive(Debug, Clone)]
pub struct GradientDescent {
    learning_rate: f64,
}

impl Default for GradientDescent {
    fn default() -> Self {
        GradientDescent {
            learning_rate: DEFAULT_LEARNING_RATE,
        }
    }
}

impl GradientDescent {
    pub fn new(learning_rate: f64) -> Result<Self> {
        Ok(GradientDescent {
            learning_rate: check_learning_rate(learning_rate)?,
        })
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}

impl Optimizer for GradientDescent {
    fn name(&self) -> &'static str {
        "Gradient Descent"
    }

    fn train(
        &mut self,
        layers: &mut [Layer],
        error_block: &ErrorBlock,
        inputs: &[Vec<f64>],
        targets: &[Vec<f64>],
        criteria: &StoppingCriteria,
    ) -> Result<()> {
        let mut grads = ParamBuffer::zeros_for(layers);
        let scale = -self.learning_rate / inputs.len() as f64;

        run_iterations(self.name(), layers, error_block, inputs, targets, criteria, |layers, _| {
            grads.reset();
            for (x, y) in inputs.iter().zip(targets) {
                accumulate_sample(layers, error_block, x, y, &mut grads)?;
            }

            apply_scaled(layers, &grads, scale)
        })
    }
}
