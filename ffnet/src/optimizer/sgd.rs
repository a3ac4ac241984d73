use rand_chacha::ChaCha8Rng;

use crate::{
    error::Result,
    layer::{Layer, ParamBuffer},
    losses::ErrorBlock,
    matrix::Resettable,
};

use super::{
    accumulate_sample, apply_scaled, check_batch_size, check_learning_rate, run_iterations,
    seeded_rng, MiniBatches, Optimizer, StoppingCriteria,
};

pub(crate) const DEFAULT_LEARNING_RATE: f64 = 0.1;
pub(crate) const DEFAULT_BATCH_SIZE: usize = 1;

/// Mini-batch stochastic gradient descent.
///
/// Each iteration shuffles the sample indices and averages the gradient over
/// the first `batch_size` of them.
#[derive(Debug, Clone)]
pub struct StochasticGradientDescent {
    learning_rate: f64,
    batch_size: usize,
    rng: ChaCha8Rng,
}

impl Default for StochasticGradientDescent {
    fn default() -> Self {
        StochasticGradientDescent {
            learning_rate: DEFAULT_LEARNING_RATE,
            batch_size: DEFAULT_BATCH_SIZE,
            rng: seeded_rng(None),
        }
    }
}

impl StochasticGradientDescent {
    pub fn new(learning_rate: f64, batch_size: usize) -> Result<Self> {
        Ok(StochasticGradientDescent {
            learning_rate: check_learning_rate(learning_rate)?,
            batch_size: check_batch_size(batch_size)?,
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
}

impl Optimizer for StochasticGradientDescent {
    fn name(&self) -> &'static str {
        "Stochastic Gradient Descent"
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
        let mut batches = MiniBatches::new(inputs.len(), self.batch_size);
        let learning_rate = self.learning_rate;
        let rng = &mut self.rng;

        run_iterations(name, layers, error_block, inputs, targets, criteria, |layers, _| {
            grads.reset();
            let batch = batches.next_batch(rng);
            for &ix in batch {
                accumulate_sample(layers, error_block, &inputs[ix], &targets[ix], &mut grads)?;
            }

            apply_scaled(layers, &grads, -learning_rate / batch.len() as f64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::StochasticGradientDescent;
    use crate::{
        layer::{ActivationKind, Layer},
        losses::{ErrorBlock, LossKind},
        matrix::Matrix,
        optimizer::{average_error, GradientDescent, Optimizer, StoppingCriteria},
    };

    fn single_layer() -> Vec<Layer> {
        vec![Layer::from_parameters(
            Matrix::from([[0.3, -0.2]]),
            vec![0.1],
            ActivationKind::Sigmoid,
        )
        .unwrap()]
    }

    #[test]
    fn full_batch_matches_gradient_descent() {
        let inputs = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]];
        let targets = vec![vec![1.0], vec![0.0], vec![1.0]];
        let block = ErrorBlock::new(LossKind::Mse);
        let criteria = StoppingCriteria::iterations(5);

        let mut gd_layers = single_layer();
        GradientDescent::new(0.3)
            .unwrap()
            .train(&mut gd_layers, &block, &inputs, &targets, &criteria)
            .unwrap();

        // A batch covering the whole set only reorders the summation.
        let mut sgd_layers = single_layer();
        StochasticGradientDescent::new(0.3, 3)
            .unwrap()
            .with_seed(7)
            .train(&mut sgd_layers, &block, &inputs, &targets, &criteria)
            .unwrap();

        for (a, b) in gd_layers[0]
            .weights()
            .as_slice()
            .iter()
            .zip(sgd_layers[0].weights().as_slice())
        {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn same_seed_gives_identical_parameters() {
        let inputs = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0], vec![0.0, 0.0]];
        let targets = vec![vec![1.0], vec![1.0], vec![0.0], vec![0.0]];
        let block = ErrorBlock::new(LossKind::Mse);
        let criteria = StoppingCriteria::iterations(50);

        let mut a = single_layer();
        let mut b = single_layer();
        StochasticGradientDescent::new(0.5, 2)
            .unwrap()
            .with_seed(11)
            .train(&mut a, &block, &inputs, &targets, &criteria)
            .unwrap();
        StochasticGradientDescent::new(0.5, 2)
            .unwrap()
            .with_seed(11)
            .train(&mut b, &block, &inputs, &targets, &criteria)
            .unwrap();

        assert_eq!(a[0].weights(), b[0].weights());
        assert_eq!(a[0].biases(), b[0].biases());
    }

    #[test]
    fn error_decreases() {
        let inputs = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let targets = vec![vec![0.9], vec![0.1]];
        let block = ErrorBlock::new(LossKind::Mse);
        let mut layers = single_layer();

        let before = average_error(&layers, &block, &inputs, &targets).unwrap();
        StochasticGradientDescent::new(1.0, 1)
            .unwrap()
            .with_seed(5)
            .train(&mut layers, &block, &inputs, &targets, &StoppingCriteria::iterations(400))
            .unwrap();
        let after = average_error(&layers, &block, &inputs, &targets).unwrap();

        assert!(after < before / 10.0);
    }
}
