use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::{
    error::Result,
    layer::{Layer, ParamBuffer},
    losses::ErrorBlock,
    matrix::Resettable,
};

use super::{
    accumulate_sample, apply_scaled, check_learning_rate, run_iterations, seeded_rng, Optimizer,
    StoppingCriteria,
};

pub(crate) const DEFAULT_LEARNING_RATE: f64 = 0.01;

/// Stochastic average gradient.
///
/// Remembers the last gradient computed for every sample and steps along the
/// average of the remembered gradients, counting only samples drawn so far.
/// Memory grows linearly with the number of samples.
#[derive(Debug, Clone)]
pub struct StochasticAverageGradient {
    learning_rate: f64,
    rng: ChaCha8Rng,
}

impl Default for StochasticAverageGradient {
    fn default() -> Self {
        StochasticAverageGradient {
            learning_rate: DEFAULT_LEARNING_RATE,
            rng: seeded_rng(None),
        }
    }
}

impl StochasticAverageGradient {
    pub fn new(learning_rate: f64) -> Result<Self> {
        Ok(StochasticAverageGradient {
            learning_rate: check_learning_rate(learning_rate)?,
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
}

/// Per-sample gradient memory and its running sum.
#[derive(Debug)]
struct GradientTable {
    stored: Vec<Vec<ParamBuffer>>,
    sum: Vec<ParamBuffer>,
    seen: Vec<bool>,
    distinct: usize,
}

impl GradientTable {
    fn new(layers: &[Layer], sample_count: usize) -> Self {
        GradientTable {
            stored: vec![ParamBuffer::zeros_for(layers); sample_count],
            sum: ParamBuffer::zeros_for(layers),
            seen: vec![false; sample_count],
            distinct: 0,
        }
    }

    /// Replaces the gradient remembered for `ix` with `fresh` and returns the
    /// number of distinct samples seen so far, `ix` included.
    fn record(&mut self, ix: usize, fresh: &[ParamBuffer]) -> usize {
        if !self.seen[ix] {
            self.seen[ix] = true;
            self.distinct += 1;
        }

        for ((sum, old), new) in self.sum.iter_mut().zip(&mut self.stored[ix]).zip(fresh) {
            sum.sub_ip(old);
            sum.add_ip(new);
            old.clone_from(new);
        }

        self.distinct
    }
}

impl Optimizer for StochasticAverageGradient {
    fn name(&self) -> &'static str {
        "Stochastic Average Gradient"
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
        let mut table = GradientTable::new(layers, inputs.len());
        let mut grads = ParamBuffer::zeros_for(layers);
        let learning_rate = self.learning_rate;
        let rng = &mut self.rng;

        run_iterations(name, layers, error_block, inputs, targets, criteria, |layers, _| {
            let ix = rng.gen_range(0..inputs.len());

            grads.reset();
            accumulate_sample(layers, error_block, &inputs[ix], &targets[ix], &mut grads)?;
            let distinct = table.record(ix, &grads);

            apply_scaled(layers, &table.sum, -learning_rate / distinct as f64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{GradientTable, StochasticAverageGradient};
    use crate::{
        layer::{ActivationKind, Layer, ParamBuffer},
        losses::{ErrorBlock, LossKind},
        matrix::Matrix,
        optimizer::{average_error, Optimizer, StoppingCriteria},
    };

    fn single_layer() -> Vec<Layer> {
        vec![Layer::from_parameters(
            Matrix::from([[0.3, -0.2]]),
            vec![0.1],
            ActivationKind::Sigmoid,
        )
        .unwrap()]
    }

    fn filled(layers: &[Layer], value: f64) -> Vec<ParamBuffer> {
        ParamBuffer::zeros_for(layers)
            .into_iter()
            .map(|mut p| {
                p.weights.as_mut_slice().iter_mut().for_each(|w| *w = value);
                p.biases.as_mut_slice().iter_mut().for_each(|b| *b = value);
                p
            })
            .collect()
    }

    #[test]
    fn divisor_counts_distinct_samples() {
        let layers = single_layer();
        let mut table = GradientTable::new(&layers, 4);

        assert_eq!(table.record(2, &filled(&layers, 1.0)), 1);
        assert_eq!(table.record(2, &filled(&layers, 1.0)), 1);
        assert_eq!(table.record(0, &filled(&layers, 1.0)), 2);
        assert_eq!(table.record(3, &filled(&layers, 1.0)), 3);
        assert_eq!(table.record(0, &filled(&layers, 1.0)), 3);
    }

    #[test]
    fn sum_replaces_stale_gradients() {
        let layers = single_layer();
        let mut table = GradientTable::new(&layers, 3);

        table.record(0, &filled(&layers, 1.0));
        table.record(1, &filled(&layers, 2.0));
        table.record(0, &filled(&layers, 5.0));

        assert_eq!(table.sum, filled(&layers, 7.0));
        assert_eq!(table.stored[0], filled(&layers, 5.0));
        assert_eq!(table.stored[2], filled(&layers, 0.0));
    }

    #[test]
    fn first_step_is_a_plain_gradient_step() {
        let inputs = vec![vec![1.0, 1.0]];
        let targets = vec![vec![1.0]];
        let block = ErrorBlock::new(LossKind::Mse);

        let mut expected = single_layer();
        let mut grads = ParamBuffer::zeros_for(&expected);
        crate::optimizer::accumulate_sample(&mut expected, &block, &inputs[0], &targets[0], &mut grads)
            .unwrap();
        expected[0].apply_shift(&grads[0].scaled(-0.05)).unwrap();

        let mut layers = single_layer();
        StochasticAverageGradient::new(0.05)
            .unwrap()
            .with_seed(4)
            .train(&mut layers, &block, &inputs, &targets, &StoppingCriteria::iterations(1))
            .unwrap();

        assert_eq!(layers[0].weights(), expected[0].weights());
        assert_eq!(layers[0].biases(), expected[0].biases());
    }

    #[test]
    fn error_decreases() {
        let inputs = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let targets = vec![vec![0.9], vec![0.1]];
        let block = ErrorBlock::new(LossKind::Mse);
        let mut layers = single_layer();

        let before = average_error(&layers, &block, &inputs, &targets).unwrap();
        StochasticAverageGradient::new(0.5)
            .unwrap()
            .with_seed(5)
            .train(&mut layers, &block, &inputs, &targets, &StoppingCriteria::iterations(600))
            .unwrap();
        let after = average_error(&layers, &block, &inputs, &targets).unwrap();

        assert!(after < before / 10.0);
    }
}
