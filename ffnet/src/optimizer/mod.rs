mod adam;
mod gradient_descent;
mod momentum;
mod sag;
mod sgd;

use log::{debug, info, trace};
use rand::{prelude::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ensure_len, Error, Result},
    layer::{Layer, ParamBuffer},
    losses::ErrorBlock,
};

pub use adam::Adam;
pub use gradient_descent::GradientDescent;
pub use momentum::MomentumSgd;
pub use sag::StochasticAverageGradient;
pub use sgd::StochasticGradientDescent;

/// A training algorithm driving a chain of layers towards lower error.
///
/// Implementations own every piece of auxiliary state they need for the
/// duration of one `train` call and only ever mutate the layers through
/// [`Layer::apply_shift`].
pub trait Optimizer {
    fn name(&self) -> &'static str;

    fn train(
        &mut self,
        layers: &mut [Layer],
        error_block: &ErrorBlock,
        inputs: &[Vec<f64>],
        targets: &[Vec<f64>],
        criteria: &StoppingCriteria,
    ) -> Result<()>;
}

impl<O: Optimizer + ?Sized> Optimizer for Box<O> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn train(
        &mut self,
        layers: &mut [Layer],
        error_block: &ErrorBlock,
        inputs: &[Vec<f64>],
        targets: &[Vec<f64>],
        criteria: &StoppingCriteria,
    ) -> Result<()> {
        (**self).train(layers, error_block, inputs, targets, criteria)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct StoppingCriteria {
    pub max_iterations: usize,
    /// Stop as soon as the average error over the whole training set is at
    /// or below this value. Checking it costs one forward pass per sample
    /// after every update.
    #[serde(default)]
    pub target_error: Option<f64>,
}

impl StoppingCriteria {
    pub fn iterations(max_iterations: usize) -> Self {
        StoppingCriteria {
            max_iterations,
            target_error: None,
        }
    }

    pub fn with_target_error(mut self, target_error: f64) -> Self {
        self.target_error = Some(target_error);
        self
    }
}

/// Average of the error function over a sample set, using the inference path.
pub fn average_error(
    layers: &[Layer],
    error_block: &ErrorBlock,
    inputs: &[Vec<f64>],
    targets: &[Vec<f64>],
) -> Result<f64> {
    if inputs.is_empty() {
        return Err(Error::EmptyDataset);
    }
    if inputs.len() != targets.len() {
        return Err(Error::SampleCountMismatch {
            inputs: inputs.len(),
            targets: targets.len(),
        });
    }

    let mut total = 0.0;
    for (x, y) in inputs.iter().zip(targets) {
        let mut out = x.clone();
        for layer in layers {
            out = layer.forward_only(&out)?;
        }
        total += error_block.error(&out, y)?;
    }

    Ok(total / inputs.len() as f64)
}

pub(crate) fn validate_samples(
    layers: &[Layer],
    inputs: &[Vec<f64>],
    targets: &[Vec<f64>],
) -> Result<()> {
    let (first, last) = match (layers.first(), layers.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(Error::InvalidTopology("no layers to train".to_owned())),
    };

    if inputs.is_empty() {
        return Err(Error::EmptyDataset);
    }
    if inputs.len() != targets.len() {
        return Err(Error::SampleCountMismatch {
            inputs: inputs.len(),
            targets: targets.len(),
        });
    }

    for x in inputs {
        ensure_len("training input", first.input_size(), x.len())?;
    }
    for y in targets {
        ensure_len("training target", last.output_size(), y.len())?;
    }

    Ok(())
}

/// Pushes one sample forward then its error gradient backward, adding the
/// parameter gradients of every layer into `grads`.
pub(crate) fn accumulate_sample(
    layers: &mut [Layer],
    error_block: &ErrorBlock,
    input: &[f64],
    target: &[f64],
    grads: &mut [ParamBuffer],
) -> Result<()> {
    let mut x = input.to_vec();
    for layer in layers.iter_mut() {
        x = layer.forward(&x)?;
    }

    let mut u = error_block.gradient(&x, target)?;
    for (layer, layer_grads) in layers.iter().zip(grads.iter_mut()).rev() {
        u = layer.backward(&u, layer_grads)?;
    }

    Ok(())
}

/// Shifts every layer by `scale * buffers[i]`.
pub(crate) fn apply_scaled(layers: &mut [Layer], buffers: &[ParamBuffer], scale: f64) -> Result<()> {
    for (layer, buffer) in layers.iter_mut().zip(buffers) {
        layer.apply_shift(&buffer.scaled(scale))?;
    }

    Ok(())
}

/// The iteration loop shared by every optimizer.
///
/// `step` receives the zero-based iteration number and performs one
/// complete forward/backward/update cycle.
pub(crate) fn run_iterations(
    name: &str,
    layers: &mut [Layer],
    error_block: &ErrorBlock,
    inputs: &[Vec<f64>],
    targets: &[Vec<f64>],
    criteria: &StoppingCriteria,
    mut step: impl FnMut(&mut [Layer], usize) -> Result<()>,
) -> Result<()> {
    validate_samples(layers, inputs, targets)?;

    info!(
        "Training: {} on {} samples, at most {} iterations",
        name,
        inputs.len(),
        criteria.max_iterations
    );

    for iteration in 0..criteria.max_iterations {
        step(layers, iteration)?;

        if let Some(target_error) = criteria.target_error {
            let error = average_error(layers, error_block, inputs, targets)?;
            debug!("Iteration: {} Error: {}", iteration, error);

            if error <= target_error {
                info!(
                    "{} reached error {} after {} iterations",
                    name,
                    error,
                    iteration + 1
                );
                return Ok(());
            }
        } else {
            trace!("Iteration: {}", iteration);
        }
    }

    info!("{} finished {} iterations", name, criteria.max_iterations);
    Ok(())
}

/// Draws mini-batches as the prefix of a freshly shuffled index permutation.
#[derive(Debug, Clone)]
pub(crate) struct MiniBatches {
    permutation: Vec<usize>,
    batch_size: usize,
}

impl MiniBatches {
    pub fn new(sample_count: usize, batch_size: usize) -> Self {
        MiniBatches {
            permutation: (0..sample_count).collect(),
            batch_size: batch_size.min(sample_count),
        }
    }

    pub fn next_batch<R: Rng + ?Sized>(&mut self, rng: &mut R) -> &[usize] {
        self.permutation.shuffle(rng);
        &self.permutation[..self.batch_size]
    }
}

pub(crate) fn check_learning_rate(learning_rate: f64) -> Result<f64> {
    if learning_rate.is_finite() && learning_rate > 0.0 {
        Ok(learning_rate)
    } else {
        Err(Error::InvalidHyperparameter {
            name: "learning_rate",
            value: learning_rate,
            reason: "must be finite and positive",
        })
    }
}

pub(crate) fn check_batch_size(batch_size: usize) -> Result<usize> {
    if batch_size >= 1 {
        Ok(batch_size)
    } else {
        Err(Error::InvalidHyperparameter {
            name: "batch_size",
            value: 0.0,
            reason: "must be at least 1",
        })
    }
}

/// Accepts values in `[0, 1)`.
pub(crate) fn check_decay(name: &'static str, value: f64) -> Result<f64> {
    if (0.0..1.0).contains(&value) {
        Ok(value)
    } else {
        Err(Error::InvalidHyperparameter {
            name,
            value,
            reason: "must lie in [0, 1)",
        })
    }
}

pub(crate) fn seeded_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

fn default_gd_learning_rate() -> f64 {
    gradient_descent::DEFAULT_LEARNING_RATE
}

fn default_sgd_learning_rate() -> f64 {
    sgd::DEFAULT_LEARNING_RATE
}

fn default_sgd_batch_size() -> usize {
    sgd::DEFAULT_BATCH_SIZE
}

fn default_momentum() -> f64 {
    momentum::DEFAULT_MOMENTUM
}

fn default_sag_learning_rate() -> f64 {
    sag::DEFAULT_LEARNING_RATE
}

fn default_adam_learning_rate() -> f64 {
    adam::DEFAULT_LEARNING_RATE
}

fn default_beta1() -> f64 {
    adam::DEFAULT_BETA1
}

fn default_beta2() -> f64 {
    adam::DEFAULT_BETA2
}

fn default_epsilon() -> f64 {
    adam::DEFAULT_EPSILON
}

fn default_adam_batch_size() -> usize {
    adam::DEFAULT_BATCH_SIZE
}

/// Serializable choice of optimizer together with its hyperparameters.
/// Every omitted field takes the variant's documented default.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerConfig {
    Gd {
        #[serde(default = "default_gd_learning_rate")]
        learning_rate: f64,
    },
    Sgd {
        #[serde(default = "default_sgd_learning_rate")]
        learning_rate: f64,
        #[serde(default = "default_sgd_batch_size")]
        batch_size: usize,
    },
    Momentum {
        #[serde(default = "default_sgd_learning_rate")]
        learning_rate: f64,
        #[serde(default = "default_sgd_batch_size")]
        batch_size: usize,
        #[serde(default = "default_momentum")]
        momentum: f64,
    },
    Sag {
        #[serde(default = "default_sag_learning_rate")]
        learning_rate: f64,
    },
    Adam {
        #[serde(default = "default_adam_learning_rate")]
        learning_rate: f64,
        #[serde(default = "default_beta1")]
        beta1: f64,
        #[serde(default = "default_beta2")]
        beta2: f64,
        #[serde(default = "default_epsilon")]
        epsilon: f64,
        #[serde(default = "default_adam_batch_size")]
        batch_size: usize,
    },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig::Adam {
            learning_rate: adam::DEFAULT_LEARNING_RATE,
            beta1: adam::DEFAULT_BETA1,
            beta2: adam::DEFAULT_BETA2,
            epsilon: adam::DEFAULT_EPSILON,
            batch_size: adam::DEFAULT_BATCH_SIZE,
        }
    }
}

impl OptimizerConfig {
    /// The variant named `name` with all-default hyperparameters.
    pub fn from_name(name: &str) -> Result<Self> {
        let config = match name.to_ascii_lowercase().as_str() {
            "gd" => OptimizerConfig::Gd {
                learning_rate: default_gd_learning_rate(),
            },
            "sgd" => OptimizerConfig::Sgd {
                learning_rate: default_sgd_learning_rate(),
                batch_size: default_sgd_batch_size(),
            },
            "momentum" | "sgd_momentum" => OptimizerConfig::Momentum {
                learning_rate: default_sgd_learning_rate(),
                batch_size: default_sgd_batch_size(),
                momentum: default_momentum(),
            },
            "sag" => OptimizerConfig::Sag {
                learning_rate: default_sag_learning_rate(),
            },
            "adam" => OptimizerConfig::default(),
            _ => return Err(Error::UnknownOptimizer(name.to_owned())),
        };

        Ok(config)
    }

    /// Builds the optimizer; stochastic variants draw from a generator seeded
    /// with `seed`, or from OS entropy when it is `None`.
    pub fn build(&self, seed: Option<u64>) -> Result<Box<dyn Optimizer>> {
        let optimizer: Box<dyn Optimizer> = match *self {
            OptimizerConfig::Gd { learning_rate } => Box::new(GradientDescent::new(learning_rate)?),
            OptimizerConfig::Sgd {
                learning_rate,
                batch_size,
            } => Box::new(
                StochasticGradientDescent::new(learning_rate, batch_size)?
                    .with_rng(seeded_rng(seed)),
            ),
            OptimizerConfig::Momentum {
                learning_rate,
                batch_size,
                momentum,
            } => Box::new(
                MomentumSgd::new(learning_rate, batch_size, momentum)?.with_rng(seeded_rng(seed)),
            ),
            OptimizerConfig::Sag { learning_rate } => Box::new(
                StochasticAverageGradient::new(learning_rate)?.with_rng(seeded_rng(seed)),
            ),
            OptimizerConfig::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
                batch_size,
            } => Box::new(
                Adam::new(learning_rate, beta1, beta2, epsilon, batch_size)?
                    .with_rng(seeded_rng(seed)),
            ),
        };

        Ok(optimizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::ActivationKind;
    use crate::losses::LossKind;
    use crate::matrix::Matrix;

    fn tiny_layers() -> Vec<Layer> {
        vec![
            Layer::from_parameters(
                Matrix::from([[0.5, -0.5], [1.0, 1.0]]),
                vec![0.0, 0.1],
                ActivationKind::Sigmoid,
            )
            .unwrap(),
            Layer::from_parameters(Matrix::from([[1.0, -1.0]]), vec![0.2], ActivationKind::Sigmoid)
                .unwrap(),
        ]
    }

    #[test]
    fn validation_catches_malformed_samples() {
        let layers = tiny_layers();

        assert!(matches!(
            validate_samples(&layers, &[], &[]),
            Err(Error::EmptyDataset)
        ));
        assert!(matches!(
            validate_samples(&layers, &[vec![0.0, 1.0]], &[vec![1.0], vec![0.0]]),
            Err(Error::SampleCountMismatch { inputs: 1, targets: 2 })
        ));
        assert!(matches!(
            validate_samples(&layers, &[vec![0.0, 1.0, 2.0]], &[vec![1.0]]),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(matches!(
            validate_samples(&layers, &[vec![0.0, 1.0]], &[vec![1.0, 0.0]]),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(validate_samples(&[], &[vec![0.0]], &[vec![0.0]]).is_err());
        assert!(validate_samples(&layers, &[vec![0.0, 1.0]], &[vec![1.0]]).is_ok());
    }

    #[test]
    fn accumulate_sample_matches_layer_by_layer_backprop() {
        let mut layers = tiny_layers();
        let block = ErrorBlock::new(LossKind::Mse);
        let mut grads = ParamBuffer::zeros_for(&layers);

        accumulate_sample(&mut layers, &block, &[1.0, 0.0], &[1.0], &mut grads).unwrap();

        let mut expected = ParamBuffer::zeros_for(&layers);
        let h = layers[0].forward(&[1.0, 0.0]).unwrap();
        let out = layers[1].forward(&h).unwrap();
        let u = block.gradient(&out, &[1.0]).unwrap();
        let u = layers[1].backward(&u, &mut expected[1]).unwrap();
        layers[0].backward(&u, &mut expected[0]).unwrap();

        assert_eq!(grads, expected);
    }

    #[test]
    fn average_error_uses_inference_path() {
        let layers = tiny_layers();
        let block = ErrorBlock::new(LossKind::Mse);
        let inputs = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let targets = vec![vec![1.0], vec![0.0]];

        let error = average_error(&layers, &block, &inputs, &targets).unwrap();

        assert!(error > 0.0 && error < 1.0);
        assert!(layers.iter().all(|l| l.last_input().is_none()));
    }

    #[test]
    fn average_error_rejects_mismatched_counts() {
        let layers = tiny_layers();
        let block = ErrorBlock::new(LossKind::Mse);
        let inputs = vec![vec![0.0, 0.0], vec![1.0, 1.0]];
        let targets = vec![vec![0.0]];

        assert!(matches!(
            average_error(&layers, &block, &inputs, &targets),
            Err(Error::SampleCountMismatch {
                inputs: 2,
                targets: 1
            })
        ));
    }

    #[test]
    fn mini_batches_are_distinct_prefixes() {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(3);
        let mut batches = MiniBatches::new(10, 4);

        for _ in 0..20 {
            let mut batch = batches.next_batch(&mut rng).to_vec();
            assert_eq!(batch.len(), 4);
            batch.sort_unstable();
            batch.dedup();
            assert_eq!(batch.len(), 4);
            assert!(batch.iter().all(|ix| *ix < 10));
        }

        let mut oversized = MiniBatches::new(3, 8);
        assert_eq!(oversized.next_batch(&mut rng).len(), 3);
    }

    #[test]
    fn hyperparameters_are_validated() {
        assert!(check_learning_rate(0.0).is_err());
        assert!(check_learning_rate(f64::NAN).is_err());
        assert!(check_learning_rate(0.1).is_ok());
        assert!(check_batch_size(0).is_err());
        assert!(check_decay("momentum", 1.0).is_err());
        assert!(check_decay("momentum", 0.0).is_ok());
    }

    #[test]
    fn config_uses_documented_defaults() {
        let config: OptimizerConfig = serde_json::from_str(r#"{"kind": "adam"}"#).unwrap();
        assert_eq!(config, OptimizerConfig::default());
        assert_eq!(
            config,
            OptimizerConfig::Adam {
                learning_rate: 0.001,
                beta1: 0.9,
                beta2: 0.999,
                epsilon: 1e-7,
                batch_size: 2,
            }
        );

        let config: OptimizerConfig =
            serde_json::from_str(r#"{"kind": "sgd", "batch_size": 8}"#).unwrap();
        assert_eq!(
            config,
            OptimizerConfig::Sgd {
                learning_rate: 0.1,
                batch_size: 8
            }
        );

        assert_eq!(
            OptimizerConfig::from_name("GD").unwrap(),
            OptimizerConfig::Gd { learning_rate: 0.1 }
        );
        assert_eq!(
            OptimizerConfig::from_name("sag").unwrap(),
            OptimizerConfig::Sag { learning_rate: 0.01 }
        );
        assert!(matches!(
            OptimizerConfig::from_name("rmsprop"),
            Err(Error::UnknownOptimizer(_))
        ));
    }

    #[test]
    fn config_builds_every_variant() {
        for name in ["gd", "sgd", "momentum", "sag", "adam"] {
            let optimizer = OptimizerConfig::from_name(name).unwrap().build(Some(1)).unwrap();
            assert!(!optimizer.name().is_empty());
        }

        let bad = OptimizerConfig::Momentum {
            learning_rate: 0.1,
            batch_size: 1,
            momentum: 1.5,
        };
        assert!(bad.build(None).is_err());
    }

    #[test]
    fn target_error_stops_early() {
        let mut layers = tiny_layers();
        let block = ErrorBlock::new(LossKind::Mse);
        let inputs = vec![vec![1.0, 0.0]];
        let targets = vec![vec![0.5]];
        let initial = average_error(&layers, &block, &inputs, &targets).unwrap();

        let mut steps = 0;
        let criteria = StoppingCriteria::iterations(1000).with_target_error(initial * 2.0);
        run_iterations("noop", &mut layers, &block, &inputs, &targets, &criteria, |_, _| {
            steps += 1;
            Ok(())
        })
        .unwrap();

        assert_eq!(steps, 1);
    }
}
