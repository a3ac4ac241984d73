use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    layer::ActivationKind,
    losses::LossKind,
    optimizer::{OptimizerConfig, StoppingCriteria},
    Network,
};

/// Topology and error function of a network.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    pub layer_sizes: Vec<usize>,
    /// One per layer, so one fewer than `layer_sizes`.
    pub activations: Vec<ActivationKind>,
    pub loss: LossKind,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            layer_sizes: vec![2, 4, 4, 4, 1],
            activations: vec![ActivationKind::Sigmoid; 4],
            loss: LossKind::Mse,
        }
    }
}

impl NetworkConfig {
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Network> {
        Network::new(&self.layer_sizes, &self.activations, self.loss, rng)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    pub optimizer: OptimizerConfig,
    pub max_iterations: usize,
    pub target_error: Option<f64>,
    /// Seeds both weight initialisation and the optimizer's sampling.
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            optimizer: OptimizerConfig::default(),
            max_iterations: 10_000,
            target_error: None,
            seed: None,
        }
    }
}

impl TrainingConfig {
    pub fn criteria(&self) -> StoppingCriteria {
        StoppingCriteria {
            max_iterations: self.max_iterations,
            target_error: self.target_error,
        }
    }
}

/// Everything needed for one training run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub training: TrainingConfig,
}
