use log::debug;
use rand::Rng;
use rayon::prelude::*;

use crate::{
    error::{Error, Result},
    layer::{check_adjacency, ActivationFunction, Layer},
    losses::{ErrorBlock, LossKind},
    optimizer::{self, Optimizer, StoppingCriteria},
};

/// An ordered chain of [`Layer`]s with the error function used to train it.
///
/// Training borrows the network mutably; prediction only needs `&self`, so a
/// trained network can be shared between threads for inference.
#[derive(Debug, Clone)]
pub struct Network {
    layers: Vec<Layer>,
    error_block: ErrorBlock,
}

impl Network {
    /// Builds `sizes.len() - 1` randomly initialised layers, layer `i` mapping
    /// `sizes[i]` values to `sizes[i + 1]` through `activations[i]`.
    pub fn new<A, R>(sizes: &[usize], activations: &[A], loss: LossKind, rng: &mut R) -> Result<Self>
    where
        A: Clone + Into<ActivationFunction>,
        R: Rng + ?Sized,
    {
        if sizes.len() < 2 {
            return Err(Error::InvalidTopology(format!(
                "need at least 2 layer sizes, got {}",
                sizes.len()
            )));
        }
        if activations.len() != sizes.len() - 1 {
            return Err(Error::InvalidTopology(format!(
                "{} layer sizes need {} activations, got {}",
                sizes.len(),
                sizes.len() - 1,
                activations.len()
            )));
        }

        let layers = sizes
            .windows(2)
            .zip(activations)
            .map(|(pair, activation)| Layer::new(pair[0], pair[1], activation.clone(), rng))
            .collect::<Result<Vec<_>>>()?;

        debug!("Built network {:?} with {:?} loss", sizes, loss);

        Ok(Network {
            layers,
            error_block: ErrorBlock::new(loss),
        })
    }

    pub fn from_layers(layers: Vec<Layer>, error_block: ErrorBlock) -> Result<Self> {
        if layers.is_empty() {
            return Err(Error::InvalidTopology("network has no layers".to_owned()));
        }
        check_adjacency(&layers)?;

        Ok(Network {
            layers,
            error_block,
        })
    }

    /// Appends a randomly initialised layer whose input must match the
    /// current output size.
    pub fn push_layer<R: Rng + ?Sized>(
        &mut self,
        input_size: usize,
        output_size: usize,
        activation: impl Into<ActivationFunction>,
        rng: &mut R,
    ) -> Result<()> {
        let layer = Layer::new(input_size, output_size, activation, rng)?;
        if let Some(last) = self.layers.last() {
            check_adjacency(&[last.clone(), layer.clone()])?;
        }

        self.layers.push(layer);
        Ok(())
    }

    pub fn set_error_block(&mut self, kind: LossKind) {
        self.error_block = ErrorBlock::new(kind);
    }

    pub fn error_block(&self) -> &ErrorBlock {
        &self.error_block
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, Layer::input_size)
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, Layer::output_size)
    }

    /// Runs `optimizer` over the samples until `criteria` is met.
    pub fn train<O: Optimizer + ?Sized>(
        &mut self,
        inputs: &[Vec<f64>],
        targets: &[Vec<f64>],
        optimizer: &mut O,
        criteria: &StoppingCriteria,
    ) -> Result<()> {
        optimizer.train(&mut self.layers, &self.error_block, inputs, targets, criteria)
    }

    /// Inference pass; leaves every layer's cached input untouched.
    pub fn predict(&self, x: &[f64]) -> Result<Vec<f64>> {
        let mut out = x.to_vec();
        for layer in &self.layers {
            out = layer.forward_only(&out)?;
        }

        Ok(out)
    }

    /// [`Network::predict`] over many samples in parallel.
    pub fn predict_batch(&self, xs: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        xs.par_iter().map(|x| self.predict(x)).collect()
    }

    pub fn average_error(&self, inputs: &[Vec<f64>], targets: &[Vec<f64>]) -> Result<f64> {
        optimizer::average_error(&self.layers, &self.error_block, inputs, targets)
    }
}
