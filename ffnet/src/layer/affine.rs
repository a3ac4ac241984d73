use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::{
    error::{ensure_len, Error, Result},
    matrix::Matrix,
};

use super::{ActivationFunction, ParamBuffer};

/// One affine transform `W·x + b` followed by an element-wise activation.
///
/// `forward` remembers its input so that the following `backward` call can
/// compute parameter gradients for the same sample. Only the most recent
/// input is kept.
#[derive(Debug, Clone)]
pub struct Layer {
    weights: Matrix,
    biases: Matrix,
    activation: ActivationFunction,
    last_input: Option<Vec<f64>>,
}

impl Layer {
    /// Draws the weights from `N(0, 2 / (input_size + output_size))` and zeroes
    /// the biases.
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        output_size: usize,
        activation: impl Into<ActivationFunction>,
        rng: &mut R,
    ) -> Result<Self> {
        if input_size == 0 || output_size == 0 {
            return Err(Error::InvalidTopology(format!(
                "layer {}x{} has a zero-sized side",
                input_size, output_size
            )));
        }

        let std_dev = (2.0 / (input_size + output_size) as f64).sqrt();
        let normal = Normal::new(0.0, std_dev)
            .map_err(|e| Error::InvalidTopology(format!("weight distribution: {}", e)))?;

        Ok(Layer {
            weights: Matrix::from_fn(output_size, input_size, |_, _| normal.sample(&mut *rng)),
            biases: Matrix::zeros(output_size, 1),
            activation: activation.into(),
            last_input: None,
        })
    }

    pub fn from_parameters(
        weights: Matrix,
        biases: Vec<f64>,
        activation: impl Into<ActivationFunction>,
    ) -> Result<Self> {
        ensure_len("layer biases", weights.rows(), biases.len())?;
        if weights.rows() == 0 || weights.cols() == 0 {
            return Err(Error::InvalidTopology("empty weight matrix".to_owned()));
        }

        Ok(Layer {
            weights,
            biases: Matrix::column(&biases),
            activation: activation.into(),
            last_input: None,
        })
    }

    pub fn input_size(&self) -> usize {
        self.weights.cols()
    }

    pub fn output_size(&self) -> usize {
        self.weights.rows()
    }

    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    pub fn biases(&self) -> &[f64] {
        self.biases.as_slice()
    }

    pub fn activation(&self) -> &ActivationFunction {
        &self.activation
    }

    /// Input cached by the last [`Layer::forward`] call.
    pub fn last_input(&self) -> Option<&[f64]> {
        self.last_input.as_deref()
    }

    fn pre_activation(&self, x: &[f64]) -> Vec<f64> {
        let mut pre = self.weights.mul_vec(x);
        pre.iter_mut()
            .zip(self.biases.as_slice())
            .for_each(|(p, b)| *p += b);
        pre
    }

    /// Training-path forward pass: evaluates the layer and caches `x`.
    pub fn forward(&mut self, x: &[f64]) -> Result<Vec<f64>> {
        let out = self.forward_only(x)?;
        self.last_input = Some(x.to_vec());

        Ok(out)
    }

    /// Inference-path forward pass; leaves the cache untouched.
    pub fn forward_only(&self, x: &[f64]) -> Result<Vec<f64>> {
        ensure_len("layer input", self.input_size(), x.len())?;

        let f = self.activation.function();
        Ok(self.pre_activation(x).into_iter().map(f).collect())
    }

    /// Backpropagates `upstream` (dE/d output) through the layer.
    ///
    /// Adds the weight and bias gradients of the cached sample into `grads`
    /// and returns the gradient with respect to the layer input.
    pub fn backward(&self, upstream: &[f64], grads: &mut ParamBuffer) -> Result<Vec<f64>> {
        ensure_len("upstream gradient", self.output_size(), upstream.len())?;
        ensure_len("gradient accumulator", self.output_size(), grads.weights.rows())?;
        ensure_len("gradient accumulator", self.input_size(), grads.weights.cols())?;
        ensure_len("gradient accumulator", self.output_size(), grads.biases.rows())?;
        ensure_len("gradient accumulator", 1, grads.biases.cols())?;

        let input = self.last_input.as_deref().ok_or(Error::MissingForwardPass)?;

        // delta = D·u where D = diag(f'(W·x + b))
        let df = self.activation.derivative();
        let delta: Vec<f64> = self
            .pre_activation(input)
            .into_iter()
            .zip(upstream)
            .map(|(pre, u)| df(pre) * u)
            .collect();

        grads.weights.add_outer_ip(1.0, &delta, input);
        grads
            .biases
            .as_mut_slice()
            .iter_mut()
            .zip(&delta)
            .for_each(|(b, d)| *b += d);

        // (uᵗ·D·W)ᵗ = Wᵗ·delta
        Ok(self.weights.transpose_mul_vec(&delta))
    }

    /// Adds an already signed and scaled shift to the parameters.
    pub fn apply_shift(&mut self, shift: &ParamBuffer) -> Result<()> {
        ensure_len("parameter shift", self.output_size(), shift.weights.rows())?;
        ensure_len("parameter shift", self.input_size(), shift.weights.cols())?;
        ensure_len("parameter shift", self.output_size(), shift.biases.rows())?;
        ensure_len("parameter shift", 1, shift.biases.cols())?;

        self.weights.add_ip(&shift.weights);
        self.biases.add_ip(&shift.biases);

        Ok(())
    }
}
