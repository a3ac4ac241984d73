use crate::matrix::{Matrix, Resettable};

use super::Layer;

/// A pair of buffers shaped like the parameters of one [`Layer`].
///
/// Used for gradient accumulators, parameter shifts and every piece of
/// per-layer optimizer state (velocities, moments, cached gradients).
#[derive(Debug, Clone, PartialEq)]
pub struct ParamBuffer {
    pub weights: Matrix,
    pub biases: Matrix,
}

impl ParamBuffer {
    pub fn zeros(input_size: usize, output_size: usize) -> Self {
        ParamBuffer {
            weights: Matrix::zeros(output_size, input_size),
            biases: Matrix::zeros(output_size, 1),
        }
    }

    pub fn zeros_like(layer: &Layer) -> Self {
        ParamBuffer::zeros(layer.input_size(), layer.output_size())
    }

    /// One zero-filled buffer per layer.
    pub fn zeros_for(layers: &[Layer]) -> Vec<Self> {
        layers.iter().map(ParamBuffer::zeros_like).collect()
    }

    pub fn shape(&self) -> (usize, usize) {
        let (output_size, input_size) = self.weights.shape();
        (input_size, output_size)
    }

    pub fn add_ip(&mut self, other: &ParamBuffer) {
        self.weights.add_ip(&other.weights);
        self.biases.add_ip(&other.biases);
    }

    pub fn sub_ip(&mut self, other: &ParamBuffer) {
        self.weights.sub_ip(&other.weights);
        self.biases.sub_ip(&other.biases);
    }

    pub fn scalar_mul_ip(&mut self, scalar: f64) {
        self.weights.scalar_mul_ip(scalar);
        self.biases.scalar_mul_ip(scalar);
    }

    pub fn scaled(&self, scalar: f64) -> ParamBuffer {
        ParamBuffer {
            weights: self.weights.scaled(scalar),
            biases: self.biases.scaled(scalar),
        }
    }

    /// Applies `f` to every parameter position of `self` and `other`.
    pub fn zip_apply_ip(&mut self, other: &ParamBuffer, mut f: impl FnMut(&mut f64, f64)) {
        self.weights.zip_apply_ip(&other.weights, &mut f);
        self.biases.zip_apply_ip(&other.biases, &mut f);
    }

    /// Builds a new buffer from `self` and `other` position by position.
    pub fn zip_map(&self, other: &ParamBuffer, f: impl Fn(f64, f64) -> f64) -> ParamBuffer {
        let mut out = self.clone();
        out.zip_apply_ip(other, |lhs, rhs| *lhs = f(*lhs, rhs));
        out
    }
}

impl Resettable for ParamBuffer {
    fn reset(&mut self) {
        self.weights.reset();
        self.biases.reset();
    }
}

impl Resettable for Vec<ParamBuffer> {
    fn reset(&mut self) {
        self.iter_mut().for_each(Resettable::reset);
    }
}
