use std::{fmt::Debug, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::error::Error;

const LEAKY_RELU_SLOPE: f64 = 0.01;

type ScalarFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivationKind {
    Sigmoid,
    Relu,
    LeakyRelu,
}

impl FromStr for ActivationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sigmoid" => Ok(ActivationKind::Sigmoid),
            "relu" => Ok(ActivationKind::Relu),
            "leaky_relu" | "leakyrelu" => Ok(ActivationKind::LeakyRelu),
            _ => Err(Error::UnknownActivation(s.to_owned())),
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn sigmoid_derivative(x: f64) -> f64 {
    let s = sigmoid(x);
    s * (1.0 - s)
}

fn relu(x: f64) -> f64 {
    x.max(0.0)
}

// The derivative at 0 is taken to be 1.
fn relu_derivative(x: f64) -> f64 {
    if x < 0.0 {
        0.0
    } else {
        1.0
    }
}

fn leaky_relu(x: f64) -> f64 {
    if x >= 0.0 {
        x
    } else {
        LEAKY_RELU_SLOPE * x
    }
}

fn leaky_relu_derivative(x: f64) -> f64 {
    if x >= 0.0 {
        1.0
    } else {
        LEAKY_RELU_SLOPE
    }
}

/// A scalar non-linearity together with its derivative.
///
/// Instances are immutable and cheap to clone, so a single function can be
/// shared by every layer of a network.
#[derive(Clone)]
pub struct ActivationFunction {
    kind: Option<ActivationKind>,
    function: ScalarFn,
    derivative: ScalarFn,
}

impl ActivationFunction {
    pub fn new(kind: ActivationKind) -> Self {
        let (function, derivative): (ScalarFn, ScalarFn) = match kind {
            ActivationKind::Sigmoid => (Arc::new(sigmoid), Arc::new(sigmoid_derivative)),
            ActivationKind::Relu => (Arc::new(relu), Arc::new(relu_derivative)),
            ActivationKind::LeakyRelu => {
                (Arc::new(leaky_relu), Arc::new(leaky_relu_derivative))
            }
        };

        ActivationFunction {
            kind: Some(kind),
            function,
            derivative,
        }
    }

    /// Wraps an explicit function/derivative pair. The caller is responsible
    /// for `derivative` actually being the derivative of `function`.
    pub fn custom<F, D>(function: F, derivative: D) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
        D: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        ActivationFunction {
            kind: None,
            function: Arc::new(function),
            derivative: Arc::new(derivative),
        }
    }

    /// The catalogue entry this function was built from, `None` for custom pairs.
    pub fn kind(&self) -> Option<ActivationKind> {
        self.kind
    }

    pub fn function(&self) -> &(dyn Fn(f64) -> f64 + Send + Sync) {
        self.function.as_ref()
    }

    pub fn derivative(&self) -> &(dyn Fn(f64) -> f64 + Send + Sync) {
        self.derivative.as_ref()
    }

    pub fn apply(&self, x: f64) -> f64 {
        (self.function)(x)
    }

    pub fn derivative_at(&self, x: f64) -> f64 {
        (self.derivative)(x)
    }
}

impl From<ActivationKind> for ActivationFunction {
    fn from(kind: ActivationKind) -> Self {
        ActivationFunction::new(kind)
    }
}

impl Default for ActivationFunction {
    fn default() -> Self {
        ActivationFunction::new(ActivationKind::Sigmoid)
    }
}

impl Debug for ActivationFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            Some(kind) => write!(f, "ActivationFunction({:?})", kind),
            None => write!(f, "ActivationFunction(custom)"),
        }
    }
}
