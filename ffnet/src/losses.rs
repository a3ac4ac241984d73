use std::{fmt::Debug, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::error::{ensure_len, Error, Result};

/// A vector loss and its gradient with respect to the prediction.
pub trait Loss: Send + Sync {
    fn error(&self, prediction: &[f64], target: &[f64]) -> f64;
    fn gradient(&self, prediction: &[f64], target: &[f64]) -> Vec<f64>;
}

pub struct MeanSquaredError;

impl Loss for MeanSquaredError {
    fn error(&self, prediction: &[f64], target: &[f64]) -> f64 {
        let dim = prediction.len() as f64;

        prediction
            .iter()
            .zip(target)
            .map(|(p, t)| (p - t).powi(2))
            .sum::<f64>()
            / dim
    }

    fn gradient(&self, prediction: &[f64], target: &[f64]) -> Vec<f64> {
        let dim = prediction.len() as f64;

        prediction
            .iter()
            .zip(target)
            .map(|(p, t)| 2.0 * (p - t) / dim)
            .collect()
    }
}

pub struct MeanAbsoluteError;

impl Loss for MeanAbsoluteError {
    fn error(&self, prediction: &[f64], target: &[f64]) -> f64 {
        let dim = prediction.len() as f64;

        prediction
            .iter()
            .zip(target)
            .map(|(p, t)| (p - t).abs())
            .sum::<f64>()
            / dim
    }

    // A zero difference is treated as negative.
    fn gradient(&self, prediction: &[f64], target: &[f64]) -> Vec<f64> {
        let dim = prediction.len() as f64;

        prediction
            .iter()
            .zip(target)
            .map(|(p, t)| if p > t { 1.0 / dim } else { -1.0 / dim })
            .collect()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    #[default]
    Mse,
    Mae,
}

impl FromStr for LossKind {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mse" => Ok(LossKind::Mse),
            "mae" => Ok(LossKind::Mae),
            _ => Err(Error::UnknownLoss(s.to_owned())),
        }
    }
}

/// The error function used at the output of a network.
///
/// Both arguments of [`ErrorBlock::error`] and [`ErrorBlock::gradient`] are
/// `(prediction, target)` and must have the same dimension.
#[derive(Clone)]
pub struct ErrorBlock {
    kind: LossKind,
    loss: Arc<dyn Loss>,
}

impl ErrorBlock {
    pub fn new(kind: LossKind) -> Self {
        let loss: Arc<dyn Loss> = match kind {
            LossKind::Mse => Arc::new(MeanSquaredError),
            LossKind::Mae => Arc::new(MeanAbsoluteError),
        };

        ErrorBlock { kind, loss }
    }

    pub fn kind(&self) -> LossKind {
        self.kind
    }

    pub fn error(&self, prediction: &[f64], target: &[f64]) -> Result<f64> {
        ensure_len("error target", prediction.len(), target.len())?;
        Ok(self.loss.error(prediction, target))
    }

    pub fn gradient(&self, prediction: &[f64], target: &[f64]) -> Result<Vec<f64>> {
        ensure_len("error target", prediction.len(), target.len())?;
        Ok(self.loss.gradient(prediction, target))
    }
}

impl Default for ErrorBlock {
    fn default() -> Self {
        ErrorBlock::new(LossKind::Mse)
    }
}

impl From<LossKind> for ErrorBlock {
    fn from(kind: LossKind) -> Self {
        ErrorBlock::new(kind)
    }
}

impl Debug for ErrorBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ErrorBlock({:?})", self.kind)
    }
}
