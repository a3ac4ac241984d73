use rayon::prelude::*;

use crate::{
    error::{Error, Result},
    Network,
};

/// Index of the largest element; the first one wins ties. `None` when empty
/// or when a NaN is present.
pub fn argmax(values: &[f64]) -> Option<usize> {
    if values.iter().any(|v| v.is_nan()) {
        return None;
    }

    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Fraction of `inputs` whose predicted class matches `labels`.
pub fn accuracy(network: &Network, inputs: &[Vec<f64>], labels: &[u8]) -> Result<f64> {
    if inputs.is_empty() {
        return Err(Error::EmptyDataset);
    }
    if inputs.len() != labels.len() {
        return Err(Error::SampleCountMismatch {
            inputs: inputs.len(),
            targets: labels.len(),
        });
    }

    let predictions = network.predict_batch(inputs)?;
    let correct = predictions
        .par_iter()
        .zip(labels)
        .filter(|(prediction, label)| argmax(prediction) == Some(**label as usize))
        .count();

    Ok(correct as f64 / inputs.len() as f64)
}

/// Largest absolute difference between any prediction and its target.
pub fn max_abs_error(network: &Network, inputs: &[Vec<f64>], targets: &[Vec<f64>]) -> Result<f64> {
    if inputs.len() != targets.len() {
        return Err(Error::SampleCountMismatch {
            inputs: inputs.len(),
            targets: targets.len(),
        });
    }

    let predictions = network.predict_batch(inputs)?;
    let mut worst = 0.0f64;
    for (prediction, target) in predictions.iter().zip(targets) {
        crate::error::ensure_len("evaluation target", prediction.len(), target.len())?;
        for (p, t) in prediction.iter().zip(target) {
            worst = worst.max((p - t).abs());
        }
    }

    Ok(worst)
}
