mod activation;
mod affine;
mod params;

pub use activation::{ActivationFunction, ActivationKind};
pub use affine::Layer;
pub use params::ParamBuffer;

use crate::error::{Error, Result};

/// Checks that every layer feeds a layer of matching input size.
pub fn check_adjacency(layers: &[Layer]) -> Result<()> {
    for (i, pair) in layers.windows(2).enumerate() {
        if pair[0].output_size() != pair[1].input_size() {
            return Err(Error::InvalidTopology(format!(
                "layer {} outputs {} values but layer {} expects {}",
                i,
                pair[0].output_size(),
                i + 1,
                pair[1].input_size()
            )));
        }
    }

    Ok(())
}
