use crate::error::{Error, Result};

pub mod mnist;
pub mod xor;

#[cfg(feature = "easy_datasets")]
mod utils;

/// Parallel `(inputs, targets)` sequences ready to be handed to a network.
pub type Samples = (Vec<Vec<f64>>, Vec<Vec<f64>>);

/// Scales raw pixel intensities from `[0, 255]` to `[0, 1]`.
pub fn normalize_pixels(images: &[Vec<f64>]) -> Vec<Vec<f64>> {
    images
        .iter()
        .map(|image| image.iter().map(|p| p / 255.0).collect())
        .collect()
}

/// Encodes every label as a vector of `classes` zeros with a one at the
/// label's index.
pub fn one_hot(labels: &[u8], classes: usize) -> Result<Vec<Vec<f64>>> {
    labels
        .iter()
        .map(|&label| {
            let label = label as usize;
            if label >= classes {
                return Err(Error::LabelOutOfRange { label, classes });
            }

            let mut encoded = vec![0.0; classes];
            encoded[label] = 1.0;
            Ok(encoded)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{normalize_pixels, one_hot};
    use crate::Error;

    #[test]
    fn normalize_maps_to_unit_interval() {
        let images = vec![vec![0.0, 255.0, 51.0]];

        assert_eq!(normalize_pixels(&images), vec![vec![0.0, 1.0, 0.2]]);
    }

    #[test]
    fn one_hot_works() {
        let encoded = one_hot(&[2, 0], 3).unwrap();

        assert_eq!(encoded, vec![vec![0.0, 0.0, 1.0], vec![1.0, 0.0, 0.0]]);
    }

    #[test]
    fn one_hot_rejects_out_of_range_labels() {
        assert!(matches!(
            one_hot(&[1, 10], 10),
            Err(Error::LabelOutOfRange {
                label: 10,
                classes: 10
            })
        ));
    }
}
