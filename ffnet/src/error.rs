use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("unknown activation function `{0}`")]
    UnknownActivation(String),

    #[error("unknown error function `{0}`")]
    UnknownLoss(String),

    #[error("unknown optimizer `{0}`")]
    UnknownOptimizer(String),

    #[error("invalid hyperparameter {name} = {value}: {reason}")]
    InvalidHyperparameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("training set is empty")]
    EmptyDataset,

    #[error("{inputs} inputs but {targets} targets")]
    SampleCountMismatch { inputs: usize, targets: usize },

    #[error("backward called on a layer with no cached forward input")]
    MissingForwardPass,

    #[error("label {label} does not fit in {classes} classes")]
    LabelOutOfRange { label: usize, classes: usize },

    #[error("malformed corpus: {0}")]
    Corpus(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "easy_datasets")]
    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),
}

impl Error {
    pub(crate) fn shape(context: &'static str, expected: usize, actual: usize) -> Self {
        Error::ShapeMismatch {
            context,
            expected,
            actual,
        }
    }
}

/// Fails with [`Error::ShapeMismatch`] unless `actual == expected`.
pub(crate) fn ensure_len(context: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::shape(context, expected, actual))
    }
}
