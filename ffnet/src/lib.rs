pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluate;
pub mod layer;
pub mod losses;
pub mod matrix;
pub mod optimizer;

mod network;
pub use network::*;

pub use error::{Error, Result};

#[cfg(test)]
mod test_utils;
