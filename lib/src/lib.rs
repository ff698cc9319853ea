//! Small feed-forward networks trained by mini-batch gradient descent, with a choice of
//! gradient engine: reverse-mode autodiff over a recorded graph, or finite differences.

pub mod config;
pub mod data;
pub mod error;
pub mod grad;
pub mod loss;
pub mod metrics;
pub mod model;
pub mod optim;
pub mod params;
pub mod subcommands;
pub mod tensor;
pub mod train;
pub mod utils;

pub use error::{Error, Result};
