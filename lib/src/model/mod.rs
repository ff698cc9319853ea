pub mod activation;
pub mod classifier;
pub mod network;
pub mod toy_model;

pub use activation::*;
pub use classifier::*;
pub use network::*;
pub use toy_model::*;
