//! The two-weight walkthrough: `y = w1 * x1 + w2 * x2`, one example, no bias.

use rand::{rngs::StdRng, SeedableRng};

use super::{Activation, Layer, Network};
use crate::{
  data::Batch,
  error::Result,
  params::{Init, ParameterStore},
  tensor::Tensor,
};

pub const TOY_INPUTS: [f32; 2] = [1.0, 0.5];
pub const TOY_TARGET: f32 = 20.0;
pub const TOY_WEIGHTS: [f32; 2] = [0.2, 0.7];
pub const TOY_LEARNING_RATE: f32 = 0.6;
pub const TOY_STEPS: usize = 11;

/// A single bias-free identity layer `[2 -> 1]` starting at `weights`.
pub fn toy_linear(store: &mut ParameterStore, weights: [f32; 2]) -> Result<Network> {
  // explicit values, the rng is never drawn from
  let mut rng = StdRng::seed_from_u64(0);
  let weight = store.initialize("w", &[2, 1], Init::Values(weights.to_vec()), &mut rng)?;
  Network::new(
    store,
    vec![Layer {
      weight,
      bias: None,
      activation: Activation::Identity,
    }],
  )
}

/// The one example the walkthrough trains on.
pub fn toy_batch() -> Result<Batch> {
  Ok(Batch {
    inputs: Tensor::new(vec![1, 2], TOY_INPUTS.to_vec())?,
    targets: Tensor::new(vec![1], vec![TOY_TARGET])?,
  })
}
